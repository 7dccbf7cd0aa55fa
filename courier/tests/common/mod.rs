#![allow(dead_code)]

use courier::{BoxError, ChatMessage, Context};
use std::sync::{Arc, Mutex};

// ============================================================================
// Outbound client double
// ============================================================================

/// Records every message "sent" through it.
#[derive(Clone, Debug, Default)]
pub struct TestBot {
    sent: Arc<Mutex<Vec<(i64, String)>>>,
}

impl TestBot {
    pub async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), BoxError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Replies with a fixed text, so tests can tell which handler ran.
pub fn reply(text: &'static str) -> impl Fn(Context<TestBot>, ChatMessage) -> ReplyFuture + Clone {
    move |ctx: Context<TestBot>, msg: ChatMessage| -> ReplyFuture {
        Box::pin(async move { ctx.bot().send_text(msg.chat.id, text).await })
    }
}

pub type ReplyFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), BoxError>> + Send>>;
