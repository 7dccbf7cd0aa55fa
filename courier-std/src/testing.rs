//! Testing utilities.
//!
//! Doubles for filters, handlers and the pull-mode source, plus builders for
//! sample updates. Everything here is cheap to clone; clones share their
//! recorded state so a test can keep one copy for inspection while another
//! is registered.

use async_trait::async_trait;
use courier_core::{
    BoxError, CallbackQuery, Chat, ChatMessage, Context, FetchError, FetchRequest, Filter,
    Handler, Update, UpdateSource, User,
};
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{sync::Notify, time::Instant};

// ============================================================================
// Handlers
// ============================================================================

/// A handler that records every event it receives.
#[derive(Debug)]
pub struct RecordingHandler<E> {
    events: Arc<Mutex<Vec<E>>>,
}

impl<E> Clone for RecordingHandler<E> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

impl<E> Default for RecordingHandler<E> {
    fn default() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<E: Clone> RecordingHandler<E> {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, in arrival order.
    pub fn events(&self) -> Vec<E> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of events received.
    pub fn count(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<B, E> Handler<B, E> for RecordingHandler<E>
where
    B: Send + 'static,
    E: Send + 'static,
{
    async fn handle(&self, _ctx: Context<B>, event: E) -> Result<(), BoxError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

/// A handler that counts invocations, optionally taking a while to finish.
#[derive(Debug, Clone, Default)]
pub struct CountingHandler {
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl CountingHandler {
    /// Create a handler that finishes immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` before finishing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Invocations that started.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Invocations that ran to completion.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl<B, E> Handler<B, E> for CountingHandler
where
    B: Send + 'static,
    E: Send + 'static,
{
    async fn handle(&self, _ctx: Context<B>, _event: E) -> Result<(), BoxError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Filters
// ============================================================================

/// A filter with a fixed answer that counts how often it was asked.
#[derive(Debug, Clone)]
pub struct StaticFilter {
    result: bool,
    calls: Arc<AtomicUsize>,
}

impl StaticFilter {
    /// Always passes.
    pub fn pass() -> Self {
        Self::with_result(true)
    }

    /// Always rejects.
    pub fn reject() -> Self {
        Self::with_result(false)
    }

    fn with_result(result: bool) -> Self {
        Self {
            result,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of evaluations.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<B: Sync, E: Sync> Filter<B, E> for StaticFilter {
    async fn test(&self, _ctx: &Context<B>, _event: &E) -> Result<bool, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result)
    }

    fn name(&self) -> &str {
        if self.result { "pass" } else { "reject" }
    }
}

/// A filter that always returns an error.
#[derive(Debug, Clone)]
pub struct FailingFilter {
    message: String,
}

impl FailingFilter {
    /// Fail with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl<B: Sync, E: Sync> Filter<B, E> for FailingFilter {
    async fn test(&self, _ctx: &Context<B>, _event: &E) -> Result<bool, BoxError> {
        Err(self.message.clone().into())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// A filter that panics when evaluated.
#[derive(Debug, Clone, Copy)]
pub struct PanickingFilter;

impl<B: Sync, E: Sync> Filter<B, E> for PanickingFilter {
    async fn test(&self, _ctx: &Context<B>, _event: &E) -> Result<bool, BoxError> {
        panic!("filter panicked on purpose")
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

/// A filter that answers after a delay.
///
/// Tracks how many evaluations started, ran to completion, or were dropped
/// before completing.
#[derive(Debug, Clone)]
pub struct SlowFilter {
    delay: Duration,
    result: bool,
    probe: Arc<Probe>,
}

#[derive(Debug, Default)]
struct Probe {
    started: AtomicUsize,
    completed: AtomicUsize,
    cancelled: AtomicUsize,
}

/// Counts a cancellation unless disarmed before it is dropped.
struct CancelGuard<'a> {
    probe: &'a Probe,
    armed: bool,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.probe.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl SlowFilter {
    /// Answer `result` after `delay`.
    pub fn new(delay: Duration, result: bool) -> Self {
        Self {
            delay,
            result,
            probe: Arc::new(Probe::default()),
        }
    }

    /// Evaluations that started.
    pub fn started(&self) -> usize {
        self.probe.started.load(Ordering::SeqCst)
    }

    /// Evaluations that produced an answer.
    pub fn completed(&self) -> usize {
        self.probe.completed.load(Ordering::SeqCst)
    }

    /// Evaluations dropped before answering.
    pub fn cancelled(&self) -> usize {
        self.probe.cancelled.load(Ordering::SeqCst)
    }
}

impl<B: Sync, E: Sync> Filter<B, E> for SlowFilter {
    async fn test(&self, _ctx: &Context<B>, _event: &E) -> Result<bool, BoxError> {
        self.probe.started.fetch_add(1, Ordering::SeqCst);
        let mut guard = CancelGuard {
            probe: &self.probe,
            armed: true,
        };
        tokio::time::sleep(self.delay).await;
        guard.armed = false;
        self.probe.completed.fetch_add(1, Ordering::SeqCst);
        Ok(self.result)
    }

    fn name(&self) -> &str {
        "slow"
    }
}

// ============================================================================
// Update source
// ============================================================================

/// A pull-mode source replaying scripted responses.
///
/// Every request is recorded. Once the script is exhausted the source behaves
/// like an idle long poll: it waits for the requested timeout and returns an
/// empty batch.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    inner: Arc<ScriptedInner>,
}

#[derive(Debug)]
enum Step {
    Respond(Result<Vec<Update>, FetchError>),
    Stall(Duration),
}

#[derive(Debug, Default)]
struct ScriptedInner {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<(Instant, FetchRequest)>>,
    fetched: Notify,
}

impl ScriptedSource {
    /// Create a source with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful batch.
    pub fn push_batch(&self, updates: Vec<Update>) -> &Self {
        self.push(Step::Respond(Ok(updates)))
    }

    /// Queue a failure.
    pub fn push_error(&self, error: FetchError) -> &Self {
        self.push(Step::Respond(Err(error)))
    }

    /// Queue a request that hangs for `duration` before answering empty.
    pub fn push_stall(&self, duration: Duration) -> &Self {
        self.push(Step::Stall(duration))
    }

    fn push(&self, step: Step) -> &Self {
        self.inner
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    /// When each request was received.
    pub fn request_times(&self) -> Vec<Instant> {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(at, _)| *at)
            .collect()
    }

    /// Wait until at least `count` requests were received.
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let fetched = self.inner.fetched.notified();
            if self.requests().len() >= count {
                return;
            }
            fetched.await;
        }
    }
}

#[async_trait]
impl UpdateSource for ScriptedSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Update>, FetchError> {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((Instant::now(), request.clone()));
        self.inner.fetched.notify_waiters();

        let next = self
            .inner
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Step::Respond(response)) => response,
            Some(Step::Stall(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(Vec::new())
            }
            None => {
                tokio::time::sleep(request.timeout).await;
                Ok(Vec::new())
            }
        }
    }
}

// ============================================================================
// Sample updates
// ============================================================================

/// Builders for sample payloads and updates.
pub mod sample {
    use super::{CallbackQuery, Chat, ChatMessage, Update, User};
    use courier_core::Poll;

    /// A user with the given id.
    pub fn user(id: i64) -> User {
        User {
            id,
            first_name: format!("user{id}"),
            ..Default::default()
        }
    }

    /// A private-chat text message from `user_id` in `chat_id`.
    pub fn message(chat_id: i64, user_id: i64, text: &str) -> ChatMessage {
        ChatMessage {
            message_id: 1,
            date: 0,
            chat: Chat {
                id: chat_id,
                kind: "private".into(),
                ..Default::default()
            },
            from: Some(user(user_id)),
            text: Some(text.into()),
            caption: None,
        }
    }

    /// A callback query from `user_id` carrying `data`.
    pub fn callback(user_id: i64, data: &str) -> CallbackQuery {
        CallbackQuery {
            id: format!("cb{user_id}"),
            from: user(user_id),
            chat_instance: "instance".into(),
            data: Some(data.into()),
            ..Default::default()
        }
    }

    /// A poll.
    pub fn poll(id: &str) -> Poll {
        Poll {
            id: id.into(),
            question: "?".into(),
            ..Default::default()
        }
    }

    /// An update carrying a text message where chat and sender share `user_id`.
    pub fn text_update(update_id: i64, user_id: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(message(user_id, user_id, text)),
            ..Default::default()
        }
    }

    /// An update carrying a callback query.
    pub fn callback_update(update_id: i64, user_id: i64, data: &str) -> Update {
        Update {
            update_id,
            callback_query: Some(callback(user_id, data)),
            ..Default::default()
        }
    }

    /// An update carrying a poll.
    pub fn poll_update(update_id: i64, id: &str) -> Update {
        Update {
            update_id,
            poll: Some(poll(id)),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_source_replays_then_idles() {
        let source = ScriptedSource::new();
        source.push_batch(vec![sample::text_update(1, 1, "a")]);

        let request = FetchRequest {
            offset: 0,
            limit: 10,
            timeout: Duration::from_millis(5),
            grace: Duration::ZERO,
            allowed_updates: Vec::new(),
        };
        assert_eq!(source.fetch(&request).await.unwrap().len(), 1);
        assert!(source.fetch(&request).await.unwrap().is_empty());
        assert_eq!(source.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_slow_filter_counts_drop_as_cancel() {
        let filter = SlowFilter::new(Duration::from_secs(60), true);
        let ctx = Context::new(
            (),
            courier_core::UpdateMeta {
                update_id: 0,
                category: courier_core::Category::Poll,
            },
            Arc::new(crate::storage::NoopStorage),
            None,
        );
        let event = ();
        let outcome = tokio::time::timeout(
            Duration::from_millis(10),
            Filter::<(), ()>::test(&filter, &ctx, &event),
        )
        .await;
        assert!(outcome.is_err());
        assert_eq!(filter.started(), 1);
        assert_eq!(filter.cancelled(), 1);
        assert_eq!(filter.completed(), 0);
    }
}
