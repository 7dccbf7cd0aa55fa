//! # Dispatch Context
//!
//! The per-dispatch value bundle handed to filters and handler bodies:
//! the outbound client, immutable metadata about the update, and a lazily
//! built FSM accessor bound to the conversation the update belongs to.

use crate::{
    storage::{FsmContext, Storage, StorageKey},
    update::Category,
};
use std::{fmt, sync::Arc};

/// Immutable metadata about the update being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpdateMeta {
    /// Identifier of the update.
    pub update_id: i64,
    /// Category the update was classified as.
    pub category: Category,
}

/// Per-dispatch context.
///
/// `B` is the outbound client type. The core never calls it; it is only
/// passed through to filters and handler bodies.
pub struct Context<B> {
    bot: B,
    meta: UpdateMeta,
    storage: Arc<dyn Storage>,
    key: Option<StorageKey>,
}

impl<B> Context<B> {
    /// Create a context. `key` is `None` for events without a conversation.
    pub fn new(
        bot: B,
        meta: UpdateMeta,
        storage: Arc<dyn Storage>,
        key: Option<StorageKey>,
    ) -> Self {
        Self {
            bot,
            meta,
            storage,
            key,
        }
    }

    /// The outbound client.
    pub fn bot(&self) -> &B {
        &self.bot
    }

    /// Metadata about the update.
    pub fn meta(&self) -> UpdateMeta {
        self.meta
    }

    /// Identifier of the update.
    pub fn update_id(&self) -> i64 {
        self.meta.update_id
    }

    /// Category of the update.
    pub fn category(&self) -> Category {
        self.meta.category
    }

    /// The conversation key derived from the event, if it has one.
    pub fn storage_key(&self) -> Option<StorageKey> {
        self.key
    }

    /// The conversation state accessor, or `None` if the event has no
    /// conversation (polls, for instance).
    pub fn fsm(&self) -> Option<FsmContext> {
        self.key
            .map(|key| FsmContext::new(Arc::clone(&self.storage), key))
    }
}

impl<B: Clone> Clone for Context<B> {
    fn clone(&self) -> Self {
        Self {
            bot: self.bot.clone(),
            meta: self.meta,
            storage: Arc::clone(&self.storage),
            key: self.key,
        }
    }
}

impl<B> fmt::Debug for Context<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("meta", &self.meta)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
