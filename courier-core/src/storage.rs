//! # Conversation State (FSM)
//!
//! Per-conversation state keyed by `(chat_id, user_id)`.
//!
//! A [`Record`] holds an optional state identifier and a string-keyed map of
//! opaque JSON values. Records are created implicitly by the first write,
//! read as empty before that, and removed by [`Storage::finish`].
//!
//! Backends implement [`Storage`]; handlers and filters use the key-bound
//! [`FsmContext`] obtained from [`Context::fsm`](crate::Context::fsm).

use crate::error::StorageError;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{collections::HashMap, fmt, sync::Arc};

/// Identifies one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    /// Chat identifier.
    pub chat_id: i64,
    /// User identifier.
    pub user_id: i64,
}

impl StorageKey {
    /// Create a key from a chat and a user identifier.
    pub const fn new(chat_id: i64, user_id: i64) -> Self {
        Self { chat_id, user_id }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chat_id, self.user_id)
    }
}

/// The stored value for one conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Current state identifier, if any.
    pub state: Option<String>,
    /// Arbitrary conversation data.
    pub data: HashMap<String, Value>,
}

impl Record {
    /// Whether the record carries neither state nor data.
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.data.is_empty()
    }
}

/// Computes the successor of a state. The store applies it atomically.
pub type StateTransition = Arc<dyn Fn(Option<&str>) -> Option<String> + Send + Sync>;

/// A conversation state backend.
///
/// Every operation is atomic per key, and operations on the same key observe
/// call order. Operations on different keys must not block each other unless
/// the backend explicitly serializes everything (see the actor backend).
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Read the record, or an empty record if nothing was written yet.
    async fn get(&self, key: StorageKey) -> Result<Record, StorageError>;

    /// Replace the state identifier.
    async fn set_state(&self, key: StorageKey, state: Option<String>) -> Result<(), StorageError>;

    /// Store one data field, returning the value it replaced.
    async fn set_data(
        &self,
        key: StorageKey,
        field: String,
        value: Value,
    ) -> Result<Option<Value>, StorageError>;

    /// Remove one data field, returning the removed value.
    async fn remove_data(&self, key: StorageKey, field: &str)
    -> Result<Option<Value>, StorageError>;

    /// Clear every data field, keeping the state.
    async fn reset_data(&self, key: StorageKey) -> Result<(), StorageError>;

    /// Clear state and data together.
    async fn finish(&self, key: StorageKey) -> Result<(), StorageError>;

    /// Move to the successor state computed by `transition` from the current
    /// one, returning the new state.
    async fn next(
        &self,
        key: StorageKey,
        transition: StateTransition,
    ) -> Result<Option<String>, StorageError>;
}

#[async_trait]
impl<S: Storage + ?Sized> Storage for Arc<S> {
    async fn get(&self, key: StorageKey) -> Result<Record, StorageError> {
        (**self).get(key).await
    }

    async fn set_state(&self, key: StorageKey, state: Option<String>) -> Result<(), StorageError> {
        (**self).set_state(key, state).await
    }

    async fn set_data(
        &self,
        key: StorageKey,
        field: String,
        value: Value,
    ) -> Result<Option<Value>, StorageError> {
        (**self).set_data(key, field, value).await
    }

    async fn remove_data(
        &self,
        key: StorageKey,
        field: &str,
    ) -> Result<Option<Value>, StorageError> {
        (**self).remove_data(key, field).await
    }

    async fn reset_data(&self, key: StorageKey) -> Result<(), StorageError> {
        (**self).reset_data(key).await
    }

    async fn finish(&self, key: StorageKey) -> Result<(), StorageError> {
        (**self).finish(key).await
    }

    async fn next(
        &self,
        key: StorageKey,
        transition: StateTransition,
    ) -> Result<Option<String>, StorageError> {
        (**self).next(key, transition).await
    }
}

/// A [`Storage`] accessor bound to one conversation.
#[derive(Clone)]
pub struct FsmContext {
    storage: Arc<dyn Storage>,
    key: StorageKey,
}

impl FsmContext {
    /// Bind `storage` to `key`.
    pub fn new(storage: Arc<dyn Storage>, key: StorageKey) -> Self {
        Self { storage, key }
    }

    /// The conversation this accessor is bound to.
    pub fn key(&self) -> StorageKey {
        self.key
    }

    /// Read the whole record.
    pub async fn get(&self) -> Result<Record, StorageError> {
        self.storage.get(self.key).await
    }

    /// Read the current state.
    pub async fn state(&self) -> Result<Option<String>, StorageError> {
        Ok(self.storage.get(self.key).await?.state)
    }

    /// Enter `state`.
    pub async fn set_state(&self, state: impl Into<String>) -> Result<(), StorageError> {
        self.storage.set_state(self.key, Some(state.into())).await
    }

    /// Leave any state, keeping the data.
    pub async fn clear_state(&self) -> Result<(), StorageError> {
        self.storage.set_state(self.key, None).await
    }

    /// Store a serializable value under `field`, returning the raw value it replaced.
    pub async fn set_data<T: Serialize + ?Sized>(
        &self,
        field: impl Into<String>,
        value: &T,
    ) -> Result<Option<Value>, StorageError> {
        let value = serde_json::to_value(value)?;
        self.storage.set_data(self.key, field.into(), value).await
    }

    /// Read `field` as `T`.
    pub async fn data<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>, StorageError> {
        let mut record = self.storage.get(self.key).await?;
        match record.data.remove(field) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Remove `field`, returning the raw removed value.
    pub async fn remove_data(&self, field: &str) -> Result<Option<Value>, StorageError> {
        self.storage.remove_data(self.key, field).await
    }

    /// Clear all data, keeping the state.
    pub async fn reset_data(&self) -> Result<(), StorageError> {
        self.storage.reset_data(self.key).await
    }

    /// End the conversation: clear state and data.
    pub async fn finish(&self) -> Result<(), StorageError> {
        self.storage.finish(self.key).await
    }

    /// Advance to the state computed by `transition`.
    pub async fn next<F>(&self, transition: F) -> Result<Option<String>, StorageError>
    where
        F: Fn(Option<&str>) -> Option<String> + Send + Sync + 'static,
    {
        self.storage.next(self.key, Arc::new(transition)).await
    }
}

impl fmt::Debug for FsmContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsmContext").field("key", &self.key).finish()
    }
}
