use async_trait::async_trait;
use courier_core::{Record, StateTransition, Storage, StorageError, StorageKey};
use serde_json::Value;

/// A store that keeps nothing.
///
/// Reads always return an empty record; writes succeed and are discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStorage;

#[async_trait]
impl Storage for NoopStorage {
    async fn get(&self, _key: StorageKey) -> Result<Record, StorageError> {
        Ok(Record::default())
    }

    async fn set_state(&self, _key: StorageKey, _state: Option<String>) -> Result<(), StorageError> {
        Ok(())
    }

    async fn set_data(
        &self,
        _key: StorageKey,
        _field: String,
        _value: Value,
    ) -> Result<Option<Value>, StorageError> {
        Ok(None)
    }

    async fn remove_data(
        &self,
        _key: StorageKey,
        _field: &str,
    ) -> Result<Option<Value>, StorageError> {
        Ok(None)
    }

    async fn reset_data(&self, _key: StorageKey) -> Result<(), StorageError> {
        Ok(())
    }

    async fn finish(&self, _key: StorageKey) -> Result<(), StorageError> {
        Ok(())
    }

    // The transition is still applied so callers see the state they asked for.
    async fn next(
        &self,
        _key: StorageKey,
        transition: StateTransition,
    ) -> Result<Option<String>, StorageError> {
        Ok(transition(None))
    }
}
