use async_trait::async_trait;
use courier_core::{Record, StateTransition, Storage, StorageError, StorageKey};
use dashmap::{DashMap, mapref::entry::Entry};
use serde_json::Value;

/// Concurrent in-process store.
///
/// Each operation runs under the shard lock of its key, so updates to one key
/// are atomic while different keys proceed independently. Records that become
/// empty are removed.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: DashMap<StorageKey, Record>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversations with a non-empty record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no conversation has a record.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Apply `f` to the record of `key` atomically.
    fn modify<T>(&self, key: StorageKey, f: impl FnOnce(&mut Record) -> T) -> T {
        match self.records.entry(key) {
            Entry::Occupied(mut occupied) => {
                let out = f(occupied.get_mut());
                if occupied.get().is_empty() {
                    occupied.remove();
                }
                out
            }
            Entry::Vacant(vacant) => {
                let mut record = Record::default();
                let out = f(&mut record);
                if !record.is_empty() {
                    vacant.insert(record);
                }
                out
            }
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: StorageKey) -> Result<Record, StorageError> {
        Ok(self
            .records
            .get(&key)
            .map(|record| record.clone())
            .unwrap_or_default())
    }

    async fn set_state(&self, key: StorageKey, state: Option<String>) -> Result<(), StorageError> {
        self.modify(key, |record| record.state = state);
        Ok(())
    }

    async fn set_data(
        &self,
        key: StorageKey,
        field: String,
        value: Value,
    ) -> Result<Option<Value>, StorageError> {
        Ok(self.modify(key, |record| record.data.insert(field, value)))
    }

    async fn remove_data(
        &self,
        key: StorageKey,
        field: &str,
    ) -> Result<Option<Value>, StorageError> {
        Ok(self.modify(key, |record| record.data.remove(field)))
    }

    async fn reset_data(&self, key: StorageKey) -> Result<(), StorageError> {
        self.modify(key, |record| record.data.clear());
        Ok(())
    }

    async fn finish(&self, key: StorageKey) -> Result<(), StorageError> {
        self.records.remove(&key);
        Ok(())
    }

    async fn next(
        &self,
        key: StorageKey,
        transition: StateTransition,
    ) -> Result<Option<String>, StorageError> {
        Ok(self.modify(key, |record| {
            record.state = transition(record.state.as_deref());
            record.state.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unknown_key_reads_empty() {
        let store = MemoryStorage::new();
        assert!(store.get(StorageKey::new(1, 1)).await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_finish_clears_state_and_data() {
        let store = MemoryStorage::new();
        let key = StorageKey::new(5, 6);
        store.set_state(key, Some("ask_name".into())).await.unwrap();
        store
            .set_data(key, "name".into(), Value::from("ada"))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);

        store.finish(key).await.unwrap();
        let record = store.get(key).await.unwrap();
        assert_eq!(record.state, None);
        assert!(record.data.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_set_data_returns_previous_value() {
        let store = MemoryStorage::new();
        let key = StorageKey::new(1, 2);
        assert_eq!(
            store.set_data(key, "n".into(), Value::from(1)).await.unwrap(),
            None
        );
        assert_eq!(
            store.set_data(key, "n".into(), Value::from(2)).await.unwrap(),
            Some(Value::from(1))
        );
        assert_eq!(
            store.remove_data(key, "n").await.unwrap(),
            Some(Value::from(2))
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_reset_data_keeps_state() {
        let store = MemoryStorage::new();
        let key = StorageKey::new(1, 2);
        store.set_state(key, Some("s".into())).await.unwrap();
        store
            .set_data(key, "a".into(), Value::Bool(true))
            .await
            .unwrap();
        store.reset_data(key).await.unwrap();

        let record = store.get(key).await.unwrap();
        assert_eq!(record.state.as_deref(), Some("s"));
        assert!(record.data.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_next_is_atomic_per_key() {
        let store = Arc::new(MemoryStorage::new());
        let key = StorageKey::new(7, 7);

        let increment: StateTransition = Arc::new(|state: Option<&str>| {
            let current = state.and_then(|s| s.parse::<u32>().ok()).unwrap_or(0);
            Some((current + 1).to_string())
        });

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let store = Arc::clone(&store);
                let increment = Arc::clone(&increment);
                tokio::spawn(async move { store.next(key, increment).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let record = store.get(key).await.unwrap();
        assert_eq!(record.state.as_deref(), Some("64"));
    }
}
