use super::MemoryStorage;
use async_trait::async_trait;
use courier_core::{Record, StateTransition, Storage, StorageError, StorageKey};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

const MAILBOX_CAPACITY: usize = 256;

type Reply<T> = oneshot::Sender<Result<T, StorageError>>;

enum Op {
    Get(Reply<Record>),
    SetState(Option<String>, Reply<()>),
    SetData(String, Value, Reply<Option<Value>>),
    RemoveData(String, Reply<Option<Value>>),
    ResetData(Reply<()>),
    Finish(Reply<()>),
    Next(StateTransition, Reply<Option<String>>),
}

struct Request {
    key: StorageKey,
    op: Op,
}

impl Request {
    async fn apply<S: Storage>(self, inner: &S) {
        let key = self.key;
        // A dropped reply means the caller went away; the write still happened.
        match self.op {
            Op::Get(reply) => {
                let _ = reply.send(inner.get(key).await);
            }
            Op::SetState(state, reply) => {
                let _ = reply.send(inner.set_state(key, state).await);
            }
            Op::SetData(field, value, reply) => {
                let _ = reply.send(inner.set_data(key, field, value).await);
            }
            Op::RemoveData(field, reply) => {
                let _ = reply.send(inner.remove_data(key, &field).await);
            }
            Op::ResetData(reply) => {
                let _ = reply.send(inner.reset_data(key).await);
            }
            Op::Finish(reply) => {
                let _ = reply.send(inner.finish(key).await);
            }
            Op::Next(transition, reply) => {
                let _ = reply.send(inner.next(key, transition).await);
            }
        }
    }
}

/// A store owned by a single task.
///
/// Every operation, for every key, is sent to one task that applies it to the
/// inner backend and replies. Operations are therefore totally ordered in
/// arrival order. Handles are cheap to clone; the task exits when the last
/// handle is dropped. Once the task is gone every operation fails with
/// [`StorageError::Closed`].
#[derive(Debug, Clone)]
pub struct ActorStorage {
    requests: mpsc::Sender<Request>,
}

impl ActorStorage {
    /// Spawn the owning task around `inner`. Must be called inside a runtime.
    pub fn spawn<S: Storage>(inner: S) -> Self {
        let (requests, mut mailbox) = mpsc::channel::<Request>(MAILBOX_CAPACITY);
        tokio::spawn(async move {
            while let Some(request) = mailbox.recv().await {
                request.apply(&inner).await;
            }
            debug!("storage actor stopped");
        });
        Self { requests }
    }

    /// Spawn the owning task around a fresh [`MemoryStorage`].
    pub fn in_memory() -> Self {
        Self::spawn(MemoryStorage::new())
    }

    async fn call<T>(
        &self,
        key: StorageKey,
        op: impl FnOnce(Reply<T>) -> Op,
    ) -> Result<T, StorageError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request { key, op: op(reply) })
            .await
            .map_err(|_| StorageError::Closed)?;
        response.await.map_err(|_| StorageError::Closed)?
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Storage for ActorStorage {
    async fn get(&self, key: StorageKey) -> Result<Record, StorageError> {
        self.call(key, Op::Get).await
    }

    async fn set_state(&self, key: StorageKey, state: Option<String>) -> Result<(), StorageError> {
        self.call(key, |reply| Op::SetState(state, reply)).await
    }

    async fn set_data(
        &self,
        key: StorageKey,
        field: String,
        value: Value,
    ) -> Result<Option<Value>, StorageError> {
        self.call(key, |reply| Op::SetData(field, value, reply))
            .await
    }

    async fn remove_data(
        &self,
        key: StorageKey,
        field: &str,
    ) -> Result<Option<Value>, StorageError> {
        let field = field.to_owned();
        self.call(key, |reply| Op::RemoveData(field, reply)).await
    }

    async fn reset_data(&self, key: StorageKey) -> Result<(), StorageError> {
        self.call(key, Op::ResetData).await
    }

    async fn finish(&self, key: StorageKey) -> Result<(), StorageError> {
        self.call(key, Op::Finish).await
    }

    async fn next(
        &self,
        key: StorageKey,
        transition: StateTransition,
    ) -> Result<Option<String>, StorageError> {
        self.call(key, |reply| Op::Next(transition, reply)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_operations_apply_in_order() {
        let store = ActorStorage::in_memory();
        let key = StorageKey::new(3, 4);

        store.set_state(key, Some("a".into())).await.unwrap();
        let next = store
            .next(key, Arc::new(|s: Option<&str>| s.map(|s| format!("{s}b"))))
            .await
            .unwrap();
        assert_eq!(next.as_deref(), Some("ab"));

        store
            .set_data(key, "x".into(), Value::from(1))
            .await
            .unwrap();
        store.finish(key).await.unwrap();
        assert!(store.get(key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_one_actor() {
        let store = ActorStorage::in_memory();
        let other = store.clone();
        let key = StorageKey::new(1, 1);

        store.set_state(key, Some("shared".into())).await.unwrap();
        assert_eq!(other.get(key).await.unwrap().state.as_deref(), Some("shared"));
    }

    #[test]
    fn test_operations_fail_once_actor_is_gone() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let store = runtime.block_on(async { ActorStorage::in_memory() });
        drop(runtime);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let err = runtime
            .block_on(store.get(StorageKey::new(1, 1)))
            .unwrap_err();
        assert!(matches!(err, StorageError::Closed));
    }
}
