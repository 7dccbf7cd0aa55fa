//! Error types for Courier.
//!
//! - [`LifecycleError`] - the only errors returned to callers of ingestion start/stop
//! - [`FetchError`] - pull-mode transport failures
//! - [`StorageError`] - conversation state backend failures
//!
//! Filter and handler failures are plain [`BoxError`]s; they are logged by the
//! engine and never propagated.

use thiserror::Error;

/// A boxed error type for user-supplied failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by ingestion lifecycle controllers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// `start` was called while the controller is already running.
    #[error("ingestion is already started")]
    AlreadyStarted,

    /// `stop` was called while the controller is idle.
    #[error("ingestion is already stopped")]
    AlreadyStopped,

    /// The controller has been closed and accepts no more commands.
    #[error("ingestion controller is closed")]
    Closed,

    /// The ingestion job terminated before it became ready.
    #[error("ingestion job exited before becoming ready")]
    ExitedEarly,

    /// Another ingestion mode is running in this process.
    #[error("{0} ingestion is running; stop it first")]
    ModeConflict(&'static str),
}

/// Errors returned by an [`UpdateSource`](crate::UpdateSource).
#[derive(Error, Debug)]
pub enum FetchError {
    /// The long poll ended without data. Not a failure: retry immediately.
    #[error("long poll timed out without updates")]
    Timeout,

    /// The transport failed (connection, decoding, ...).
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// The remote API rejected the request.
    #[error("api error {code}: {description}")]
    Api {
        /// Error code reported by the API.
        code: i64,
        /// Human readable description reported by the API.
        description: String,
    },
}

/// Errors returned by a [`Storage`](crate::Storage) backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A value could not be converted to or from its stored form.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend itself failed.
    #[error("storage backend error: {0}")]
    Backend(#[source] BoxError),

    /// The backend is no longer running.
    #[error("storage backend is closed")]
    Closed,
}

impl From<BoxError> for FetchError {
    fn from(err: BoxError) -> Self {
        FetchError::Transport(err)
    }
}

impl From<BoxError> for StorageError {
    fn from(err: BoxError) -> Self {
        StorageError::Backend(err)
    }
}
