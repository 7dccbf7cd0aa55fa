//! Pull-mode update source contract.

use crate::{error::FetchError, update::Category, update::Update};
use async_trait::async_trait;
use std::time::Duration;

/// Parameters of one `fetch` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// First update id to return; everything below is confirmed.
    pub offset: i64,
    /// Maximum number of updates to return.
    pub limit: u32,
    /// Server-side long-poll timeout.
    pub timeout: Duration,
    /// Margin over `timeout` after which the request counts as failed.
    pub grace: Duration,
    /// Categories to receive; empty means all.
    pub allowed_updates: Vec<Category>,
}

impl FetchRequest {
    /// Total time a single fetch may take.
    pub fn deadline(&self) -> Duration {
        self.timeout + self.grace
    }
}

/// Something that can be polled for updates.
///
/// Implementations report a long poll that ended without data as
/// [`FetchError::Timeout`] or as an empty batch; both are retried immediately.
/// A request that outlives [`FetchRequest::deadline`] is a failure, not a
/// [`FetchError::Timeout`].
#[async_trait]
pub trait UpdateSource: Send + Sync + 'static {
    /// Request the next batch of updates.
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Update>, FetchError>;
}

#[async_trait]
impl<S: UpdateSource + ?Sized> UpdateSource for std::sync::Arc<S> {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Update>, FetchError> {
        (**self).fetch(request).await
    }
}
