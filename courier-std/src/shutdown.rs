//! Draining in-flight work.

use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Stop accepting new work on `tracker` and wait up to `grace` for tracked
/// tasks to finish.
///
/// Returns `true` if everything finished in time. Tasks still running after
/// the grace period are abandoned: they are neither awaited nor aborted.
pub async fn drain(tracker: &TaskTracker, grace: Duration) -> bool {
    tracker.close();
    let pending = tracker.len();
    if pending == 0 {
        return true;
    }

    info!(pending, grace_ms = grace.as_millis() as u64, "draining in-flight updates");
    match tokio::time::timeout(grace, tracker.wait()).await {
        Ok(()) => true,
        Err(_) => {
            warn!(abandoned = tracker.len(), "grace period elapsed, abandoning in-flight updates");
            false
        }
    }
}
