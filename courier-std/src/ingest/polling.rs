//! Pull-mode ingestion.

use super::lifecycle::Ingestion;
use crate::{config::PollingConfig, router::UpdateRouter};
use courier_core::{BoxError, FetchError, FetchRequest, UpdateSource};
use std::{
    fmt,
    future::Future,
    ops::ControlFlow,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};
use tokio::sync::oneshot;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, warn};

/// Parameters of one polling job.
#[derive(Clone)]
pub struct PollingParams {
    /// Where updates come from.
    pub source: Arc<dyn UpdateSource>,
    /// Loop settings.
    pub config: PollingConfig,
}

impl PollingParams {
    /// Poll `source` with `config`.
    pub fn new(source: impl UpdateSource, config: PollingConfig) -> Self {
        Self {
            source: Arc::new(source),
            config,
        }
    }
}

impl fmt::Debug for PollingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingParams")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The long-polling loop.
///
/// Each received update is routed on its own task in the shared tracker, so
/// the next fetch never waits for dispatch to finish. The confirmed offset
/// outlives individual jobs: a restarted job resumes where the last one
/// stopped.
pub struct Polling<B> {
    router: Arc<UpdateRouter<B>>,
    tracker: TaskTracker,
    offset: AtomicI64,
}

impl<B> Polling<B> {
    /// Route updates through `router`, tracking in-flight work in `tracker`.
    pub fn new(router: Arc<UpdateRouter<B>>, tracker: TaskTracker) -> Self {
        Self {
            router,
            tracker,
            offset: AtomicI64::new(0),
        }
    }

    /// Offset the next fetch will request.
    pub fn offset(&self) -> i64 {
        self.offset.load(Ordering::SeqCst)
    }
}

impl<B> Ingestion for Polling<B>
where
    B: Clone + Send + Sync + 'static,
{
    type Params = PollingParams;
    const MODE: &'static str = "polling";

    fn stop_grace(params: &PollingParams) -> Duration {
        params.config.grace
    }

    fn run(
        self: Arc<Self>,
        params: PollingParams,
        cancel: CancellationToken,
        ready: oneshot::Sender<()>,
    ) -> impl Future<Output = Result<(), BoxError>> + Send + 'static {
        async move {
            let PollingParams { source, config } = params;
            let _ = ready.send(());
            info!(
                limit = config.limit,
                timeout_secs = config.timeout.as_secs(),
                "polling started"
            );

            let mut offset = self.offset();
            loop {
                let request = FetchRequest {
                    offset,
                    limit: config.limit,
                    timeout: config.timeout,
                    grace: config.grace,
                    allowed_updates: config.allowed_updates.clone(),
                };

                let fetched = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    fetched = tokio::time::timeout(request.deadline(), source.fetch(&request)) => fetched,
                };

                let failure = match fetched {
                    Ok(Ok(updates)) => {
                        offset = self.dispatch(offset, updates);
                        self.offset.store(offset, Ordering::SeqCst);
                        continue;
                    }
                    Ok(Err(FetchError::Timeout)) => {
                        debug!(offset, "long poll ended without updates");
                        continue;
                    }
                    Ok(Err(err)) => err.to_string(),
                    Err(_) => format!(
                        "fetch exceeded local deadline of {}ms",
                        request.deadline().as_millis()
                    ),
                };

                warn!(
                    offset,
                    error = %failure,
                    backoff_secs = config.backoff.as_secs(),
                    "fetching updates failed, backing off"
                );
                if backoff(&cancel, config.backoff).await.is_break() {
                    break;
                }
            }

            info!(offset, "polling stopped");
            Ok(())
        }
    }
}

impl<B> Polling<B>
where
    B: Clone + Send + Sync + 'static,
{
    /// Hand each update to the router and return the next offset.
    fn dispatch(&self, offset: i64, updates: Vec<courier_core::Update>) -> i64 {
        let next = updates
            .iter()
            .map(|update| update.update_id + 1)
            .fold(offset, i64::max);
        debug!(count = updates.len(), offset = next, "received updates");

        for update in updates {
            let router = Arc::clone(&self.router);
            self.tracker.spawn(async move {
                router.route(update).await;
            });
        }
        next
    }
}

async fn backoff(cancel: &CancellationToken, delay: Duration) -> ControlFlow<()> {
    tokio::select! {
        _ = cancel.cancelled() => ControlFlow::Break(()),
        _ = tokio::time::sleep(delay) => ControlFlow::Continue(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::HandlerEntry,
        ingest::Controller,
        kind::{self, HandlerTable, Kind},
        storage::NoopStorage,
        testing::{CountingHandler, ScriptedSource, sample},
    };

    fn polling(handler: CountingHandler) -> (Controller<Polling<()>>, TaskTracker) {
        let mut table = HandlerTable::default();
        kind::Message::chain_mut(&mut table).push(HandlerEntry::new(handler));
        let router = Arc::new(UpdateRouter::new(table, (), Arc::new(NoopStorage)));
        let tracker = TaskTracker::new();
        let controller = Controller::spawn(Arc::new(Polling::new(router, tracker.clone())));
        (controller, tracker)
    }

    fn config() -> PollingConfig {
        PollingConfig::default()
            .with_timeout(Duration::from_millis(20))
            .with_backoff(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_offset_advances_past_highest_id() {
        let handler = CountingHandler::new();
        let (controller, tracker) = polling(handler.clone());
        let source = ScriptedSource::new();
        source.push_batch(vec![
            sample::text_update(6, 1, "b"),
            sample::text_update(5, 1, "a"),
            sample::text_update(7, 1, "c"),
        ]);

        controller
            .start(PollingParams::new(source.clone(), config()), true)
            .await
            .unwrap();
        source.wait_for_requests(2).await;
        controller.stop(true).await.unwrap();
        tracker.close();
        tracker.wait().await;

        let offsets: Vec<i64> = source.requests().iter().map(|r| r.offset).collect();
        assert_eq!(offsets[0], 0);
        assert_eq!(offsets[1], 8);
        assert_eq!(handler.finished(), 3);
    }

    #[tokio::test]
    async fn test_timeout_retries_and_failure_backs_off() {
        let (controller, _tracker) = polling(CountingHandler::new());
        let source = ScriptedSource::new();
        source
            .push_error(FetchError::Timeout)
            .push_error(FetchError::Api {
                code: 502,
                description: "Bad Gateway".into(),
            })
            .push_batch(vec![sample::text_update(1, 1, "x")]);

        controller
            .start(PollingParams::new(source.clone(), config()), true)
            .await
            .unwrap();
        source.wait_for_requests(4).await;
        controller.stop(true).await.unwrap();

        let offsets: Vec<i64> = source.requests().iter().map(|r| r.offset).collect();
        assert_eq!(&offsets[..4], &[0, 0, 0, 2]);
    }

    #[tokio::test]
    async fn test_restart_resumes_from_confirmed_offset() {
        let handler = CountingHandler::new();
        let mut table = HandlerTable::default();
        kind::Message::chain_mut(&mut table).push(HandlerEntry::new(handler.clone()));
        let router = Arc::new(UpdateRouter::new(table, (), Arc::new(NoopStorage)));
        let tracker = TaskTracker::new();
        let polling = Arc::new(Polling::new(router, tracker.clone()));
        let controller = Controller::spawn(Arc::clone(&polling));

        let first = ScriptedSource::new();
        first.push_batch(vec![sample::text_update(41, 1, "a")]);
        controller
            .start(PollingParams::new(first.clone(), config()), true)
            .await
            .unwrap();
        first.wait_for_requests(2).await;
        controller.stop(true).await.unwrap();
        assert_eq!(polling.offset(), 42);

        let second = ScriptedSource::new();
        controller
            .start(PollingParams::new(second.clone(), config()), true)
            .await
            .unwrap();
        second.wait_for_requests(1).await;
        controller.close().await;
        tracker.close();
        tracker.wait().await;

        assert_eq!(second.requests()[0].offset, 42);
        assert_eq!(handler.finished(), 1);
    }

    #[tokio::test]
    async fn test_allowed_updates_are_forwarded() {
        let (controller, _tracker) = polling(CountingHandler::new());
        let source = ScriptedSource::new();
        let config = config().with_allowed_updates([<kind::Message as Kind>::CATEGORY]);

        controller
            .start(PollingParams::new(source.clone(), config), true)
            .await
            .unwrap();
        source.wait_for_requests(1).await;
        controller.close().await;

        assert_eq!(
            source.requests()[0].allowed_updates,
            vec![courier_core::Category::Message]
        );
    }
}
