//! The dispatcher facade.
//!
//! [`DispatcherBuilder`] collects handler registrations, then
//! [`DispatcherBuilder::build`] freezes them into a [`Dispatcher`] that owns
//! the router, both ingestion controllers and the tracker of in-flight
//! update tasks.

use crate::config::DispatcherConfig;
use courier_core::{BoxFilter, Handler, LifecycleError, Storage, Update, UpdateSource};
use courier_std::{
    config::{PollingConfig, WebhookConfig},
    engine::HandlerEntry,
    ingest::{Controller, ControllerStatus, Ingestion, JobId, Polling, PollingParams, Webhook},
    kind::{HandlerTable, Kind},
    router::{RouteOutcome, UpdateRouter},
    shutdown,
    storage::MemoryStorage,
};
use std::{fmt, net::SocketAddr, sync::Arc};
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Collects registrations before ingestion starts.
pub struct DispatcherBuilder<B> {
    bot: B,
    storage: Arc<dyn Storage>,
    config: DispatcherConfig,
    table: HandlerTable<B>,
}

impl<B> DispatcherBuilder<B>
where
    B: Clone + Send + Sync + 'static,
{
    /// Start building around the outbound client `bot`.
    ///
    /// Conversation state defaults to an in-process [`MemoryStorage`].
    pub fn new(bot: B) -> Self {
        Self {
            bot,
            storage: Arc::new(MemoryStorage::new()),
            config: DispatcherConfig::default(),
            table: HandlerTable::default(),
        }
    }

    /// Use `storage` for conversation state.
    pub fn storage(self, storage: impl Storage) -> Self {
        self.shared_storage(Arc::new(storage))
    }

    /// Use an already shared store for conversation state.
    pub fn shared_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    /// Replace the configuration.
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Append `entry` to the chain of category `K`.
    ///
    /// Registration order is priority order within a category.
    pub fn register<K: Kind>(mut self, entry: HandlerEntry<B, K::Event>) -> Self {
        K::chain_mut(&mut self.table).push(entry);
        self
    }

    /// Register `body` for category `K`, guarded by `filters`.
    pub fn on<K, H>(
        self,
        filters: impl IntoIterator<Item = BoxFilter<B, K::Event>>,
        name: Option<&str>,
        body: H,
    ) -> Self
    where
        K: Kind,
        H: Handler<B, K::Event>,
    {
        let entry = HandlerEntry::new(body).with_filters(filters);
        let entry = match name {
            Some(name) => entry.with_name(name),
            None => entry,
        };
        self.register::<K>(entry)
    }

    /// Freeze the registrations. Must be called inside a tokio runtime.
    pub fn build(self) -> Dispatcher<B> {
        let handlers = self.table.len();
        let router = Arc::new(UpdateRouter::new(self.table, self.bot, self.storage));
        let tracker = TaskTracker::new();
        let webhook = Arc::new(Webhook::new(Arc::clone(&router), tracker.clone()));

        info!(handlers, "dispatcher built");
        Dispatcher {
            polling: Controller::spawn(Arc::new(Polling::new(
                Arc::clone(&router),
                tracker.clone(),
            ))),
            webhook: Controller::spawn(Arc::clone(&webhook)),
            webhook_listener: webhook,
            mode_switch: Mutex::new(()),
            router,
            tracker,
            config: self.config,
        }
    }
}

impl<B> fmt::Debug for DispatcherBuilder<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("handlers", &self.table.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Routes updates and controls ingestion.
///
/// At most one ingestion mode runs at a time. Updates are routed on tracked
/// tasks which [`close`](Self::close) drains within the configured grace.
pub struct Dispatcher<B>
where
    B: Clone + Send + Sync + 'static,
{
    router: Arc<UpdateRouter<B>>,
    tracker: TaskTracker,
    polling: Controller<Polling<B>>,
    webhook: Controller<Webhook<B>>,
    webhook_listener: Arc<Webhook<B>>,
    /// Held across the other mode's status check and the start.
    mode_switch: Mutex<()>,
    config: DispatcherConfig,
}

impl<B> Dispatcher<B>
where
    B: Clone + Send + Sync + 'static,
{
    /// Start building a dispatcher around `bot`.
    pub fn builder(bot: B) -> DispatcherBuilder<B> {
        DispatcherBuilder::new(bot)
    }

    /// Route one update on the calling task.
    pub async fn route(&self, update: Update) -> RouteOutcome {
        self.router.route(update).await
    }

    /// The router shared by both ingestion modes.
    pub fn router(&self) -> &Arc<UpdateRouter<B>> {
        &self.router
    }

    /// The conversation store.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        self.router.storage()
    }

    /// The active configuration.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Start long polling `source` with the configured settings.
    pub async fn start_polling(
        &self,
        source: impl UpdateSource,
        wait: bool,
    ) -> Result<JobId, LifecycleError> {
        self.start_polling_with(source, self.config.polling.clone(), wait)
            .await
    }

    /// Start long polling `source` with explicit settings.
    pub async fn start_polling_with(
        &self,
        source: impl UpdateSource,
        config: PollingConfig,
        wait: bool,
    ) -> Result<JobId, LifecycleError> {
        let _switch = self.mode_switch.lock().await;
        if self.webhook.status().await.is_running() {
            return Err(LifecycleError::ModeConflict(Webhook::<B>::MODE));
        }
        self.polling
            .start(PollingParams::new(source, config), wait)
            .await
    }

    /// Stop long polling.
    pub async fn stop_polling(&self, wait: bool) -> Result<(), LifecycleError> {
        self.polling.stop(wait).await
    }

    /// State of the polling controller.
    pub async fn polling_status(&self) -> ControllerStatus {
        self.polling.status().await
    }

    /// Start the webhook listener with the configured settings.
    pub async fn start_webhook(&self, wait: bool) -> Result<JobId, LifecycleError> {
        self.start_webhook_with(self.config.webhook.clone(), wait)
            .await
    }

    /// Start the webhook listener with explicit settings.
    pub async fn start_webhook_with(
        &self,
        config: WebhookConfig,
        wait: bool,
    ) -> Result<JobId, LifecycleError> {
        let _switch = self.mode_switch.lock().await;
        if self.polling.status().await.is_running() {
            return Err(LifecycleError::ModeConflict(Polling::<B>::MODE));
        }
        self.webhook.start(config, wait).await
    }

    /// Stop the webhook listener.
    pub async fn stop_webhook(&self, wait: bool) -> Result<(), LifecycleError> {
        self.webhook.stop(wait).await
    }

    /// State of the webhook controller.
    pub async fn webhook_status(&self) -> ControllerStatus {
        self.webhook.status().await
    }

    /// Address the webhook listener is bound to while running.
    pub fn webhook_addr(&self) -> Option<SocketAddr> {
        self.webhook_listener.local_addr()
    }

    /// Retire both controllers and drain in-flight updates.
    ///
    /// Returns `true` if every in-flight update finished within the grace
    /// period. Calling it again is harmless.
    pub async fn close(&self) -> bool {
        self.polling.close().await;
        self.webhook.close().await;
        let drained = shutdown::drain(&self.tracker, self.config.shutdown_grace).await;
        info!(drained, "dispatcher closed");
        drained
    }

    /// Poll `source` until Ctrl-C, then close.
    pub async fn run_polling(&self, source: impl UpdateSource) -> Result<(), LifecycleError> {
        self.start_polling(source, true).await?;
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C, shutting down");
        }
        self.close().await;
        Ok(())
    }
}

impl<B> fmt::Debug for Dispatcher<B>
where
    B: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("router", &self.router)
            .field("in_flight", &self.tracker.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
