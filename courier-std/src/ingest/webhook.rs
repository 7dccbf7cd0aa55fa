//! Push-mode ingestion.

use super::lifecycle::Ingestion;
use crate::{config::WebhookConfig, router::UpdateRouter};
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use courier_core::{BoxError, Update};
use std::{
    future::Future,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use thiserror::Error;
use tokio::{net::TcpListener, sync::oneshot};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, warn};

/// Header carrying the shared secret configured for the webhook.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Failures of the listener job. Logged by the controller, never returned to
/// `start`/`stop` callers.
#[derive(Error, Debug)]
pub enum WebhookError {
    /// The address could not be bound.
    #[error("failed to bind webhook listener on {addr}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The server stopped with an I/O error.
    #[error("webhook server failed")]
    Serve(#[source] std::io::Error),
}

struct WebhookState<B> {
    router: Arc<UpdateRouter<B>>,
    tracker: TaskTracker,
    secret_token: Option<String>,
}

/// The push endpoint.
///
/// Accepts one JSON-encoded update per `POST`, hands it to the router on its
/// own task and acknowledges with `200`. Undecodable bodies get `400`, a
/// missing or wrong secret token gets `401`; neither affects the listener.
pub struct Webhook<B> {
    router: Arc<UpdateRouter<B>>,
    tracker: TaskTracker,
    bound: Mutex<Option<SocketAddr>>,
}

impl<B> Webhook<B> {
    /// Route updates through `router`, tracking in-flight work in `tracker`.
    pub fn new(router: Arc<UpdateRouter<B>>, tracker: TaskTracker) -> Self {
        Self {
            router,
            tracker,
            bound: Mutex::new(None),
        }
    }

    /// Address the running listener is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_bound(&self, addr: Option<SocketAddr>) {
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner) = addr;
    }
}

impl<B> Ingestion for Webhook<B>
where
    B: Clone + Send + Sync + 'static,
{
    type Params = WebhookConfig;
    const MODE: &'static str = "webhook";

    fn stop_grace(params: &WebhookConfig) -> Duration {
        params.grace_period
    }

    fn job_ended(&self) {
        self.set_bound(None);
    }

    fn run(
        self: Arc<Self>,
        config: WebhookConfig,
        cancel: CancellationToken,
        ready: oneshot::Sender<()>,
    ) -> impl Future<Output = Result<(), BoxError>> + Send + 'static {
        async move {
            let addr = config.bind_address();
            let listener = TcpListener::bind(&addr)
                .await
                .map_err(|source| WebhookError::Bind { addr, source })?;
            let local_addr = listener.local_addr().map_err(WebhookError::Serve)?;

            let state = Arc::new(WebhookState {
                router: Arc::clone(&self.router),
                tracker: self.tracker.clone(),
                secret_token: config.secret_token.clone(),
            });
            let app = Router::new()
                .route(&config.path, post(receive::<B>))
                .with_state(state);

            self.set_bound(Some(local_addr));
            info!(addr = %local_addr, path = %config.path, "webhook listening");
            let _ = ready.send(());

            let served = axum::serve(listener, app)
                .with_graceful_shutdown(cancel.cancelled_owned())
                .await;
            self.set_bound(None);
            served.map_err(WebhookError::Serve)?;

            info!(addr = %local_addr, "webhook stopped");
            Ok(())
        }
    }
}

async fn receive<B>(
    State(state): State<Arc<WebhookState<B>>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode
where
    B: Clone + Send + Sync + 'static,
{
    if let Some(expected) = state.secret_token.as_deref() {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected) {
            warn!("rejecting webhook request with invalid secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(err) => {
            warn!(error = %err, "rejecting undecodable webhook payload");
            return StatusCode::BAD_REQUEST;
        }
    };

    debug!(update_id = update.update_id, "received update");
    let router = Arc::clone(&state.router);
    state.tracker.spawn(async move {
        router.route(update).await;
    });
    StatusCode::OK
}
