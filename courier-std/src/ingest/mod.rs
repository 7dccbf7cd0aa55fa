//! Ingestion: lifecycle controllers and the two ingestion modes.
//!
//! - [`Controller`]: serialized Start/Stop/Close handling for one mode.
//! - [`Polling`]: long-polling loop over an [`UpdateSource`](courier_core::UpdateSource).
//! - [`Webhook`]: HTTP listener receiving pushed updates.
//! - [`HttpSource`]: `getUpdates` client for pull mode.

mod http;
mod lifecycle;
mod polling;
mod webhook;

pub use http::{DEFAULT_API_URL, HttpSource};
pub use lifecycle::{Controller, ControllerStatus, Ingestion, JobId};
pub use polling::{Polling, PollingParams};
pub use webhook::{SECRET_TOKEN_HEADER, Webhook, WebhookError};
