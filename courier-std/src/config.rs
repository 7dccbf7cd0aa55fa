//! Ingestion configuration.
//!
//! Durations deserialize from whole seconds (`timeout_secs`, `grace_secs`, ...).

use courier_core::Category;
use serde::Deserialize;
use std::time::Duration;

/// Pull-mode settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawPollingConfig")]
pub struct PollingConfig {
    /// Maximum updates per batch.
    pub limit: u32,
    /// Server-side long-wait timeout.
    pub timeout: Duration,
    /// Extra local margin on top of `timeout` before a fetch counts as overrun.
    pub grace: Duration,
    /// Wait after a failed fetch.
    pub backoff: Duration,
    /// Categories to request. Empty means all.
    pub allowed_updates: Vec<Category>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            timeout: Duration::from_secs(30),
            grace: Duration::from_secs(5),
            backoff: Duration::from_secs(15),
            allowed_updates: Vec::new(),
        }
    }
}

impl PollingConfig {
    /// Set the batch size.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the long-wait timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the local grace margin.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Set the failure backoff.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Restrict the requested categories.
    pub fn with_allowed_updates(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.allowed_updates = categories.into_iter().collect();
        self
    }

    /// Upper bound on one fetch as seen locally.
    pub fn fetch_deadline(&self) -> Duration {
        self.timeout + self.grace
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawPollingConfig {
    limit: u32,
    timeout_secs: u64,
    grace_secs: u64,
    backoff_secs: u64,
    allowed_updates: Vec<Category>,
}

impl Default for RawPollingConfig {
    fn default() -> Self {
        let defaults = PollingConfig::default();
        Self {
            limit: defaults.limit,
            timeout_secs: defaults.timeout.as_secs(),
            grace_secs: defaults.grace.as_secs(),
            backoff_secs: defaults.backoff.as_secs(),
            allowed_updates: defaults.allowed_updates,
        }
    }
}

impl From<RawPollingConfig> for PollingConfig {
    fn from(raw: RawPollingConfig) -> Self {
        Self {
            limit: raw.limit,
            timeout: Duration::from_secs(raw.timeout_secs),
            grace: Duration::from_secs(raw.grace_secs),
            backoff: Duration::from_secs(raw.backoff_secs),
            allowed_updates: raw.allowed_updates,
        }
    }
}

/// Push-mode settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawWebhookConfig")]
pub struct WebhookConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind. `0` picks a free port.
    pub port: u16,
    /// Route receiving updates. Always starts with `/`.
    pub path: String,
    /// How long in-flight requests may take to finish on stop.
    pub grace_period: Duration,
    /// Expected value of the secret-token header, if any.
    pub secret_token: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8443,
            path: "/".to_string(),
            grace_period: Duration::from_secs(10),
            secret_token: None,
        }
    }
}

impl WebhookConfig {
    /// Set the bind host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the bind port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the route, adding a leading `/` if missing.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = normalize_path(path.into());
        self
    }

    /// Set the stop grace period.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Require a secret-token header.
    pub fn with_secret_token(mut self, token: impl Into<String>) -> Self {
        self.secret_token = Some(token.into());
        self
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn normalize_path(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawWebhookConfig {
    host: String,
    port: u16,
    path: String,
    grace_period_secs: u64,
    secret_token: Option<String>,
}

impl Default for RawWebhookConfig {
    fn default() -> Self {
        let defaults = WebhookConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
            path: defaults.path,
            grace_period_secs: defaults.grace_period.as_secs(),
            secret_token: defaults.secret_token,
        }
    }
}

impl From<RawWebhookConfig> for WebhookConfig {
    fn from(raw: RawWebhookConfig) -> Self {
        Self {
            host: raw.host,
            port: raw.port,
            path: normalize_path(raw.path),
            grace_period: Duration::from_secs(raw.grace_period_secs),
            secret_token: raw.secret_token,
        }
    }
}
