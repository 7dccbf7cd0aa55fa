//! Dispatcher configuration.
//!
//! Built from defaults, from any `serde` source, or from `COURIER_*`
//! environment variables.

use courier_std::config::{PollingConfig, WebhookConfig};
use serde::Deserialize;
use std::{env, str::FromStr, time::Duration};
use thiserror::Error;

/// Environment variable holding the bot token.
pub const TOKEN_VAR: &str = "COURIER_BOT_TOKEN";

/// Invalid or missing configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is absent.
    #[error("missing required setting {0}")]
    Missing(&'static str),
    /// A setting could not be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Setting name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Parse failure.
        reason: String,
    },
}

/// Settings of a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawDispatcherConfig")]
pub struct DispatcherConfig {
    /// Pull-mode settings.
    pub polling: PollingConfig,
    /// Push-mode settings.
    pub webhook: WebhookConfig,
    /// How long `close` waits for in-flight updates.
    pub shutdown_grace: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            polling: PollingConfig::default(),
            webhook: WebhookConfig::default(),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl DispatcherConfig {
    /// Replace the polling settings.
    pub fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    /// Replace the webhook settings.
    pub fn with_webhook(mut self, webhook: WebhookConfig) -> Self {
        self.webhook = webhook;
        self
    }

    /// Set the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Load from `COURIER_*` environment variables on top of the defaults.
    ///
    /// Recognised: `COURIER_POLL_LIMIT`, `COURIER_POLL_TIMEOUT_SECS`,
    /// `COURIER_POLL_BACKOFF_SECS`, `COURIER_WEBHOOK_HOST`,
    /// `COURIER_WEBHOOK_PORT`, `COURIER_WEBHOOK_PATH`,
    /// `COURIER_WEBHOOK_SECRET`, `COURIER_SHUTDOWN_GRACE_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(limit) = parse(&lookup, "COURIER_POLL_LIMIT")? {
            config.polling.limit = limit;
        }
        if let Some(secs) = parse(&lookup, "COURIER_POLL_TIMEOUT_SECS")? {
            config.polling.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "COURIER_POLL_BACKOFF_SECS")? {
            config.polling.backoff = Duration::from_secs(secs);
        }
        if let Some(host) = lookup("COURIER_WEBHOOK_HOST") {
            config.webhook.host = host;
        }
        if let Some(port) = parse(&lookup, "COURIER_WEBHOOK_PORT")? {
            config.webhook.port = port;
        }
        if let Some(path) = lookup("COURIER_WEBHOOK_PATH") {
            config.webhook = config.webhook.with_path(path);
        }
        if let Some(secret) = lookup("COURIER_WEBHOOK_SECRET") {
            config.webhook.secret_token = Some(secret);
        }
        if let Some(secs) = parse(&lookup, "COURIER_SHUTDOWN_GRACE_SECS")? {
            config.shutdown_grace = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// Read the bot token from [`TOKEN_VAR`].
pub fn token_from_env() -> Result<String, ConfigError> {
    env::var(TOKEN_VAR)
        .ok()
        .filter(|token| !token.trim().is_empty())
        .ok_or(ConfigError::Missing(TOKEN_VAR))
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|err: T::Err| ConfigError::Invalid {
            key,
            reason: err.to_string(),
            value,
        })
}

#[derive(Deserialize)]
#[serde(default)]
struct RawDispatcherConfig {
    polling: PollingConfig,
    webhook: WebhookConfig,
    shutdown_grace_secs: u64,
}

impl Default for RawDispatcherConfig {
    fn default() -> Self {
        let defaults = DispatcherConfig::default();
        Self {
            polling: defaults.polling,
            webhook: defaults.webhook,
            shutdown_grace_secs: defaults.shutdown_grace.as_secs(),
        }
    }
}

impl From<RawDispatcherConfig> for DispatcherConfig {
    fn from(raw: RawDispatcherConfig) -> Self {
        Self {
            polling: raw.polling,
            webhook: raw.webhook,
            shutdown_grace: Duration::from_secs(raw.shutdown_grace_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = DispatcherConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DispatcherConfig::default());
        assert_eq!(config.polling.backoff, Duration::from_secs(15));
        assert_eq!(config.webhook.port, 8443);
    }

    #[test]
    fn test_env_overrides() {
        let config = DispatcherConfig::from_lookup(lookup(&[
            ("COURIER_POLL_LIMIT", "50"),
            ("COURIER_WEBHOOK_PORT", "9000"),
            ("COURIER_WEBHOOK_PATH", "updates"),
            ("COURIER_WEBHOOK_SECRET", "s3cr3t"),
            ("COURIER_SHUTDOWN_GRACE_SECS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.polling.limit, 50);
        assert_eq!(config.webhook.port, 9000);
        assert_eq!(config.webhook.path, "/updates");
        assert_eq!(config.webhook.secret_token.as_deref(), Some("s3cr3t"));
        assert_eq!(config.shutdown_grace, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let err = DispatcherConfig::from_lookup(lookup(&[("COURIER_WEBHOOK_PORT", "http")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "COURIER_WEBHOOK_PORT",
                ..
            }
        ));
    }

    #[test]
    fn test_deserialize_nested() {
        let config: DispatcherConfig = serde_json::from_str(
            r#"{ "shutdown_grace_secs": 2, "polling": { "backoff_secs": 1 } }"#,
        )
        .unwrap();
        assert_eq!(config.shutdown_grace, Duration::from_secs(2));
        assert_eq!(config.polling.backoff, Duration::from_secs(1));
        assert_eq!(config.polling.limit, 100);
    }
}
