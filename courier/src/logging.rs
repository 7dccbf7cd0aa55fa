//! Logging initialisation.

use tracing_subscriber::{
    EnvFilter, Registry, fmt::format::FmtSpan, layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

/// Install a global `tracing` subscriber writing to stdout.
///
/// The level filter comes from `RUST_LOG`; if unset or unparsable,
/// `default_directive` (for example `"info"` or `"courier=debug"`) is used.
/// Returns an error instead of panicking when a global subscriber is
/// already installed.
pub fn init_tracing(default_directive: &str) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    Registry::default().with(env_filter).with(fmt_layer).try_init()
}
