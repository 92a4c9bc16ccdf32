//! Console logging setup.
//!
//! Everything goes to stderr so `--json` output on stdout stays
//! machine-readable.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over `base_level` when set.
///
/// # Errors
///
/// Returns a message if the filter does not parse or a global
/// subscriber is already installed.
pub fn setup_logging(base_level: &str) -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(base_level))
        .map_err(|e| format!("Invalid log filter {base_level:?}: {e}"))?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| format!("Logger initialization failed: {e}"))
}
