//! Tracing subscriber setup
//!
//! Initializes the global `tracing` subscriber from the logging section
//! of the configuration. `RUST_LOG` takes precedence over the configured
//! level when set.

use cloudshelf_core::config::LoggingConfig;

/// Installs the global subscriber. Returns an error if one is already
/// installed (embedding applications typically install their own).
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.level.clone()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}
