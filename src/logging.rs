//! Tracing subscriber bootstrap.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Environment variable that takes precedence over the configured filter.
pub const LOG_ENV: &str = "BOARDSYNC_LOG";

/// Build the filter from `BOARDSYNC_LOG`, falling back to `config.filter`.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match std::env::var(LOG_ENV) {
        Ok(directive) if !directive.is_empty() => EnvFilter::try_new(&directive)
            .with_context(|| format!("Invalid {LOG_ENV} directive '{directive}'")),
        _ => EnvFilter::try_new(&config.filter)
            .with_context(|| format!("Invalid log filter '{}'", config.filter)),
    }
}

/// Install the global subscriber. Returns `Ok(false)` when one is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match config.format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().flatten_event(true).try_init().is_ok(),
    };
    if installed {
        tracing::debug!(filter = %config.filter, format = ?config.format, "logging initialized");
    }
    Ok(installed)
}
