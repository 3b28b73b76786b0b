//! Tracing subscriber bootstrap.
//!
//! The orchestrators log through `tracing`, the worker pool through `log`;
//! `tracing-log` forwards the latter into the same subscriber.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ConfigError;

/// Builds the filter: `RUST_LOG` when set, the configured level otherwise.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let (json_layer, pretty_layer) = match config.format {
        LogFormat::Json => (Some(fmt::layer().json().with_current_span(true)), None),
        LogFormat::Pretty => (None, Some(fmt::layer().with_target(true))),
    };

    let subscriber = Registry::default()
        .with(env_filter(config))
        .with(json_layer)
        .with(pretty_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ConfigError::Logging(e.to_string()))?;
    tracing_log::LogTracer::init().map_err(|e| ConfigError::Logging(e.to_string()))?;

    tracing::debug!(level = %config.level, format = ?config.format, "Logging initialized");
    Ok(())
}
