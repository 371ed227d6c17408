//! Logging setup
//!
//! `RUST_LOG` takes precedence over the configured level. Output is plain
//! text by default and JSON lines when configured.

use crate::config::LoggerConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Logging initialization failures
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Level is not a valid filter directive
    #[error("invalid log level {level:?}: {message}")]
    Filter { level: String, message: String },

    /// A global subscriber is already installed
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Filter from `RUST_LOG`, else from the configured level
///
/// # Errors
/// [`TelemetryError::Filter`] if the configured level does not parse.
pub fn env_filter(config: &LoggerConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| TelemetryError::Filter {
        level: config.level.clone(),
        message: e.to_string(),
    })
}

/// Install the global subscriber
///
/// # Errors
/// [`TelemetryError`] for a bad level or a second initialization.
pub fn init(config: &LoggerConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;

    let json = config.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_target(true)
    });
    let text = (!config.json).then(|| tracing_subscriber::fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .try_init()
        .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))
}
