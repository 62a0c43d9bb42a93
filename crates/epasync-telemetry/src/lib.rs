//! Logging setup for epasync.
//!
//! Library crates log through plain `tracing` macros; this crate owns the
//! subscriber (JSON or pretty, filtered by `RUST_LOG` or the configured
//! level) and the standard event names stamped by the `log_*!` macros.
//!
//! # Usage
//!
//! ```ignore
//! use epasync_telemetry::{LogFormat, TelemetryConfig};
//!
//! let config = TelemetryConfig::new()
//!     .with_log_level("debug")
//!     .with_log_format(LogFormat::Pretty);
//! epasync_telemetry::init(&config)?;
//! ```

pub mod config;
pub mod logging;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::events;

use thiserror::Error;

/// Telemetry errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Unknown log format name.
    #[error("unknown log format '{0}' (expected json or pretty)")]
    UnknownLogFormat(String),
}

/// Install the global subscriber and log the startup event.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    logging::init_logging(config)?;
    log_startup!(
        service = %config.service_name,
        log_level = %config.log_level,
        log_format = %config.log_format,
        "logging initialized"
    );
    Ok(())
}

/// Build a config from CLI-style strings.
pub fn config_from_args(log_level: &str, log_format: &str) -> Result<TelemetryConfig, TelemetryError> {
    let format = LogFormat::parse(log_format)
        .ok_or_else(|| TelemetryError::UnknownLogFormat(log_format.to_string()))?;
    Ok(TelemetryConfig::new()
        .with_log_level(log_level)
        .with_log_format(format))
}
