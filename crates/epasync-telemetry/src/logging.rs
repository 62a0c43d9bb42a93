//! Structured logging.
//!
//! Logs go to stderr so that command output on stdout stays machine-readable.

use crate::{LogFormat, TelemetryConfig, TelemetryError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the logging subsystem.
///
/// `RUST_LOG` overrides the configured level when set.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => init_json_logging(filter),
        LogFormat::Pretty => init_pretty_logging(filter),
    }
}

fn init_json_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let json_layer = fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_current_span(false)
        .with_span_list(false)
        .flatten_event(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

fn init_pretty_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let pretty_layer = fmt::layer()
        .pretty()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(pretty_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

/// Standard log event names.
pub mod events {
    /// A command started.
    pub const STARTUP: &str = "startup";

    /// Rules configuration was loaded.
    pub const RULES_LOADED: &str = "rules_loaded";

    /// A document was built.
    pub const DOCUMENT_BUILT: &str = "document_built";

    /// A document could not be built.
    pub const DOCUMENT_REJECTED: &str = "document_rejected";

    /// Best-practice validation finished for a document.
    pub const VALIDATION_COMPLETED: &str = "validation_completed";
}

/// Helper macros for structured logging with standard fields.
#[macro_export]
macro_rules! log_startup {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::STARTUP,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_rules_loaded {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::RULES_LOADED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_document_built {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::DOCUMENT_BUILT,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_document_rejected {
    ($($field:tt)*) => {
        tracing::warn!(
            event = $crate::logging::events::DOCUMENT_REJECTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_validation_completed {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::VALIDATION_COMPLETED,
            $($field)*
        )
    };
}
