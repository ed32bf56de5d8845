//! Telemetry error types.

use thiserror::Error;
use warren_config::ConfigError;

/// Errors that can occur while setting up telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Logging configuration could not be resolved.
    #[error("Failed to resolve logging configuration: {0}")]
    Config(#[from] ConfigError),
}
