//! Logging setup for Warren services.
//!
//! Warren logs through `tracing`. This crate installs the subscriber:
//!
//! - [`LogConfig`] - level, output format and span event settings
//! - [`init_logging`] - installs the global `tracing-subscriber` registry
//! - [`logging::fields`] - shared field names for structured logs
//!
//! [`LogConfig`] is itself a configuration value, so a service can keep it
//! next to the rest of its settings:
//!
//! ```rust,ignore
//! use warren_config::ConfigStore;
//! use warren_telemetry::{init_logging, LogConfig};
//!
//! let store = ConfigStore::new();
//! // ... add the default collection ...
//! init_logging(&LogConfig::from_store(&store)?)?;
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig, LogFormat, LOG_CONFIG_KEY};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
