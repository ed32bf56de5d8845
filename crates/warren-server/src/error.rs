//! Server errors.

use thiserror::Error;
use warren_config::ConfigError;
use warren_middleware::DependencyError;

/// Errors raised while assembling or running a server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured bind address does not parse.
    #[error("invalid address {addr:?}: {source}")]
    InvalidAddress {
        /// The configured address.
        addr: String,
        /// Parse error.
        #[source]
        source: std::net::AddrParseError,
    },

    /// Binding the listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A middleware or handler dependency is not provided.
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// A service was registered without a name.
    #[error("service name must not be empty")]
    EmptyServiceName,

    /// A configuration operation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
