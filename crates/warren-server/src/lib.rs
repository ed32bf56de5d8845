//! # Warren Server
//!
//! HTTP server for Warren: route registration with per-route middlewares,
//! service registration, and a hyper-based HTTP/1 runtime with graceful
//! shutdown.
//!
//! Every middleware and handler is dependency-checked as it is added, so a
//! server that starts is a server whose middleware order is valid.
//!
//! ## Example
//!
//! ```rust,ignore
//! use warren_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = warren_config::ConfigStore::new();
//!     let config = ServerConfig::from_store(&store)?;
//!     let server = Server::new(config, store);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod router;
pub mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder, SERVER_CONFIG_KEY};
pub use error::ServerError;
pub use router::{RouteLookup, Router};
pub use server::{Server, Service};
pub use shutdown::{ConnectionTracker, ShutdownSignal};
