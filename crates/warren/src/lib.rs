//! # Warren
//!
//! **Multi-tenant HTTP services with namespaced configuration**
//!
//! Warren serves many sites from one process. Each request is negotiated to
//! a configuration namespace, usually from its `Host` header, and every
//! middleware and handler below that point sees the configuration of that
//! namespace only.
//!
//! - **Namespaced configuration** – typed keys resolved through ordered
//!   providers (environment, `.env`, JSON, YAML, TOML directories)
//! - **Checked middleware order** – every middleware and handler declares the
//!   capabilities it needs and is rejected when they are not provided
//! - **Per-site middlewares** – enable a middleware only for the namespaces
//!   that configure it
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use warren::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     App::new(".")?
//!         .run(|server| server.register(&MyService))
//!         .await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → RequestId → RequestLog → Config(namespace) → route middlewares → Handler
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod app;

pub use app::{
    default_collection, App, NegotiationConfig, SitesConfig, NEGOTIATION_CONFIG_KEY,
    SITES_CONFIG_KEY,
};

// Re-export configuration types
pub use warren_config as config;

// Re-export middleware types
pub use warren_middleware as middleware;

// Re-export server types
pub use warren_server as server;

// Re-export telemetry setup
pub use warren_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use warren::prelude::*;
/// ```
pub mod prelude {
    pub use crate::app::{App, NegotiationConfig, SitesConfig};

    pub use warren_config::{
        Collection, Config, ConfigError, ConfigStore, ConfigValue, WritableConfig,
        DEFAULT_NAMESPACE,
    };

    pub use warren_middleware::stages::{
        config, writable_config, ConfigMiddleware, ConfiguredMiddleware, HostMapNegotiator,
        HostNegotiator, Namespace, NamespaceNegotiator, RequestIdMiddleware, RequestLogMiddleware,
    };
    pub use warren_middleware::{
        handler_fn, with_dependencies, BoxFuture, Handler, Middleware, MiddlewareContext, Next,
        Request, Response, ResponseExt,
    };

    pub use warren_server::{Server, ServerConfig, ServerError, Service};
}
