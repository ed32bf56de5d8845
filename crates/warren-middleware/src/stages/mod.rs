//! Built-in middleware stages.
//!
//! - [`request_id`] - assign and echo request IDs (`request_id`)
//! - [`request_log`] - one log event per request (`request_log`)
//! - [`config`] - per-request namespace configuration (`config`)
//! - [`namespace`] - negotiators used by the config middleware

pub mod config;
pub mod namespace;
pub mod request_id;
pub mod request_log;

pub use config::{config, writable_config, ConfigMiddleware, ConfiguredMiddleware, Namespace};
pub use namespace::{
    ChainedNegotiator, HostMapNegotiator, HostNegotiator, NamespaceNegotiator, NegotiationError,
};
pub use request_id::RequestIdMiddleware;
pub use request_log::{RequestLogMiddleware, REQUEST_LOG_CAPABILITY};
