//! Dependency-checked middleware for Warren.
//!
//! Middlewares are request layers that announce a capability name and the
//! capabilities they need from layers above them. A [`MiddlewareStack`]
//! refuses to add a middleware, or validate a handler, whose dependencies are
//! not already provided, so a misordered server fails at startup rather than
//! at request time.
//!
//! ## Modules
//!
//! - [`middleware`] - the [`Middleware`] and [`Handler`] traits and adapters
//! - [`stack`] - [`MiddlewareStack`] with parent-aware dependency checks
//! - [`context`] - [`MiddlewareContext`], the per-request state
//! - [`stages`] - request ID, request log and configuration middlewares
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use warren_middleware::stages::{RequestIdMiddleware, RequestLogMiddleware};
//! use warren_middleware::MiddlewareStack;
//!
//! let mut stack = MiddlewareStack::new();
//! stack.push(Arc::new(RequestIdMiddleware::new()))?;
//! stack.push(Arc::new(RequestLogMiddleware::new()))?;
//! ```

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod middleware;
pub mod stack;
pub mod stages;
pub mod types;

pub use context::{MiddlewareContext, RequestId};
pub use error::DependencyError;
pub use middleware::{
    handler_fn, with_dependencies, wrap, BoxFuture, BoxedHandler, DependentHandler, FnHandler,
    FnMiddleware, Handler, Middleware, Next,
};
pub use stack::MiddlewareStack;
pub use types::{Request, Response, ResponseExt};
