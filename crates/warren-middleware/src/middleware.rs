//! Core middleware and handler traits.
//!
//! A [`Middleware`] wraps the rest of the chain: it receives the context, the
//! request and a [`Next`] that continues to the next layer. Every middleware
//! announces a capability name and the capabilities it depends on, so a
//! [`MiddlewareStack`](crate::stack::MiddlewareStack) can reject an ordering
//! that would leave a dependency unsatisfied.
//!
//! Handlers sit at the end of a chain and may declare dependencies as well.
//!
//! # Example
//!
//! ```ignore
//! use warren_middleware::{BoxFuture, Middleware, MiddlewareContext, Next, Request, Response};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut MiddlewareContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let response = next.run(ctx, request).await;
//!             tracing::debug!(elapsed = ?ctx.elapsed(), "request done");
//!             response
//!         })
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use warren_config::Schema;

use crate::context::MiddlewareContext;
use crate::types::{Request, Response};

/// A boxed future that returns a response.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Shared, type-erased handler.
pub type BoxedHandler = Arc<dyn Handler>;

/// A request processing layer.
///
/// # Invariants
///
/// - `process` calls `next.run()` at most once; not calling it short-circuits
///   the chain
/// - `name` is stable for the lifetime of the value
pub trait Middleware: Send + Sync + 'static {
    /// Capability name this middleware provides to later layers.
    fn name(&self) -> &'static str;

    /// Capability names that must be provided by earlier layers.
    fn dependencies(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Configuration keys this middleware reads, with their schemas.
    fn config_schema(&self) -> Vec<(String, Schema)> {
        Vec::new()
    }

    /// Processes the request, optionally delegating to `next`.
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// The end of a middleware chain.
pub trait Handler: Send + Sync + 'static {
    /// Produces the response for `request`.
    fn call<'a>(&'a self, ctx: &'a mut MiddlewareContext, request: Request) -> BoxFuture<'a, Response>;

    /// Capability names that must be provided by the wrapping stack.
    fn dependencies(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Configuration keys this handler reads, with their schemas.
    fn config_schema(&self) -> Vec<(String, Schema)> {
        Vec::new()
    }
}

/// Continuation to the rest of the chain.
///
/// Consumed by [`Next::run`], so it can only be invoked once.
pub struct Next<'a> {
    handler: &'a dyn Handler,
}

impl<'a> Next<'a> {
    /// Creates a continuation that invokes `handler`.
    pub fn new(handler: &'a dyn Handler) -> Self {
        Self { handler }
    }

    /// Invokes the next layer.
    pub async fn run(self, ctx: &mut MiddlewareContext, request: Request) -> Response {
        self.handler.call(ctx, request).await
    }
}

/// A middleware applied to the rest of its chain.
struct MiddlewareHandler {
    middleware: Arc<dyn Middleware>,
    next: BoxedHandler,
}

impl Handler for MiddlewareHandler {
    fn call<'a>(&'a self, ctx: &'a mut MiddlewareContext, request: Request) -> BoxFuture<'a, Response> {
        self.middleware
            .process(ctx, request, Next::new(self.next.as_ref()))
    }
}

/// Wraps `next` in `middleware`, producing a new handler.
pub fn wrap(middleware: Arc<dyn Middleware>, next: BoxedHandler) -> BoxedHandler {
    Arc::new(MiddlewareHandler { middleware, next })
}

/// A middleware defined by a function.
///
/// # Example
///
/// ```ignore
/// let header = FnMiddleware::new("powered_by", |ctx, request, next| {
///     Box::pin(async move {
///         let mut response = next.run(ctx, request).await;
///         response.headers_mut().insert("x-powered-by", HeaderValue::from_static("warren"));
///         response
///     })
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    dependencies: Vec<&'static str>,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a function-based middleware providing `name`.
    pub fn new(name: &'static str, func: F) -> Self
    where
        F: for<'a> Fn(&'a mut MiddlewareContext, Request, Next<'a>) -> BoxFuture<'a, Response>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name,
            dependencies: Vec::new(),
            func,
        }
    }

    /// Declares the capabilities this middleware depends on.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: &[&'static str]) -> Self {
        self.dependencies = dependencies.to_vec();
        self
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut MiddlewareContext, Request, Next<'a>) -> BoxFuture<'a, Response>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn dependencies(&self) -> Vec<&'static str> {
        self.dependencies.clone()
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        (self.func)(ctx, request, next)
    }
}

/// A handler defined by a function. See [`handler_fn`].
pub struct FnHandler<F> {
    func: F,
}

/// Creates a handler from a function.
pub fn handler_fn<F>(func: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut MiddlewareContext, Request) -> BoxFuture<'a, Response> + Send + Sync + 'static,
{
    FnHandler { func }
}

impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut MiddlewareContext, Request) -> BoxFuture<'a, Response> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut MiddlewareContext, request: Request) -> BoxFuture<'a, Response> {
        (self.func)(ctx, request)
    }
}

/// A handler with declared dependencies. See [`with_dependencies`].
pub struct DependentHandler<H> {
    inner: H,
    dependencies: Vec<&'static str>,
}

impl<H> DependentHandler<H> {
    /// Returns the wrapped handler.
    pub fn into_inner(self) -> H {
        self.inner
    }
}

/// Attaches capability dependencies to `handler`.
pub fn with_dependencies<H: Handler>(handler: H, dependencies: &[&'static str]) -> DependentHandler<H> {
    DependentHandler {
        inner: handler,
        dependencies: dependencies.to_vec(),
    }
}

impl<H: Handler> Handler for DependentHandler<H> {
    fn call<'a>(&'a self, ctx: &'a mut MiddlewareContext, request: Request) -> BoxFuture<'a, Response> {
        self.inner.call(ctx, request)
    }

    fn dependencies(&self) -> Vec<&'static str> {
        let mut dependencies = self.inner.dependencies();
        dependencies.extend(self.dependencies.iter().copied());
        dependencies
    }

    fn config_schema(&self) -> Vec<(String, Schema)> {
        self.inner.config_schema()
    }
}
