//! The Warren HTTP server.
//!
//! A [`Server`] owns the root middleware stack, the route table and the
//! [`ConfigStore`]. It is assembled at startup: middlewares, routes and
//! services are added, every dependency is checked as it is added, and
//! configuration schemas are registered with the store. [`Server::run`] then
//! serves HTTP/1 connections with hyper until shutdown.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warren_config::ConfigStore;
//! use warren_middleware::stages::{ConfigMiddleware, HostNegotiator, RequestIdMiddleware};
//! use warren_server::{Server, ServerConfig};
//!
//! let store = ConfigStore::new();
//! let mut server = Server::new(ServerConfig::default(), store.clone());
//! server.use_middleware(Arc::new(RequestIdMiddleware::new()))?;
//! server.use_middleware(Arc::new(ConfigMiddleware::new(store, HostNegotiator::skip_port())))?;
//! server.get("/", Arc::new(index), Vec::new())?;
//! server.run().await?;
//! ```

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use warren_config::ConfigStore;
use warren_middleware::{
    BoxedHandler, Handler, Middleware, MiddlewareContext, MiddlewareStack, Response, ResponseExt,
};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::router::Router;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// A group of routes registered together.
pub trait Service {
    /// Name of this service instance. Must not be empty.
    fn name(&self) -> &str;

    /// Registers the service's routes and middlewares.
    fn register(&self, server: &mut Server) -> Result<(), ServerError>;
}

/// The HTTP server.
pub struct Server {
    config: ServerConfig,
    store: ConfigStore,
    stack: MiddlewareStack<'static>,
    router: Router,
    services: Vec<String>,
}

impl Server {
    /// Creates a server with an empty middleware stack and no routes.
    pub fn new(config: ServerConfig, store: ConfigStore) -> Self {
        Self {
            config,
            store,
            stack: MiddlewareStack::new(),
            router: Router::new(),
            services: Vec::new(),
        }
    }

    /// Server settings.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The configuration store.
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// The route table.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Names of the registered services, in registration order.
    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Appends a middleware to the end of the server stack.
    ///
    /// # Panics
    ///
    /// Panics if a configuration key the middleware publishes is already
    /// registered with a different type.
    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) -> Result<(), ServerError> {
        let schemas = middleware.config_schema();
        self.stack.push(middleware)?;
        self.store.register_schemas(schemas);
        Ok(())
    }

    /// Prepends a middleware to the start of the server stack.
    ///
    /// # Panics
    ///
    /// Panics on a conflicting configuration schema, like
    /// [`Server::use_middleware`].
    pub fn use_top(&mut self, middleware: Arc<dyn Middleware>) -> Result<(), ServerError> {
        let schemas = middleware.config_schema();
        self.stack.shift(middleware)?;
        self.store.register_schemas(schemas);
        Ok(())
    }

    /// Adds a route.
    ///
    /// `middlewares` apply to this route only, inside the server stack. The
    /// handler's dependencies are checked against both.
    ///
    /// # Panics
    ///
    /// Panics on a conflicting configuration schema, like
    /// [`Server::use_middleware`].
    pub fn handle(
        &mut self,
        method: Method,
        path: &str,
        handler: Arc<dyn Handler>,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), ServerError> {
        let composed = {
            let mut route_stack = MiddlewareStack::with_parent(&self.stack);
            for middleware in middlewares {
                let schemas = middleware.config_schema();
                route_stack.push(middleware)?;
                self.store.register_schemas(schemas);
            }
            route_stack.validate_handler(handler.as_ref())?;
            self.store.register_schemas(handler.config_schema());
            route_stack.wrap(handler)
        };

        tracing::debug!(method = %method, path, "route registered");
        self.router.add_route(method, path, composed);
        Ok(())
    }

    /// Adds a GET route.
    pub fn get(
        &mut self,
        path: &str,
        handler: Arc<dyn Handler>,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), ServerError> {
        self.handle(Method::GET, path, handler, middlewares)
    }

    /// Adds a POST route.
    pub fn post(
        &mut self,
        path: &str,
        handler: Arc<dyn Handler>,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), ServerError> {
        self.handle(Method::POST, path, handler, middlewares)
    }

    /// Adds a PUT route.
    pub fn put(
        &mut self,
        path: &str,
        handler: Arc<dyn Handler>,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), ServerError> {
        self.handle(Method::PUT, path, handler, middlewares)
    }

    /// Adds a PATCH route.
    pub fn patch(
        &mut self,
        path: &str,
        handler: Arc<dyn Handler>,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), ServerError> {
        self.handle(Method::PATCH, path, handler, middlewares)
    }

    /// Adds a DELETE route.
    pub fn delete(
        &mut self,
        path: &str,
        handler: Arc<dyn Handler>,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), ServerError> {
        self.handle(Method::DELETE, path, handler, middlewares)
    }

    /// Registers a service.
    pub fn register(&mut self, service: &dyn Service) -> Result<(), ServerError> {
        let name = service.name();
        if name.is_empty() {
            return Err(ServerError::EmptyServiceName);
        }
        service.register(self)?;
        tracing::info!(service = name, "service registered");
        self.services.push(name.to_string());
        Ok(())
    }

    /// The fully composed handler: the server stack around the router.
    pub fn handler(self) -> BoxedHandler {
        let router: BoxedHandler = Arc::new(self.router);
        self.stack.wrap(router)
    }

    /// Runs until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(ShutdownSignal::with_os_signals()).await
    }

    /// Runs until `shutdown` is triggered, then drains open connections for
    /// up to the configured shutdown timeout.
    pub async fn run_until(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().map_err(|source| ServerError::InvalidAddress {
            addr: self.config.http_addr().to_string(),
            source,
        })?;
        let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound `listener`.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "server listening");

        let config = self.config.clone();
        let handler = self.handler();
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let token = tracker.acquire();
                        let handler = Arc::clone(&handler);
                        let shutdown = shutdown.clone();
                        let config = config.clone();
                        tokio::spawn(async move {
                            serve_connection(stream, handler, config, shutdown).await;
                            tracing::trace!(remote = %remote, "connection closed");
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        let timeout = config.shutdown_timeout();
        tracing::info!(
            active = tracker.active_connections(),
            timeout_secs = timeout.as_secs(),
            "draining connections"
        );
        if tokio::time::timeout(timeout, tracker.drained()).await.is_err() {
            tracing::warn!(
                active = tracker.active_connections(),
                "shutdown timeout reached with open connections"
            );
        }

        tracing::info!("server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    handler: BoxedHandler,
    config: ServerConfig,
    shutdown: ShutdownSignal,
) {
    let service = service_fn(move |request: http::Request<Incoming>| {
        let handler = Arc::clone(&handler);
        let timeout = config.request_timeout();
        async move {
            let response = match tokio::time::timeout(timeout, dispatch(handler.as_ref(), request)).await {
                Ok(response) => response,
                Err(_) => Response::json_error(
                    StatusCode::GATEWAY_TIMEOUT,
                    "REQUEST_TIMEOUT",
                    "request timed out",
                ),
            };
            Ok::<_, Infallible>(response)
        }
    });

    let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    tokio::select! {
        result = connection.as_mut() => {
            if let Err(e) = result {
                tracing::debug!(error = %e, "connection error");
            }
        }
        () = shutdown.recv() => {
            connection.as_mut().graceful_shutdown();
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "connection error during shutdown");
            }
        }
    }
}

/// Collects the request body and runs `handler` with a fresh context.
async fn dispatch(handler: &dyn Handler, request: http::Request<Incoming>) -> Response {
    let (parts, body) = request.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read request body");
            return Response::json_error(StatusCode::BAD_REQUEST, "BODY_READ_ERROR", &e.to_string());
        }
    };

    let request = http::Request::from_parts(parts, Full::new(body));
    let mut ctx = MiddlewareContext::new();
    handler.call(&mut ctx, request).await
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("stack", &self.stack)
            .field("router", &self.router)
            .field("services", &self.services)
            .finish_non_exhaustive()
    }
}
