//! Per-request configuration.
//!
//! [`ConfigMiddleware`] negotiates the namespace of each request and attaches
//! that namespace's [`Config`] and [`WritableConfig`] to the context. Later
//! layers read them with [`config`] and [`writable_config`].
//!
//! [`ConfiguredMiddleware`] builds on it: the middleware it runs is itself a
//! configuration value, resolved per request from the namespace's config.

use std::marker::PhantomData;
use std::sync::Arc;

use http::StatusCode;
use warren_config::{Config, ConfigStore, ConfigValue, Schema, WritableConfig};

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::stages::namespace::NamespaceNegotiator;
use crate::stages::request_log::REQUEST_LOG_CAPABILITY;
use crate::types::{Request, Response, ResponseExt};

/// Capability name of [`ConfigMiddleware`].
pub const CONFIG_CAPABILITY: &str = "config";

/// The negotiated namespace of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace(pub String);

/// Returns the request's read-only config, if [`ConfigMiddleware`] ran.
pub fn config(ctx: &MiddlewareContext) -> Option<&Config> {
    ctx.get_extension::<Config>()
}

/// Returns the request's writable config, if [`ConfigMiddleware`] ran.
pub fn writable_config(ctx: &MiddlewareContext) -> Option<&WritableConfig> {
    ctx.get_extension::<WritableConfig>()
}

/// Attaches the negotiated namespace's configuration to each request.
///
/// Requests whose host cannot be negotiated, or whose namespace has no
/// collection, are answered with `404 Not Found`.
pub struct ConfigMiddleware {
    store: ConfigStore,
    negotiator: Arc<dyn NamespaceNegotiator>,
}

impl ConfigMiddleware {
    /// Creates the middleware over `store`.
    pub fn new(store: ConfigStore, negotiator: impl NamespaceNegotiator + 'static) -> Self {
        Self {
            store,
            negotiator: Arc::new(negotiator),
        }
    }

    /// Creates the middleware with a shared negotiator.
    pub fn with_shared_negotiator(store: ConfigStore, negotiator: Arc<dyn NamespaceNegotiator>) -> Self {
        Self { store, negotiator }
    }
}

impl Middleware for ConfigMiddleware {
    fn name(&self) -> &'static str {
        CONFIG_CAPABILITY
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let namespace = match self.negotiator.negotiate(&request) {
                Ok(namespace) => namespace,
                Err(e) => {
                    tracing::debug!(error = %e, "namespace negotiation failed");
                    return Response::json_error(StatusCode::NOT_FOUND, "HOST_NOT_FOUND", &e.to_string());
                }
            };

            let Some(writable) = self.store.get_writable(&namespace) else {
                tracing::debug!(namespace = %namespace, "namespace not found");
                return Response::json_error(
                    StatusCode::NOT_FOUND,
                    "NAMESPACE_NOT_FOUND",
                    "host not found",
                );
            };

            ctx.set_extension(writable.as_config().clone());
            ctx.set_extension(writable);
            ctx.set_extension(Namespace(namespace));

            next.run(ctx, request).await
        })
    }
}

/// Runs a middleware whose settings come from the request's config.
///
/// The middleware type `M` is registered under `key`. On each request the
/// value of `key` is resolved from the request's namespace and run; when the
/// key has no value or cannot be resolved the request continues unchanged,
/// and resolution failures go to the request log.
pub struct ConfiguredMiddleware<M> {
    key: String,
    _marker: PhantomData<fn() -> M>,
}

impl<M> ConfiguredMiddleware<M>
where
    M: Middleware + ConfigValue,
{
    /// Creates the wrapper reading `M` from `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            _marker: PhantomData,
        }
    }

    /// Config key of the wrapped middleware.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<M> Middleware for ConfiguredMiddleware<M>
where
    M: Middleware + ConfigValue,
{
    fn name(&self) -> &'static str {
        "configured"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        let mut dependencies = vec![CONFIG_CAPABILITY, REQUEST_LOG_CAPABILITY];
        for dependency in M::default().dependencies() {
            if !dependencies.contains(&dependency) {
                dependencies.push(dependency);
            }
        }
        dependencies
    }

    fn config_schema(&self) -> Vec<(String, Schema)> {
        vec![(self.key.clone(), Schema::of::<M>())]
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let resolved = match config(ctx) {
                Some(config) => config.get::<M>(&self.key),
                None => Ok(None),
            };

            match resolved {
                Ok(Some(middleware)) => middleware.process(ctx, request, next).await,
                Ok(None) => next.run(ctx, request).await,
                Err(e) => {
                    tracing::info!(key = %self.key, error = %e, "config not found");
                    next.run(ctx, request).await
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::handler_fn;
    use crate::stages::namespace::HostNegotiator;
    use bytes::Bytes;
    use http::header::HOST;
    use http_body_util::Full;
    use warren_config::{Collection, MemoryProvider};

    fn request(host: &str) -> Request {
        http::Request::builder()
            .uri("/")
            .header(HOST, host)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn store() -> ConfigStore {
        let store = ConfigStore::new();
        store.add_collection("known.test", Collection::new().with_provider(MemoryProvider::new()));
        store
    }

    #[tokio::test]
    async fn test_attaches_config() {
        let middleware = ConfigMiddleware::new(store(), HostNegotiator::skip_port());
        let handler = handler_fn(|ctx, _request| {
            let namespace = config(ctx).map(|c| c.namespace().to_string()).unwrap_or_default();
            let writable = writable_config(ctx).is_some();
            Box::pin(async move {
                let body = format!("{namespace}:{writable}");
                Response::new(Full::new(Bytes::from(body)))
            })
        });

        let mut ctx = MiddlewareContext::new();
        let response = middleware
            .process(&mut ctx, request("known.test:8080"), Next::new(&handler))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.get_extension::<Namespace>(), Some(&Namespace("known.test".to_string())));
    }

    #[tokio::test]
    async fn test_unknown_namespace_is_not_found() {
        let middleware = ConfigMiddleware::new(store(), HostNegotiator::new());
        let handler = handler_fn(|_ctx, _request| Box::pin(async { Response::new(Full::new(Bytes::new())) }));

        let mut ctx = MiddlewareContext::new();
        let response = middleware
            .process(&mut ctx, request("unknown.test"), Next::new(&handler))
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(config(&ctx).is_none());
    }

    #[test]
    fn test_configured_dependencies() {
        #[derive(Default, serde::Serialize, serde::Deserialize)]
        struct Logged;

        impl Middleware for Logged {
            fn name(&self) -> &'static str {
                "logged"
            }

            fn dependencies(&self) -> Vec<&'static str> {
                vec!["request_log"]
            }

            fn process<'a>(
                &'a self,
                ctx: &'a mut MiddlewareContext,
                request: Request,
                next: Next<'a>,
            ) -> BoxFuture<'a, Response> {
                Box::pin(next.run(ctx, request))
            }
        }

        let wrapper = ConfiguredMiddleware::<Logged>::new("logged");
        assert_eq!(wrapper.dependencies(), vec!["config", "request_log"]);

        let schema = wrapper.config_schema();
        assert_eq!(schema.len(), 1);
        assert_eq!(schema[0].0, "logged");
        assert!(schema[0].1.is::<Logged>());
    }
}
