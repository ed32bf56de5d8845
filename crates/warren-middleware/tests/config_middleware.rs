//! Namespace configuration flowing through a composed stack.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::header::HOST;
use http::{HeaderValue, StatusCode};
use http_body_util::{BodyExt, Full};
use serde::{Deserialize, Serialize};
use serde_json::json;
use warren_config::{Collection, ConfigStore, MemoryProvider};
use warren_middleware::stages::{
    config, ConfigMiddleware, ConfiguredMiddleware, HostMapNegotiator, HostNegotiator,
    RequestIdMiddleware, RequestLogMiddleware,
};
use warren_middleware::{
    handler_fn, with_dependencies, BoxFuture, Handler, Middleware, MiddlewareContext,
    MiddlewareStack, Next, Request, Response,
};

/// Adds an `x-banner` header carrying its configured text.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Banner {
    text: String,
}

impl Middleware for Banner {
    fn name(&self) -> &'static str {
        "banner"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["request_id"]
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let mut response = next.run(ctx, request).await;
            if let Ok(value) = HeaderValue::from_str(&self.text) {
                response.headers_mut().insert("x-banner", value);
            }
            response
        })
    }
}

fn store() -> ConfigStore {
    let store = ConfigStore::new();
    store.add_collection(
        "alpha",
        Collection::new().with_provider(
            MemoryProvider::new().with_value("banner", json!({"text": "hello alpha"})),
        ),
    );
    store.add_collection("beta", Collection::new().with_provider(MemoryProvider::new()));
    store
}

fn request(host: &str) -> Request {
    http::Request::builder()
        .uri("/")
        .header(HOST, host)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn namespace_echo() -> impl Handler {
    with_dependencies(
        handler_fn(|ctx, _request| {
            let namespace = config(ctx)
                .map(|c| c.namespace().to_string())
                .unwrap_or_default();
            Box::pin(async move { Response::new(Full::new(Bytes::from(namespace))) })
        }),
        &["config"],
    )
}

async fn body(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn composed(store: ConfigStore) -> Arc<dyn Handler> {
    let banner = ConfiguredMiddleware::<Banner>::new("banner");
    store.register_schemas(banner.config_schema());

    let mut stack = MiddlewareStack::new();
    stack.push(Arc::new(RequestIdMiddleware::new())).unwrap();
    stack.push(Arc::new(RequestLogMiddleware::new())).unwrap();
    stack
        .push(Arc::new(ConfigMiddleware::new(
            store,
            HostMapNegotiator::new()
                .with("alpha.test", "alpha")
                .with("beta.test", "beta"),
        )))
        .unwrap();
    stack.push(Arc::new(banner)).unwrap();

    let handler = namespace_echo();
    stack.validate_handler(&handler).unwrap();
    stack.wrap(Arc::new(handler))
}

#[tokio::test]
async fn test_configured_middleware_runs_with_namespace_values() {
    let handler = composed(store());
    let mut ctx = MiddlewareContext::new();
    let response = handler.call(&mut ctx, request("alpha.test")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-banner").unwrap(), "hello alpha");
    assert_eq!(body(response).await, "alpha");
}

#[tokio::test]
async fn test_configured_middleware_skipped_without_value() {
    let handler = composed(store());
    let mut ctx = MiddlewareContext::new();
    let response = handler.call(&mut ctx, request("beta.test")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-banner").is_none());
    assert_eq!(body(response).await, "beta");
}

#[tokio::test]
async fn test_unknown_host_stops_before_handler() {
    let reached = Arc::new(AtomicBool::new(false));
    let flag = reached.clone();
    let inner = handler_fn(move |_ctx, _request| {
        flag.store(true, Ordering::SeqCst);
        Box::pin(async { Response::new(Full::new(Bytes::new())) })
    });

    let mut stack = MiddlewareStack::new();
    stack
        .push(Arc::new(ConfigMiddleware::new(store(), HostNegotiator::new())))
        .unwrap();
    let handler = stack.wrap(Arc::new(inner));

    let mut ctx = MiddlewareContext::new();
    let response = handler.call(&mut ctx, request("gamma.test")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!reached.load(Ordering::SeqCst));
    let body: serde_json::Value = serde_json::from_str(&body(response).await).unwrap();
    assert_eq!(body["error"]["code"], "NAMESPACE_NOT_FOUND");
}

#[tokio::test]
async fn test_negotiation_failure_is_not_found() {
    let mut stack = MiddlewareStack::new();
    stack
        .push(Arc::new(ConfigMiddleware::new(store(), HostMapNegotiator::new())))
        .unwrap();
    let handler = stack.wrap(Arc::new(namespace_echo()));

    let mut ctx = MiddlewareContext::new();
    let response = handler.call(&mut ctx, request("alpha.test")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = serde_json::from_str(&body(response).await).unwrap();
    assert_eq!(body["error"]["code"], "HOST_NOT_FOUND");
}

#[test]
fn test_configured_requires_config_capability() {
    let mut stack = MiddlewareStack::new();
    stack.push(Arc::new(RequestIdMiddleware::new())).unwrap();
    let err = stack
        .push(Arc::new(ConfiguredMiddleware::<Banner>::new("banner")))
        .unwrap_err();
    assert_eq!(err.not_found, "config");
}

#[test]
fn test_configured_requires_request_log() {
    let mut stack = MiddlewareStack::new();
    stack.push(Arc::new(RequestIdMiddleware::new())).unwrap();
    stack
        .push(Arc::new(ConfigMiddleware::new(store(), HostNegotiator::new())))
        .unwrap();
    let err = stack
        .push(Arc::new(ConfiguredMiddleware::<Banner>::new("banner")))
        .unwrap_err();
    assert_eq!(err.not_found, "request_log");
    assert_eq!(err.provided, vec!["config", "request_id"]);

    stack.push(Arc::new(RequestLogMiddleware::new())).unwrap();
    stack
        .push(Arc::new(ConfiguredMiddleware::<Banner>::new("banner")))
        .unwrap();
}
