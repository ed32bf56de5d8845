//! Request logging middleware.
//!
//! Emits one structured log event per completed request. Server errors are
//! logged at `warn`, everything else at `info`.

use std::time::Instant;

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::stages::config::Namespace;
use crate::types::{Request, Response};

/// Capability name of [`RequestLogMiddleware`].
pub const REQUEST_LOG_CAPABILITY: &str = "request_log";

/// Middleware that logs method, path, status and duration of each request.
///
/// Depends on `request_id` so every line carries the request ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogMiddleware;

impl RequestLogMiddleware {
    /// Creates the request log middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for RequestLogMiddleware {
    fn name(&self) -> &'static str {
        REQUEST_LOG_CAPABILITY
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
            let start = Instant::now();
            let method = request.method().clone();
            let path = request.uri().path().to_string();

            let response = next.run(ctx, request).await;

            let status = response.status().as_u16();
            let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
            let request_id = ctx.request_id().to_string();
            let namespace = ctx.get_extension::<Namespace>().map(|ns| ns.0.as_str());

            if response.status().is_server_error() {
                tracing::warn!(
                    request_id = %request_id,
                    namespace,
                    http.method = %method,
                    http.path = %path,
                    http.status_code = status,
                    duration_ms,
                    "request failed"
                );
            } else {
                tracing::info!(
                    request_id = %request_id,
                    namespace,
                    http.method = %method,
                    http.path = %path,
                    http.status_code = status,
                    duration_ms,
                    "request completed"
                );
            }

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::handler_fn;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;

    #[test]
    fn test_depends_on_request_id() {
        let middleware = RequestLogMiddleware::new();
        assert_eq!(middleware.name(), "request_log");
        assert_eq!(middleware.dependencies(), vec!["request_id"]);
    }

    #[tokio::test]
    async fn test_passes_response_through() {
        let handler = handler_fn(|_ctx, _request| {
            Box::pin(async {
                let mut response = Response::new(Full::new(Bytes::new()));
                *response.status_mut() = StatusCode::BAD_GATEWAY;
                response
            })
        });
        let mut ctx = MiddlewareContext::new();
        let request = http::Request::builder()
            .uri("/log")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = RequestLogMiddleware::new()
            .process(&mut ctx, request, Next::new(&handler))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
