//! Request ID middleware.
//!
//! Assigns every request a [`RequestId`] and echoes it back in the
//! `X-Request-ID` response header. Provides the `request_id` capability that
//! the request log depends on.

use http::HeaderValue;
use uuid::Uuid;

use crate::context::{MiddlewareContext, RequestId};
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};

/// The header name for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware that generates or extracts request IDs.
///
/// Incoming `X-Request-ID` headers are ignored unless the middleware is
/// created with [`RequestIdMiddleware::trust_incoming`].
#[derive(Debug, Clone, Default)]
pub struct RequestIdMiddleware {
    trust_incoming: bool,
}

impl RequestIdMiddleware {
    /// Creates a middleware that always generates new IDs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a middleware that reuses valid incoming IDs.
    #[must_use]
    pub fn trust_incoming() -> Self {
        Self { trust_incoming: true }
    }

    fn extract_request_id(&self, request: &Request) -> Option<RequestId> {
        if !self.trust_incoming {
            return None;
        }

        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(RequestId::from_uuid)
    }
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let request_id = self
                .extract_request_id(&request)
                .unwrap_or_else(RequestId::new);
            ctx.set_request_id(request_id);

            let mut response = next.run(ctx, request).await;

            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{handler_fn, Handler};
    use bytes::Bytes;
    use http_body_util::Full;

    fn request(header: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri("/test");
        if let Some(id) = header {
            builder = builder.header(REQUEST_ID_HEADER, id);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    fn echo_id() -> impl Handler {
        handler_fn(|ctx, _request| {
            let id = ctx.request_id().to_string();
            Box::pin(async move { Response::new(Full::new(Bytes::from(id))) })
        })
    }

    async fn run(middleware: RequestIdMiddleware, request: Request) -> (MiddlewareContext, Response) {
        let handler = echo_id();
        let mut ctx = MiddlewareContext::new();
        let response = middleware.process(&mut ctx, request, Next::new(&handler)).await;
        (ctx, response)
    }

    #[tokio::test]
    async fn test_sets_response_header() {
        let (ctx, response) = run(RequestIdMiddleware::new(), request(None)).await;
        let header = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert_eq!(header.to_str().unwrap(), ctx.request_id().to_string());
    }

    #[tokio::test]
    async fn test_untrusted_header_is_replaced() {
        let incoming = Uuid::now_v7().to_string();
        let (ctx, _) = run(RequestIdMiddleware::new(), request(Some(&incoming))).await;
        assert_ne!(ctx.request_id().to_string(), incoming);
    }

    #[tokio::test]
    async fn test_trusted_header_is_reused() {
        let incoming = Uuid::now_v7().to_string();
        let (ctx, _) = run(RequestIdMiddleware::trust_incoming(), request(Some(&incoming))).await;
        assert_eq!(ctx.request_id().to_string(), incoming);
    }

    #[tokio::test]
    async fn test_invalid_trusted_header_is_replaced() {
        let (ctx, response) = run(RequestIdMiddleware::trust_incoming(), request(Some("nope"))).await;
        assert_ne!(ctx.request_id().to_string(), "nope");
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }
}
