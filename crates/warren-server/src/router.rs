//! Route table.
//!
//! Routes are `{param}` path templates bound to a method and a composed
//! handler. Routes are checked in registration order; the first match wins.
//!
//! ```rust
//! use http::Method;
//! use warren_server::{RouteLookup, Router};
//! # use warren_middleware::{handler_fn, Response};
//! # use http_body_util::Full;
//! # use bytes::Bytes;
//! # use std::sync::Arc;
//!
//! let mut router = Router::new();
//! # let handler = Arc::new(handler_fn(|_, _| Box::pin(async { Response::new(Full::new(Bytes::new())) })));
//! router.add_route(Method::GET, "/sites/{site}/pages/{page}", handler);
//!
//! match router.lookup(&Method::GET, "/sites/blog/pages/about") {
//!     RouteLookup::Found { params, .. } => assert_eq!(params["page"], "about"),
//!     _ => unreachable!(),
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use http::header::ALLOW;
use http::{HeaderValue, Method, StatusCode};
use warren_middleware::{BoxFuture, BoxedHandler, Handler, MiddlewareContext, Request, Response, ResponseExt};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

fn parse_segments(pattern: &str) -> Vec<Segment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(s.to_string()),
        })
        .collect()
}

struct Route {
    method: Method,
    pattern: String,
    segments: Vec<Segment>,
    handler: BoxedHandler,
}

impl Route {
    fn match_path(&self, path: &[&str]) -> Option<HashMap<String, String>> {
        if path.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, actual) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(expected) if expected == actual => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*actual).to_string());
                }
            }
        }
        Some(params)
    }
}

/// Result of a route lookup.
pub enum RouteLookup<'r> {
    /// A route matched the method and path.
    Found {
        /// The route's handler.
        handler: &'r BoxedHandler,
        /// Captured path parameters.
        params: HashMap<String, String>,
    },
    /// The path matched, but only for other methods.
    MethodNotAllowed {
        /// Methods that do match the path.
        allowed: Vec<Method>,
    },
    /// No route matched the path.
    NotFound,
}

/// Method and path dispatch to composed route handlers.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route.
    pub fn add_route(&mut self, method: Method, pattern: impl AsRef<str>, handler: BoxedHandler) {
        let pattern = pattern.as_ref();
        self.routes.push(Route {
            method,
            pattern: pattern.to_string(),
            segments: parse_segments(pattern),
            handler,
        });
    }

    /// Number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Registered `(method, pattern)` pairs, in order.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes.iter().map(|r| (&r.method, r.pattern.as_str()))
    }

    /// Finds the route for `method` and `path`.
    pub fn lookup(&self, method: &Method, path: &str) -> RouteLookup<'_> {
        let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut allowed = Vec::new();

        for route in &self.routes {
            let Some(params) = route.match_path(&path) else {
                continue;
            };
            if route.method == *method {
                return RouteLookup::Found {
                    handler: &route.handler,
                    params,
                };
            }
            if !allowed.contains(&route.method) {
                allowed.push(route.method.clone());
            }
        }

        if allowed.is_empty() {
            RouteLookup::NotFound
        } else {
            RouteLookup::MethodNotAllowed { allowed }
        }
    }
}

impl Handler for Router {
    fn call<'a>(&'a self, ctx: &'a mut MiddlewareContext, request: Request) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let path = request.uri().path().to_string();
            match self.lookup(request.method(), &path) {
                RouteLookup::Found { handler, params } => {
                    ctx.set_path_params(params);
                    handler.call(ctx, request).await
                }
                RouteLookup::MethodNotAllowed { allowed } => {
                    let mut response = Response::json_error(
                        StatusCode::METHOD_NOT_ALLOWED,
                        "METHOD_NOT_ALLOWED",
                        &format!("method {} is not allowed for {path}", request.method()),
                    );
                    let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
                    if let Ok(value) = HeaderValue::from_str(&allow) {
                        response.headers_mut().insert(ALLOW, value);
                    }
                    response
                }
                RouteLookup::NotFound => Response::json_error(
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    &format!("no route for {path}"),
                ),
            }
        })
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|r| format!("{} {}", r.method, r.pattern)))
            .finish()
    }
}
