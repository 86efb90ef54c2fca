//! Method + path dispatch table
//!
//! Two kinds of routes are supported: fully static paths and paths ending in exactly one
//! dynamic segment (`/users/:id`). Static matches always win; there is no backtracking,
//! no wildcard and no multi-segment parameter.
//!
//! The table is built with `&mut self` before serving and then shared immutably (usually
//! behind an `Arc`), so it cannot change once dispatching has started.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use tracing::debug;

use crate::{Body, HttpResponse, error::RouteError};

/// Something that turns a request into a response
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: Request<Body>) -> HttpResponse;
}

#[async_trait]
impl<H> Handler for Arc<H>
where
    H: Handler + ?Sized,
{
    async fn handle(&self, request: Request<Body>) -> HttpResponse {
        (**self).handle(request).await
    }
}

/// Handler backed by an async closure, see [`handler_fn`]
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure as a [`Handler`]
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = HttpResponse> + Send,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = HttpResponse> + Send,
{
    async fn handle(&self, request: Request<Body>) -> HttpResponse {
        (self.f)(request).await
    }
}

/// Responds with a bare status code and an empty body
#[derive(Debug, Clone, Copy)]
pub struct StatusHandler(pub StatusCode);

#[async_trait]
impl Handler for StatusHandler {
    async fn handle(&self, _request: Request<Body>) -> HttpResponse {
        let mut response = Response::new(Full::default());
        *response.status_mut() = self.0;
        response
    }
}

/// Trailing path parameter bound by the router, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParam {
    pub name: String,
    pub value: String,
}

const METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::OPTIONS,
];

fn slot_index(method: &Method) -> Option<usize> {
    METHODS.iter().position(|m| m == method)
}

#[derive(Default)]
struct Route {
    param: Option<String>,
    slots: [Option<Arc<dyn Handler>>; 6],
}

impl Route {
    fn handler(&self, method: &Method) -> Option<&Arc<dyn Handler>> {
        slot_index(method).and_then(|i| self.slots[i].as_ref())
    }
}

/// Outcome of a route table lookup
pub enum RouteMatch<'a> {
    Found {
        handler: &'a Arc<dyn Handler>,
        param: Option<PathParam>,
    },
    MethodNotAllowed,
    NotFound,
}

pub struct Router {
    static_routes: HashMap<String, Route>,
    param_routes: HashMap<String, Route>,
    not_found: Arc<dyn Handler>,
    method_not_allowed: Arc<dyn Handler>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            static_routes: HashMap::new(),
            param_routes: HashMap::new(),
            not_found: Arc::new(StatusHandler(StatusCode::NOT_FOUND)),
            method_not_allowed: Arc::new(StatusHandler(StatusCode::METHOD_NOT_ALLOWED)),
        }
    }

    /// Register `handler` for `method` on `pattern`
    ///
    /// A pattern containing `/:` is a parameter route: the part before it is the base path and
    /// the rest is the parameter name. Every pattern sharing a base path must use the same
    /// parameter name. Registering the same method and pattern twice replaces the handler.
    pub fn route<H>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<&mut Self, RouteError>
    where
        H: Handler + 'static,
    {
        if pattern.is_empty() {
            return Err(RouteError::EmptyPath);
        }
        let slot =
            slot_index(&method).ok_or_else(|| RouteError::UnsupportedMethod(method.clone()))?;
        let handler: Arc<dyn Handler> = Arc::new(handler);

        let route = match pattern.find("/:") {
            Some(index) => {
                let base = &pattern[..index];
                let name = &pattern[index + 2..];
                if base.is_empty() {
                    return Err(RouteError::EmptyBasePath(pattern.to_string()));
                }
                if name.is_empty() || name.contains('/') {
                    return Err(RouteError::InvalidParamName(pattern.to_string()));
                }

                let route = self.param_routes.entry(base.to_string()).or_default();
                if let Some(existing) = route.param.as_deref()
                    && existing != name
                {
                    return Err(RouteError::ParamConflict {
                        method,
                        pattern: pattern.to_string(),
                        requested: name.to_string(),
                        existing: existing.to_string(),
                    });
                }
                route.param.get_or_insert_with(|| name.to_string());
                route
            }
            None => self.static_routes.entry(pattern.to_string()).or_default(),
        };

        debug!("registered route {} {}", method, pattern);
        route.slots[slot] = Some(handler);
        Ok(self)
    }

    pub fn get<H>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Handler + 'static,
    {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post<H>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Handler + 'static,
    {
        self.route(Method::POST, pattern, handler)
    }

    pub fn put<H>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Handler + 'static,
    {
        self.route(Method::PUT, pattern, handler)
    }

    pub fn delete<H>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Handler + 'static,
    {
        self.route(Method::DELETE, pattern, handler)
    }

    pub fn patch<H>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Handler + 'static,
    {
        self.route(Method::PATCH, pattern, handler)
    }

    pub fn options<H>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Handler + 'static,
    {
        self.route(Method::OPTIONS, pattern, handler)
    }

    /// Replace the handler used when no route matches the path
    pub fn not_found<H: Handler + 'static>(&mut self, handler: H) -> &mut Self {
        self.not_found = Arc::new(handler);
        self
    }

    /// Replace the handler used when the path matches but the method does not
    pub fn method_not_allowed<H: Handler + 'static>(&mut self, handler: H) -> &mut Self {
        self.method_not_allowed = Arc::new(handler);
        self
    }

    /// Resolve a method and path against the table without invoking anything
    pub fn lookup(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        if let Some(route) = self.static_routes.get(path) {
            return match route.handler(method) {
                Some(handler) => RouteMatch::Found {
                    handler,
                    param: None,
                },
                None => RouteMatch::MethodNotAllowed,
            };
        }

        if let Some(index) = path.rfind('/')
            && index > 0
            && index < path.len() - 1
            && let Some(route) = self.param_routes.get(&path[..index])
        {
            return match route.handler(method) {
                Some(handler) => RouteMatch::Found {
                    handler,
                    param: route.param.as_ref().map(|name| PathParam {
                        name: name.clone(),
                        value: decode_segment(&path[index + 1..]),
                    }),
                },
                None => RouteMatch::MethodNotAllowed,
            };
        }

        RouteMatch::NotFound
    }

    pub async fn dispatch(&self, mut request: Request<Body>) -> HttpResponse {
        let matched = self.lookup(request.method(), request.uri().path());
        let handler = match matched {
            RouteMatch::Found { handler, param } => {
                if let Some(param) = param {
                    request.extensions_mut().insert(param);
                }
                handler
            }
            RouteMatch::MethodNotAllowed => &self.method_not_allowed,
            RouteMatch::NotFound => &self.not_found,
        };
        handler.handle(request).await
    }
}

#[async_trait]
impl Handler for Router {
    async fn handle(&self, request: Request<Body>) -> HttpResponse {
        self.dispatch(request).await
    }
}

fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok() -> StatusHandler {
        StatusHandler(StatusCode::OK)
    }

    #[test]
    fn test_rejects_empty_path_and_unknown_method() {
        let mut router = Router::new();
        assert_eq!(
            router.route(Method::GET, "", ok()).err(),
            Some(RouteError::EmptyPath)
        );
        assert_eq!(
            router.route(Method::HEAD, "/a", ok()).err(),
            Some(RouteError::UnsupportedMethod(Method::HEAD))
        );
    }

    #[test]
    fn test_rejects_malformed_parameter_patterns() {
        let mut router = Router::new();
        assert!(matches!(
            router.get("/:id", ok()),
            Err(RouteError::EmptyBasePath(_))
        ));
        assert!(matches!(
            router.get("/api/:", ok()),
            Err(RouteError::InvalidParamName(_))
        ));
        assert!(matches!(
            router.get("/api/:id/details", ok()),
            Err(RouteError::InvalidParamName(_))
        ));
    }

    #[test]
    fn test_parameter_name_conflict() {
        let mut router = Router::new();
        router.get("/api/:id", ok()).unwrap();
        router.post("/api/:id", ok()).unwrap();

        let err = router.put("/api/:name", ok()).err().unwrap();
        assert_eq!(
            err.to_string(),
            "PUT /api/:name parameter name differs from id declared earlier"
        );
    }

    #[test]
    fn test_lookup_binds_trailing_segment() {
        let mut router = Router::new();
        router.get("/api/:id", ok()).unwrap();

        match router.lookup(&Method::GET, "/api/123") {
            RouteMatch::Found { param, .. } => assert_eq!(
                param,
                Some(PathParam {
                    name: "id".into(),
                    value: "123".into()
                })
            ),
            _ => panic!("expected a match"),
        }
        assert!(matches!(
            router.lookup(&Method::GET, "/api/"),
            RouteMatch::NotFound
        ));
        assert!(matches!(
            router.lookup(&Method::GET, "/api/1/2"),
            RouteMatch::NotFound
        ));
        assert!(matches!(
            router.lookup(&Method::DELETE, "/api/1"),
            RouteMatch::MethodNotAllowed
        ));
    }

    #[test]
    fn test_static_route_dominates_parameter_route() {
        let mut router = Router::new();
        router.get("/api/:id", ok()).unwrap();
        router.post("/api/special", ok()).unwrap();

        // Static path is known, so a GET there is 405 rather than falling back to /api/:id
        assert!(matches!(
            router.lookup(&Method::GET, "/api/special"),
            RouteMatch::MethodNotAllowed
        ));
    }
}
