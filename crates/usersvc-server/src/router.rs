//! Request routing and path matching.
//!
//! The router maps a method and a path template to a handler. Templates
//! use `{name}` segments for path parameters, which are handed to the
//! handler as [`PathParams`].
//!
//! Unknown paths answer `404 {"status":404,"message":"route not found"}`;
//! known paths with an unregistered method answer 405 with an `Allow`
//! header listing the registered methods.
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use http::{Method, Request, StatusCode};
//! use usersvc_core::respond;
//! use usersvc_server::{PathParams, Router};
//!
//! let mut router = Router::new();
//! router.route(Method::GET, "/users/{id}", "getUser", |_req: Request<Bytes>, params: PathParams| async move {
//!     respond(&params.get("id").unwrap_or_default().to_string(), StatusCode::OK)
//! });
//!
//! let m = router.match_route(&Method::GET, "/users/42").unwrap();
//! assert_eq!(m.name(), "getUser");
//! assert_eq!(m.param("id"), Some("42"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderValue, ALLOW};
use http::{Method, Request, StatusCode};
use usersvc_core::{respond_error, respond_message, ApiError, HttpResponse};

use crate::dispatch::{DispatchFuture, Dispatcher};

/// Path parameters extracted from a matched template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    /// Returns a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the template had no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A matched route with extracted path parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    name: String,
    params: PathParams,
}

impl RouteMatch {
    /// Returns the route name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the extracted path parameters.
    #[must_use]
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Returns a specific path parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }
}

type RouteHandler = Arc<dyn Fn(Request<Bytes>, PathParams) -> DispatchFuture + Send + Sync>;

/// A segment of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    /// A literal segment (e.g., "users")
    Literal(String),

    /// A parameter segment (e.g., "{id}")
    Param(String),
}

#[derive(Clone)]
struct Route {
    method: Method,
    segments: Vec<PathSegment>,
    name: String,
    handler: RouteHandler,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("segments", &self.segments)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Route {
    fn parse_segments(pattern: &str) -> Vec<PathSegment> {
        pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => PathSegment::Param(name.to_string()),
                None => PathSegment::Literal(s.to_string()),
            })
            .collect()
    }

    /// Returns extracted parameters if the route matches `path`.
    fn match_path(&self, path: &str) -> Option<PathParams> {
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if path_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (pattern, actual) in self.segments.iter().zip(path_segments) {
            match pattern {
                PathSegment::Literal(expected) if expected != actual => return None,
                PathSegment::Literal(_) => {}
                PathSegment::Param(name) => {
                    params.insert(name.clone(), actual.to_string());
                }
            }
        }
        Some(PathParams(params))
    }
}

/// HTTP request router.
///
/// Routes are checked in registration order; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Creates a new empty router.
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers a handler.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP method for this route
    /// * `pattern` - Path template (e.g., "/users/{id}")
    /// * `name` - Route name used in logs
    /// * `handler` - Called with the request and its path parameters
    pub fn route<F, Fut>(
        &mut self,
        method: Method,
        pattern: impl AsRef<str>,
        name: impl Into<String>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(Request<Bytes>, PathParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        let handler: RouteHandler =
            Arc::new(move |req: Request<Bytes>, params: PathParams| -> DispatchFuture {
                Box::pin(handler(req, params))
            });
        self.routes.push(Route {
            method,
            segments: Route::parse_segments(pattern.as_ref()),
            name: name.into(),
            handler,
        });
        self
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Matches a request to a route.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.find(method, path).map(|(route, params)| RouteMatch {
            name: route.name.clone(),
            params,
        })
    }

    fn find(&self, method: &Method, path: &str) -> Option<(&Route, PathParams)> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| route.match_path(path).map(|params| (route, params)))
    }

    /// Methods registered for `path`, in registration order.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = Vec::new();
        for route in &self.routes {
            if !methods.contains(&route.method) && route.match_path(path).is_some() {
                methods.push(route.method.clone());
            }
        }
        methods
    }
}

impl Dispatcher for Router {
    fn dispatch(&self, request: Request<Bytes>) -> DispatchFuture {
        let path = request.uri().path().to_string();
        match self.find(request.method(), &path) {
            Some((route, params)) => {
                tracing::trace!(route = %route.name, path = %path, "Dispatching request");
                (route.handler)(request, params)
            }
            None => {
                let allowed = self.allowed_methods(&path);
                if allowed.is_empty() {
                    Box::pin(async { respond_error(&ApiError::not_found("route not found")) })
                } else {
                    let response = method_not_allowed(&allowed);
                    Box::pin(async { response })
                }
            }
        }
    }
}

fn method_not_allowed(allowed: &[Method]) -> HttpResponse {
    let mut response = respond_message(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
    if let Ok(value) = HeaderValue::from_str(&allow) {
        response.headers_mut().insert(ALLOW, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use usersvc_core::respond;

    fn echo_router() -> Router {
        let mut router = Router::new();
        router
            .route(Method::GET, "/users", "listUsers", |_req, _params| async {
                respond(&"list", StatusCode::OK)
            })
            .route(Method::GET, "/users/{id}", "getUser", |_req, params: PathParams| async move {
                respond(&params.get("id").map(str::to_string), StatusCode::OK)
            })
            .route(Method::POST, "/users", "createUser", |req: Request<Bytes>, _params| async move {
                respond(&String::from_utf8_lossy(req.body()).into_owned(), StatusCode::CREATED)
            });
        router
    }

    async fn body_json(response: HttpResponse) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_router_new() {
        assert_eq!(Router::new().route_count(), 0);
        assert_eq!(echo_router().route_count(), 3);
    }

    #[test]
    fn test_match_literal_and_param() {
        let router = echo_router();

        let m = router.match_route(&Method::GET, "/users").unwrap();
        assert_eq!(m.name(), "listUsers");
        assert!(m.params().is_empty());

        let m = router.match_route(&Method::GET, "/users/abc").unwrap();
        assert_eq!(m.name(), "getUser");
        assert_eq!(m.param("id"), Some("abc"));
    }

    #[test]
    fn test_match_trailing_slash() {
        let router = echo_router();
        assert!(router.match_route(&Method::GET, "/users/").is_some());
    }

    #[test]
    fn test_no_match() {
        let router = echo_router();
        assert!(router.match_route(&Method::GET, "/products").is_none());
        assert!(router.match_route(&Method::GET, "/users/1/posts").is_none());
        assert!(router.match_route(&Method::DELETE, "/users/1").is_none());
    }

    #[tokio::test]
    async fn test_dispatch_passes_params_and_body() {
        let router = echo_router();

        let request = Request::get("/users/7").body(Bytes::new()).unwrap();
        let response = router.dispatch(request).await;
        assert_eq!(body_json(response).await, serde_json::json!("7"));

        let request = Request::post("/users").body(Bytes::from("hello")).unwrap();
        let response = router.dispatch(request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await, serde_json::json!("hello"));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_route() {
        let router = echo_router();
        let request = Request::get("/nope").body(Bytes::new()).unwrap();
        let response = router.dispatch(request).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"status": 404, "message": "route not found"})
        );
    }

    #[tokio::test]
    async fn test_dispatch_method_not_allowed() {
        let router = echo_router();
        let request = Request::delete("/users").body(Bytes::new()).unwrap();
        let response = router.dispatch(request).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, POST");

        let request = Request::put("/users/1").body(Bytes::new()).unwrap();
        let response = router.dispatch(request).await;
        assert_eq!(response.headers()[ALLOW], "GET");
    }

    #[test]
    fn test_allowed_methods() {
        let router = echo_router();
        assert_eq!(router.allowed_methods("/users"), vec![Method::GET, Method::POST]);
        assert_eq!(router.allowed_methods("/users/9"), vec![Method::GET]);
        assert!(router.allowed_methods("/nope").is_empty());
    }
}
