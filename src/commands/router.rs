//! Prefix Router
//!
//! Routes are `(method, prefix, handler)` triples tried in registration
//! order. The first route whose method matches and whose prefix starts the
//! request path wins, and its handler receives whatever follows the prefix.
//! Because matching is first-wins, a more specific prefix (`/kv/`) must be
//! registered before a shorter one it extends (`/kv`).

use crate::protocol::{HttpMethod, HttpRequest, HttpResponse};
use tracing::{debug, warn};

/// Values extracted from the path by the matching route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    /// The part of the path after the route's prefix
    pub path_suffix: String,
}

/// A route handler.
pub type HandlerFn = Box<dyn Fn(&HttpRequest, &RouteParams) -> HttpResponse + Send + Sync>;

struct Route {
    method: HttpMethod,
    prefix: String,
    handler: HandlerFn,
}

/// Dispatches requests to the first matching route.
///
/// # Example
///
/// ```
/// use emberkv::commands::Router;
/// use emberkv::protocol::{HttpMethod, HttpRequest, HttpResponse};
///
/// let mut router = Router::new();
/// router.add_route(HttpMethod::Get, "/echo/", |_, params| {
///     HttpResponse::ok().body(params.path_suffix.clone())
/// });
///
/// let response = router.route(&HttpRequest::new(HttpMethod::Get, "/echo/hi"));
/// assert_eq!(&response.body_bytes()[..], b"hi");
///
/// let response = router.route(&HttpRequest::new(HttpMethod::Put, "/echo/hi"));
/// assert_eq!(response.status(), 404);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|r| format!("{} {}", r.method, r.prefix)))
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route. Earlier registrations take precedence.
    pub fn add_route<F>(&mut self, method: HttpMethod, prefix: impl Into<String>, handler: F)
    where
        F: Fn(&HttpRequest, &RouteParams) -> HttpResponse + Send + Sync + 'static,
    {
        let prefix = prefix.into();
        debug!(method = %method, prefix = %prefix, "Route registered");
        self.routes.push(Route {
            method,
            prefix,
            handler: Box::new(handler),
        });
    }

    /// Returns the number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatches `request` to the first matching route, or answers 404.
    pub fn route(&self, request: &HttpRequest) -> HttpResponse {
        let path = request.path();

        for route in &self.routes {
            if route.method != request.method() {
                continue;
            }
            if let Some(suffix) = path.strip_prefix(route.prefix.as_str()) {
                let params = RouteParams {
                    path_suffix: suffix.to_string(),
                };
                return (route.handler)(request, &params);
            }
        }

        warn!(method = %request.method(), path = path, "No route matched");
        HttpResponse::not_found().body(format!("Not Found: {}", path))
    }
}
