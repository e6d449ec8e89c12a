//! KV Request Handler
//!
//! Translates HTTP requests into [`Store`] calls.
//!
//! ## Routes
//!
//! | Method   | Path        | Store call           | Success            |
//! |----------|-------------|----------------------|--------------------|
//! | `GET`    | `/kv/<key>` | `get(key)`           | 200, the value     |
//! | `PUT`    | `/kv/<key>` | `set(key, body, ttl)`| 201, `OK`          |
//! | `DELETE` | `/kv/<key>` | `remove(key)`        | 200, `Deleted: k`  |
//! | `GET`    | `/kv`       | `keys()`             | 200, one key/line  |
//!
//! `PUT` reads the TTL in seconds from the optional `X-TTL` header. A value
//! that is not an integer is logged and ignored, so the key is stored
//! without expiry.

use crate::commands::router::{RouteParams, Router};
use crate::protocol::{HttpMethod, HttpRequest, HttpResponse};
use crate::storage::Store;
use std::sync::Arc;
use tracing::{info, warn};

/// Header carrying the TTL for `PUT`, in seconds
pub const TTL_HEADER: &str = "X-TTL";

/// Handles key-value requests against a shared store.
#[derive(Debug, Clone)]
pub struct KvHandler {
    /// The store
    store: Arc<Store>,
}

impl KvHandler {
    /// Creates a new handler for the given store.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Registers the KV routes on `router`.
    pub fn register_routes(&self, router: &mut Router) {
        let handler = self.clone();
        router.add_route(HttpMethod::Get, "/kv/", move |req, params| {
            handler.get_key(req, params)
        });

        let handler = self.clone();
        router.add_route(HttpMethod::Put, "/kv/", move |req, params| {
            handler.put_key(req, params)
        });

        let handler = self.clone();
        router.add_route(HttpMethod::Delete, "/kv/", move |req, params| {
            handler.delete_key(req, params)
        });

        let handler = self.clone();
        router.add_route(HttpMethod::Get, "/kv", move |req, params| {
            handler.list_keys(req, params)
        });

        info!("KV routes registered");
    }

    /// GET /kv/<key>
    pub fn get_key(&self, _request: &HttpRequest, params: &RouteParams) -> HttpResponse {
        let key = params.path_suffix.as_str();
        if key.is_empty() {
            return empty_key();
        }

        match self.store.get(key) {
            Some(value) => HttpResponse::ok().body(value),
            None => not_found(key),
        }
    }

    /// PUT /kv/<key>
    pub fn put_key(&self, request: &HttpRequest, params: &RouteParams) -> HttpResponse {
        let key = params.path_suffix.as_str();
        if key.is_empty() {
            return empty_key();
        }

        let ttl_seconds = match request.header(TTL_HEADER) {
            Some(raw) => parse_ttl(raw).unwrap_or_else(|| {
                warn!(key = key, value = raw, "Invalid X-TTL header value, storing without expiry");
                0
            }),
            None => 0,
        };

        self.store.set(key, request.body().clone(), ttl_seconds);
        HttpResponse::created().body("OK")
    }

    /// DELETE /kv/<key>
    pub fn delete_key(&self, _request: &HttpRequest, params: &RouteParams) -> HttpResponse {
        let key = params.path_suffix.as_str();
        if key.is_empty() {
            return empty_key();
        }

        if self.store.remove(key) {
            HttpResponse::ok().body(format!("Deleted: {}", key))
        } else {
            not_found(key)
        }
    }

    /// GET /kv
    pub fn list_keys(&self, _request: &HttpRequest, _params: &RouteParams) -> HttpResponse {
        HttpResponse::ok().body(self.store.keys().join("\n"))
    }
}

/// Reads the leading integer of an `X-TTL` value, so `"30"`, `" 30"` and
/// `"30s"` all mean 30 seconds. Returns `None` when there is no leading
/// integer or it does not fit in an `i64`.
fn parse_ttl(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let sign_len = usize::from(raw.starts_with(['+', '-']));
    let digits = raw[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    raw[..sign_len + digits].parse().ok()
}

fn empty_key() -> HttpResponse {
    HttpResponse::bad_request().body("Key cannot be empty")
}

fn not_found(key: &str) -> HttpResponse {
    HttpResponse::not_found().body(format!("Key not found: {}", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::thread;
    use std::time::Duration;

    fn create_router() -> (Router, Arc<Store>) {
        let store = Arc::new(Store::new());
        let mut router = Router::new();
        KvHandler::new(Arc::clone(&store)).register_routes(&mut router);
        (router, store)
    }

    fn body(response: &HttpResponse) -> String {
        String::from_utf8(response.body_bytes().to_vec()).unwrap()
    }

    fn put(router: &Router, key: &str, value: &'static str) -> HttpResponse {
        router.route(&HttpRequest::new(HttpMethod::Put, format!("/kv/{}", key)).with_body(value))
    }

    #[test]
    fn test_put_then_get() {
        let (router, store) = create_router();

        let response = put(&router, "name", "ember");
        assert_eq!(response.status(), 201);
        assert_eq!(body(&response), "OK");
        assert_eq!(store.get("name"), Some(Bytes::from("ember")));

        let response = router.route(&HttpRequest::new(HttpMethod::Get, "/kv/name"));
        assert_eq!(response.status(), 200);
        assert_eq!(body(&response), "ember");
    }

    #[test]
    fn test_get_missing() {
        let (router, _) = create_router();
        let response = router.route(&HttpRequest::new(HttpMethod::Get, "/kv/missing"));
        assert_eq!(response.status(), 404);
        assert_eq!(body(&response), "Key not found: missing");
    }

    #[test]
    fn test_empty_key_rejected() {
        let (router, _) = create_router();
        for method in [HttpMethod::Get, HttpMethod::Put, HttpMethod::Delete] {
            let response = router.route(&HttpRequest::new(method, "/kv/"));
            assert_eq!(response.status(), 400, "{}", method);
            assert_eq!(body(&response), "Key cannot be empty");
        }
    }

    #[test]
    fn test_put_with_ttl() {
        let (router, store) = create_router();

        let request = HttpRequest::new(HttpMethod::Put, "/kv/session")
            .with_header("X-TTL", "1")
            .with_body("token");
        assert_eq!(router.route(&request).status(), 201);
        assert_eq!(store.get("session"), Some(Bytes::from("token")));

        thread::sleep(Duration::from_millis(1500));

        let response = router.route(&HttpRequest::new(HttpMethod::Get, "/kv/session"));
        assert_eq!(response.status(), 404);
    }

    #[test]
    fn test_put_with_invalid_ttl_never_expires() {
        let (router, store) = create_router();

        let request = HttpRequest::new(HttpMethod::Put, "/kv/key")
            .with_header("x-ttl", "soon")
            .with_body("value");
        assert_eq!(router.route(&request).status(), 201);
        assert_eq!(store.get("key"), Some(Bytes::from("value")));
        assert_eq!(store.keys(), vec!["key".to_string()]);
    }

    #[test]
    fn test_put_with_suffixed_ttl_uses_leading_number() {
        let (router, store) = create_router();

        let request = HttpRequest::new(HttpMethod::Put, "/kv/session")
            .with_header("X-TTL", "1s")
            .with_body("token");
        assert_eq!(router.route(&request).status(), 201);
        assert_eq!(store.get("session"), Some(Bytes::from("token")));

        thread::sleep(Duration::from_millis(1500));

        assert!(store.get("session").is_none());
    }

    #[test]
    fn test_parse_ttl() {
        assert_eq!(parse_ttl("60"), Some(60));
        assert_eq!(parse_ttl("  60"), Some(60));
        assert_eq!(parse_ttl("60s"), Some(60));
        assert_eq!(parse_ttl("+5"), Some(5));
        assert_eq!(parse_ttl("-5"), Some(-5));
        assert_eq!(parse_ttl("soon"), None);
        assert_eq!(parse_ttl("-"), None);
        assert_eq!(parse_ttl(""), None);
        assert_eq!(parse_ttl("99999999999999999999"), None);
    }

    #[test]
    fn test_delete() {
        let (router, _) = create_router();
        put(&router, "old_key", "value");

        let response = router.route(&HttpRequest::new(HttpMethod::Delete, "/kv/old_key"));
        assert_eq!(response.status(), 200);
        assert_eq!(body(&response), "Deleted: old_key");

        let response = router.route(&HttpRequest::new(HttpMethod::Delete, "/kv/old_key"));
        assert_eq!(response.status(), 404);
        assert_eq!(body(&response), "Key not found: old_key");
    }

    #[test]
    fn test_list_keys() {
        let (router, _) = create_router();

        let response = router.route(&HttpRequest::new(HttpMethod::Get, "/kv"));
        assert_eq!(response.status(), 200);
        assert_eq!(body(&response), "");

        put(&router, "alpha", "1");
        put(&router, "beta", "2");

        let response = router.route(&HttpRequest::new(HttpMethod::Get, "/kv"));
        let listed = body(&response);
        let mut keys: Vec<&str> = listed.split('\n').collect();
        keys.sort();
        assert_eq!(keys, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_unknown_method() {
        let (router, _) = create_router();
        let response = router.route(&HttpRequest::new(HttpMethod::Unknown, "/kv/a"));
        assert_eq!(response.status(), 404);
    }
}
