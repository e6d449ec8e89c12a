//! HTTP Message Types
//!
//! The request and response types exchanged between the connection handler
//! and the router. Only the small slice of HTTP/1.1 that EmberKV speaks is
//! modelled: three methods, plain headers, a byte body, and one response per
//! connection.
//!
//! ## Response Format
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Length: 5\r\n
//! Connection: close\r\n
//! Content-Type: text/plain\r\n
//! \r\n
//! hello
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;

/// The CRLF terminator used in HTTP/1.1
pub const CRLF: &[u8] = b"\r\n";

/// Request methods understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Delete,
    /// Anything else. Parses fine but no route matches it.
    Unknown,
}

impl HttpMethod {
    /// Maps a request-line token to a method. Matching is case-sensitive.
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => HttpMethod::Get,
            "PUT" => HttpMethod::Put,
            "DELETE" => HttpMethod::Delete,
            _ => HttpMethod::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    method: HttpMethod,
    path: String,
    /// Header names are stored lower-cased
    headers: HashMap<String, String>,
    body: Bytes,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Adds a header. The name is lower-cased; a repeated name overwrites.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Looks up a header, ignoring the case of `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// An HTTP response under construction.
///
/// # Example
///
/// ```
/// use emberkv::protocol::HttpResponse;
///
/// let response = HttpResponse::not_found().body("Key not found: a");
/// assert_eq!(response.status(), 404);
/// assert!(response.serialize().starts_with(b"HTTP/1.1 404 Not Found\r\n"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    reason: &'static str,
    headers: BTreeMap<String, String>,
    body: Bytes,
}

impl HttpResponse {
    fn with_status(status: u16, reason: &'static str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "text/plain".to_string());
        Self {
            status,
            reason,
            headers,
            body: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::with_status(200, "OK")
    }

    pub fn created() -> Self {
        Self::with_status(201, "Created")
    }

    pub fn bad_request() -> Self {
        Self::with_status(400, "Bad Request")
    }

    pub fn not_found() -> Self {
        Self::with_status(404, "Not Found")
    }

    pub fn method_not_allowed() -> Self {
        Self::with_status(405, "Method Not Allowed")
    }

    pub fn internal_error() -> Self {
        Self::with_status(500, "Internal Server Error")
    }

    /// Replaces the body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a header, replacing any previous value under the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &'static str {
        self.reason
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    /// Renders the response as it goes on the wire.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(128 + self.body.len());

        buf.put_slice(format!("HTTP/1.1 {} {}", self.status, self.reason).as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(format!("Content-Length: {}", self.body.len()).as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(b"Connection: close");
        buf.put_slice(CRLF);
        for (name, value) in &self.headers {
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(CRLF);
        }
        buf.put_slice(CRLF);
        buf.put_slice(&self.body);

        buf.freeze()
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.reason)
    }
}
