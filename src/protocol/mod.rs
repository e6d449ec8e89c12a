//! HTTP Protocol Implementation
//!
//! The request/response boundary of EmberKV is a minimal HTTP/1.1 subset:
//! one request per connection, plain-text responses, `Connection: close`.
//!
//! ## Modules
//!
//! - `types`: `HttpMethod`, `HttpRequest`, `HttpResponse` and serialization
//! - `parser`: Incremental parser for incoming request bytes
//!
//! ## Example
//!
//! ```
//! use emberkv::protocol::{HttpParser, HttpResponse};
//!
//! // Parsing incoming data
//! let data = b"GET /kv/name HTTP/1.1\r\nHost: localhost\r\n\r\n";
//! let (request, consumed) = HttpParser::new().parse(data).unwrap().unwrap();
//! assert_eq!(request.path(), "/kv/name");
//! assert_eq!(consumed, data.len());
//!
//! // Creating responses
//! let bytes = HttpResponse::ok().body("ember").serialize();
//! assert!(bytes.ends_with(b"\r\n\r\nember"));
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{HttpParser, ParseError, ParseResult, MAX_REQUEST_SIZE};
pub use types::{HttpMethod, HttpRequest, HttpResponse};
