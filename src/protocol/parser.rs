//! Incremental HTTP Request Parser
//!
//! The parser reads from a buffer and returns either:
//! - `Ok(Some((request, consumed)))` - Successfully parsed a request, `consumed` bytes were used
//! - `Ok(None)` - Need more data, the request is incomplete
//! - `Err(ParseError)` - The bytes cannot be a valid request
//!
//! This lets the connection handler append whatever the socket delivered and
//! retry, without caring where TCP split the request.
//!
//! ## Body Length
//!
//! With a `Content-Length` header the body is exactly that many bytes, and the
//! request stays incomplete until they have all arrived. Without one, the body
//! is everything buffered after the blank line.

use crate::protocol::types::{HttpMethod, HttpRequest};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur during request parsing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Request line does not have a method, a path and a version
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    /// Request line or headers are not valid UTF-8
    #[error("invalid UTF-8 in request head")]
    InvalidUtf8,

    /// Content-Length is not a non-negative integer
    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    /// The request exceeds the maximum allowed size
    #[error("request too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size of a whole request, head plus body (64 KB)
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

/// A stateless HTTP/1.1 request parser.
///
/// # Example
///
/// ```
/// use emberkv::protocol::{HttpMethod, HttpParser};
///
/// let parser = HttpParser::new();
///
/// let raw = b"PUT /kv/greeting HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
/// let (request, consumed) = parser.parse(raw).unwrap().unwrap();
///
/// assert_eq!(consumed, raw.len());
/// assert_eq!(request.method(), HttpMethod::Put);
/// assert_eq!(request.path(), "/kv/greeting");
/// assert_eq!(&request.body()[..], b"hello");
///
/// // A cut-off body is reported as incomplete, not as an error
/// assert!(parser.parse(&raw[..raw.len() - 1]).unwrap().is_none());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HttpParser {
    max_size: usize,
}

impl Default for HttpParser {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpParser {
    /// Creates a parser with the default size limit.
    pub fn new() -> Self {
        Self::with_max_size(MAX_REQUEST_SIZE)
    }

    /// Creates a parser that rejects requests larger than `max_size` bytes.
    pub fn with_max_size(max_size: usize) -> Self {
        Self { max_size }
    }

    /// Attempts to parse one request from the start of `buf`.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(HttpRequest, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        let Some((head_len, body_start)) = find_head_end(buf) else {
            self.check_size(buf.len())?;
            return Ok(None);
        };

        let head = std::str::from_utf8(&buf[..head_len]).map_err(|_| ParseError::InvalidUtf8)?;
        let mut lines = head.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));

        let request_line = lines.next().unwrap_or_default();
        let mut request = parse_request_line(request_line)?;

        for line in lines {
            // Lines without a colon carry nothing usable
            if let Some((name, value)) = line.split_once(':') {
                request = request.with_header(name, value.trim_start_matches(' '));
            }
        }

        let available = buf.len() - body_start;
        let body_len = match request.header("content-length") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ParseError::InvalidContentLength(raw.to_string()))?,
            None => available,
        };

        let total = body_start.saturating_add(body_len);
        self.check_size(total)?;

        if available < body_len {
            return Ok(None);
        }

        let body = Bytes::copy_from_slice(&buf[body_start..total]);
        Ok(Some((request.with_body(body), total)))
    }

    fn check_size(&self, size: usize) -> ParseResult<()> {
        if size > self.max_size {
            return Err(ParseError::MessageTooLarge {
                size,
                max: self.max_size,
            });
        }
        Ok(())
    }
}

/// Finds the blank line ending the head. Returns the head length (without
/// the blank line) and the offset where the body starts.
fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if byte != b'\n' {
            continue;
        }
        let line = &buf[line_start..i];
        if line.is_empty() || line == b"\r" {
            return Some((line_start.saturating_sub(1), i + 1));
        }
        line_start = i + 1;
    }
    None
}

fn parse_request_line(line: &str) -> ParseResult<HttpRequest> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(path), Some(_version)) => {
            Ok(HttpRequest::new(HttpMethod::from_token(method), path))
        }
        _ => Err(ParseError::MalformedRequestLine(line.to_string())),
    }
}
