//! Connection Handler Module
//!
//! This module handles individual client connections. Each accepted socket
//! becomes one task on the worker pool; the task reads one request, routes
//! it, writes one response and closes the socket.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Server accepts the socket and submits a task
//!        │
//!        ▼
//! 2. A worker picks the task up
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │  Read bytes into buffer      │◄─┐
//!    └──────────────┬───────────────┘  │ incomplete
//!                   ▼                  │
//!    ┌──────────────────────────────┐  │
//!    │  Try to parse a request      │──┘
//!    └──────────────┬───────────────┘
//!                   ▼
//!    ┌──────────────────────────────┐
//!    │  Route, send response        │
//!    └──────────────┬───────────────┘
//!                   ▼
//! 4. Socket closed (Connection: close)
//! ```
//!
//! ## Buffer Management
//!
//! TCP is a stream, so a request may arrive in several reads. Incoming bytes
//! accumulate in a `BytesMut` until the parser reports a complete request.

use crate::commands::Router;
use crate::protocol::{HttpParser, HttpRequest, HttpResponse, ParseError};
use bytes::BytesMut;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// How long a client may stay silent before the connection is dropped
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total requests processed
    pub requests_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
    /// Failed `accept()` calls, not counting "no connection waiting"
    pub accept_errors: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_processed(&self) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn accept_failed(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// The TCP stream for this connection
    stream: TcpStream,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Routes requests (shared across connections)
    router: Arc<Router>,

    parser: HttpParser,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        router: Arc<Router>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream,
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            router,
            parser: HttpParser::new(),
            stats,
        }
    }

    /// Serves the connection: one request, one response.
    pub fn run(mut self) -> Result<(), ConnectionError> {
        debug!(client = %self.addr, "Client connected");

        let result = self.serve();

        match &result {
            Ok(()) => trace!(client = %self.addr, "Connection closed"),
            Err(ConnectionError::ClientDisconnected) => {
                debug!(client = %self.addr, "Client disconnected")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    fn serve(&mut self) -> Result<(), ConnectionError> {
        self.stream.set_read_timeout(Some(READ_TIMEOUT))?;

        let request = match self.read_request() {
            Ok(request) => request,
            Err(ConnectionError::Parse(e)) => {
                let response = HttpResponse::bad_request().body("Invalid HTTP request");
                self.send_response(&response)?;
                return Err(ConnectionError::Parse(e));
            }
            Err(e) => return Err(e),
        };

        trace!(
            client = %self.addr,
            method = %request.method(),
            path = request.path(),
            "Request"
        );

        let response = self.router.route(&request);
        self.stats.request_processed();
        self.send_response(&response)
    }

    /// Reads until the buffer holds one complete request.
    fn read_request(&mut self) -> Result<HttpRequest, ConnectionError> {
        let mut chunk = [0u8; INITIAL_BUFFER_SIZE];

        loop {
            if let Some((request, _consumed)) = self.parser.parse(&self.buffer)? {
                return Ok(request);
            }

            let n = self.stream.read(&mut chunk)?;
            if n == 0 {
                return Err(if self.buffer.is_empty() {
                    ConnectionError::ClientDisconnected
                } else {
                    ConnectionError::UnexpectedEof
                });
            }

            self.stats.bytes_read(n);
            self.buffer.extend_from_slice(&chunk[..n]);
            trace!(client = %self.addr, bytes = n, buffered = self.buffer.len(), "Read data");
        }
    }

    /// Sends a response to the client.
    fn send_response(&mut self, response: &HttpResponse) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes)?;
        self.stream.flush()?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            status = response.status(),
            bytes = bytes.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue or read timeout)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Client closed the connection without sending anything
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Client closed the connection mid-request
    #[error("Unexpected end of stream")]
    UnexpectedEof,
}

/// Handles a client connection to completion, logging instead of returning
/// errors. This is the body of each pool task.
pub fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    router: Arc<Router>,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, router, stats);
    // Already logged by run()
    let _ = handler.run();
}
