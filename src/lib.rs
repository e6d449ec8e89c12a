//! # EmberKV - A Multi-Threaded In-Memory Key-Value Store
//!
//! EmberKV keeps string keys and byte values in memory, lets each key carry a
//! time-to-live, and serves them over a tiny HTTP interface from a fixed pool
//! of worker threads.
//!
//! ## Features
//!
//! - **Reader/Writer Locking**: Concurrent reads never serialize on each other
//! - **TTL Support**: Per-key expiry on the monotonic clock
//! - **Lazy + Active Expiry**: Expired keys vanish on read and are swept in the background
//! - **Worker Pool**: Fixed number of OS threads, graceful drain on shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              EmberKV                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ WorkerPool  │───>│ Connection  │                  │
//! │  │ (accept)    │    │ (N threads) │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │ HttpParser + Router     │
//! │                                               ▼                         │
//! │                     ┌──────────────────────────────────────────────┐    │
//! │                     │                  Store                       │    │
//! │                     │   ConcurrentMap<String, Entry> (RwLock)      │    │
//! │                     └──────────────────────────────────────────────┘    │
//! │                                               ▲                         │
//! │                                               │ cleanup_expired()       │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           ExpiryManager                         │ │
//! │                     │      (dedicated background thread)              │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use emberkv::{Server, ServerConfig};
//!
//! let server = Server::new(ServerConfig::default());
//! let shutdown = server.shutdown_handle();
//!
//! // Call shutdown.shutdown() from another thread to stop
//! server.run().unwrap();
//! ```
//!
//! ## HTTP Interface
//!
//! - `PUT /kv/<key>` with the value as body, optional `X-TTL: <seconds>`
//! - `GET /kv/<key>`
//! - `DELETE /kv/<key>`
//! - `GET /kv` lists live keys, one per line
//!
//! ## Module Overview
//!
//! - [`storage`]: Concurrent map, TTL store and expiry manager
//! - [`pool`]: Fixed-size worker pool
//! - [`protocol`]: HTTP request parser and response types
//! - [`commands`]: Router and KV request handler
//! - [`connection`]: Per-connection request handling
//! - [`server`]: Orchestrator wiring everything together

pub mod commands;
pub mod connection;
pub mod pool;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{KvHandler, Router};
pub use connection::{handle_connection, ConnectionStats};
pub use pool::WorkerPool;
pub use protocol::{HttpParser, HttpRequest, HttpResponse, ParseError};
pub use server::{Server, ServerConfig, ServerError, ShutdownHandle};
pub use storage::{ConcurrentMap, ExpiryConfig, ExpiryManager, Store};

/// The default port EmberKV listens on
pub const DEFAULT_PORT: u16 = 8080;

/// The default host EmberKV binds to (all interfaces)
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// The default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

/// Version of EmberKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
