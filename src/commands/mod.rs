//! Command Handling Module
//!
//! This module sits between the HTTP layer and the store. Parsed requests are
//! matched to a route by method and path prefix, and the route's handler
//! turns them into store operations.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │   HttpParser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Router      │  method + path prefix, first match wins
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   KvHandler     │  /kv/<key>, /kv
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Store       │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;
pub mod router;

pub use handler::{KvHandler, TTL_HEADER};
pub use router::{HandlerFn, RouteParams, Router};
