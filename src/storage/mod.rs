//! Storage Module
//!
//! This module provides the core storage functionality for EmberKV: a
//! reader/writer-locked map, a TTL-aware store built on it, and the
//! background expiry manager that sweeps the store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │      get (lazy deletion) · set · remove · keys · sweep      │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │              ConcurrentMap<String, Entry>             │  │
//! │  │           RwLock<HashMap<String, Entry>>              │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ cleanup_expired()
//!              ┌─────────────┴─────────────┐
//!              │      ExpiryManager        │
//!              │  (dedicated OS thread)    │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use emberkv::storage::{ExpiryConfig, ExpiryManager, Store};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let store = Arc::new(Store::new());
//!
//! store.set("name", "ember", 0);
//! assert_eq!(store.get("name"), Some(Bytes::from("ember")));
//!
//! // Expires in an hour
//! store.set("session", "token123", 3600);
//!
//! let mut expiry = ExpiryManager::new(Arc::clone(&store), ExpiryConfig::default());
//! expiry.start().unwrap();
//! expiry.stop();
//! ```

pub mod engine;
pub mod expiry;
pub mod map;

// Re-export commonly used types
pub use engine::{Entry, Store};
pub use expiry::{ExpiryConfig, ExpiryManager};
pub use map::ConcurrentMap;
