//! Server Orchestrator
//!
//! Wires the pieces together and owns their lifetimes:
//!
//! ```text
//!            ┌──────────────┐  submit(conn)  ┌──────────────┐
//!  accept ──>│ accept loop  │───────────────>│  WorkerPool  │──> Router ──> Store
//!            └──────────────┘                └──────────────┘                 ▲
//!                                                                             │
//!                                              ExpiryManager ─────────────────┘
//! ```
//!
//! ## Shutdown Order
//!
//! 1. The accept loop sees the shutdown flag and stops accepting.
//! 2. The worker pool drains every queued connection, then joins.
//! 3. The expiry manager is stopped.
//!
//! The store is shared through `Arc`, so it outlives every component that
//! holds a handle to it.

use crate::commands::{KvHandler, Router};
use crate::connection::{handle_connection, ConnectionStats};
use crate::pool::WorkerPool;
use crate::storage::{ExpiryConfig, ExpiryManager, Store};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

/// How long the accept loop sleeps when no connection is waiting, or after
/// a failed accept
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Number of worker threads
    pub threads: usize,
    /// Background expiry settings
    pub expiry: ExpiryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            threads: crate::DEFAULT_THREADS,
            expiry: ExpiryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Errors that stop the server from serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure while setting up
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Requests a running server to stop. Cheap to clone; calling `shutdown`
/// more than once has no further effect.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            info!("Shutdown requested");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The EmberKV server.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    store: Arc<Store>,
    router: Arc<Router>,
    stats: Arc<ConnectionStats>,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Builds the store and routes. Nothing runs until `run`.
    pub fn new(config: ServerConfig) -> Self {
        let store = Arc::new(Store::new());

        let mut router = Router::new();
        KvHandler::new(Arc::clone(&store)).register_routes(&mut router);

        Self {
            config,
            store,
            router: Arc::new(router),
            stats: Arc::new(ConnectionStats::new()),
            shutdown: ShutdownHandle::default(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns a handle to the shared store.
    pub fn store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Returns a handle that stops `run` from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Binds the configured address and serves until shut down.
    pub fn run(&self) -> Result<(), ServerError> {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr).map_err(|source| {
            error!(addr = %addr, error = %source, "Failed to bind");
            ServerError::Bind {
                addr: addr.clone(),
                source,
            }
        })?;
        self.run_on(listener)
    }

    /// Serves connections from an already bound listener until shut down.
    pub fn run_on(&self, listener: TcpListener) -> Result<(), ServerError> {
        listener.set_nonblocking(true)?;
        info!(addr = %listener.local_addr()?, "Listening");

        let mut expiry = ExpiryManager::new(Arc::clone(&self.store), self.config.expiry.clone());
        expiry.start()?;

        let pool = WorkerPool::new(self.config.threads)?;

        self.accept_loop(&listener, &pool);
        drop(listener);

        pool.shutdown();
        expiry.stop();

        info!(
            connections = self.stats.connections_accepted.load(Ordering::Relaxed),
            requests = self.stats.requests_processed.load(Ordering::Relaxed),
            accept_errors = self.stats.accept_errors.load(Ordering::Relaxed),
            "Server stopped"
        );
        Ok(())
    }

    fn accept_loop(&self, listener: &TcpListener, pool: &WorkerPool) {
        while !self.shutdown.is_shutdown() {
            match listener.accept() {
                Ok((stream, addr)) => self.dispatch(stream, addr, pool),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    self.stats.accept_failed();
                    error!(error = %e, "Failed to accept connection");
                    // Persistent failures (e.g. EMFILE) would otherwise spin
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        info!("Accept loop stopped");
    }

    fn dispatch(&self, stream: std::net::TcpStream, addr: SocketAddr, pool: &WorkerPool) {
        // Accepted sockets may inherit the listener's non-blocking mode
        if let Err(e) = stream.set_nonblocking(false) {
            error!(client = %addr, error = %e, "Failed to configure connection");
            return;
        }

        let router = Arc::clone(&self.router);
        let stats = Arc::clone(&self.stats);
        pool.submit(move || handle_connection(stream, addr, router, stats));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Instant;

    fn start_server(
        config: ServerConfig,
    ) -> (SocketAddr, Arc<Store>, ShutdownHandle, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::new(config);
        let store = server.store();
        let handle = server.shutdown_handle();

        let join = thread::spawn(move || server.run_on(listener).unwrap());
        (addr, store, handle, join)
    }

    fn request(addr: SocketAddr, raw: &str) -> String {
        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(raw.as_bytes()).unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.threads, 4);
        assert_eq!(config.expiry.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_shutdown_handle_is_idempotent() {
        let handle = ShutdownHandle::default();
        assert!(!handle.is_shutdown());
        handle.shutdown();
        handle.shutdown();
        assert!(handle.is_shutdown());
        assert!(handle.clone().is_shutdown());
    }

    #[test]
    fn test_serves_kv_requests() {
        let (addr, store, handle, join) = start_server(ServerConfig::default());

        let response = request(addr, "PUT /kv/greeting HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");
        assert!(response.starts_with("HTTP/1.1 201"));

        let response = request(addr, "GET /kv/greeting HTTP/1.1\r\n\r\n");
        assert!(response.ends_with("\r\n\r\nhello"));

        let response = request(addr, "GET /kv HTTP/1.1\r\n\r\n");
        assert!(response.ends_with("\r\n\r\ngreeting"));

        let response = request(addr, "DELETE /kv/greeting HTTP/1.1\r\n\r\n");
        assert!(response.ends_with("Deleted: greeting"));
        assert!(store.is_empty());

        let response = request(addr, "GET /nowhere HTTP/1.1\r\n\r\n");
        assert!(response.starts_with("HTTP/1.1 404"));

        handle.shutdown();
        join.join().unwrap();
    }

    #[test]
    fn test_many_concurrent_clients() {
        let config = ServerConfig {
            threads: 2,
            ..ServerConfig::default()
        };
        let (addr, store, handle, join) = start_server(config);

        let clients: Vec<_> = (0..16)
            .map(|i| {
                thread::spawn(move || {
                    let raw = format!("PUT /kv/key{} HTTP/1.1\r\nContent-Length: 1\r\n\r\nv", i);
                    request(addr, &raw)
                })
            })
            .collect();

        for client in clients {
            assert!(client.join().unwrap().starts_with("HTTP/1.1 201"));
        }
        assert_eq!(store.keys().len(), 16);

        handle.shutdown();
        join.join().unwrap();
    }

    #[test]
    fn test_background_expiry_runs() {
        let config = ServerConfig {
            expiry: ExpiryConfig::default().with_interval(Duration::from_millis(10)),
            ..ServerConfig::default()
        };
        let (addr, store, handle, join) = start_server(config);

        store.set_with_ttl("short", "v", Duration::from_millis(10));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(store.len(), 0);

        let response = request(addr, "GET /kv/short HTTP/1.1\r\n\r\n");
        assert!(response.starts_with("HTTP/1.1 404"));

        handle.shutdown();
        join.join().unwrap();
    }

    #[test]
    fn test_shutdown_is_prompt() {
        let (_, _, handle, join) = start_server(ServerConfig::default());
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        handle.shutdown();
        join.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[cfg(unix)]
    #[test]
    fn test_accept_errors_back_off() {
        use std::os::fd::OwnedFd;

        // A connected socket is not listening, so every accept() fails
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let broken = TcpListener::from(OwnedFd::from(client));

        let server = Server::new(ServerConfig::default());
        let stats = server.stats();
        let handle = server.shutdown_handle();
        let join = thread::spawn(move || server.run_on(broken).unwrap());

        thread::sleep(Duration::from_millis(300));
        handle.shutdown();
        join.join().unwrap();

        let errors = stats.accept_errors.load(Ordering::Relaxed);
        assert!(errors >= 1);
        assert!(errors <= 10, "accept retried {} times in 300ms", errors);
    }

    #[test]
    fn test_bind_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = Server::new(ServerConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..ServerConfig::default()
        });

        assert!(matches!(server.run(), Err(ServerError::Bind { .. })));
    }
}
