//! Background Expiry Manager
//!
//! This module runs the *active* half of expiry: a dedicated thread that
//! periodically calls [`Store::cleanup_expired`]. The *lazy* half lives in
//! [`Store::get`].
//!
//! ## Why Do We Need This?
//!
//! Lazy expiry only fires when a key is read. A key that expires and is never
//! read again would otherwise stay in memory forever.
//!
//! ## Design
//!
//! ```text
//!   Stopped ──start()──> Running ──stop()──> Stopped
//! ```
//!
//! The thread loops:
//! 1. Sweep the store
//! 2. Wait for the configured interval, or until `stop()` is called
//!
//! The wait is a `Condvar::wait_timeout_while` on a shared stop flag, not a
//! plain sleep. `stop()` flips the flag and notifies, so the thread wakes at
//! once and shutdown latency does not depend on the interval.

use crate::storage::Store;
use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, info_span, warn};

/// Configuration for the expiry manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryConfig {
    /// Interval between sweeps (default: 1s)
    pub interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

impl ExpiryConfig {
    /// Sets the sweep interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Stop flag shared between the manager and its thread.
#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

impl StopSignal {
    fn set(&self, value: bool) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }

    fn is_set(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn trigger(&self) {
        self.set(true);
        self.cvar.notify_all();
    }

    /// Waits up to `timeout`. Returns true as soon as the signal is set.
    fn wait(&self, timeout: Duration) -> bool {
        let guard = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Owns the background sweep thread.
///
/// The manager holds an `Arc` to the store it sweeps, so the store outlives
/// the thread by construction. Dropping a running manager stops it.
///
/// # Example
///
/// ```
/// use emberkv::storage::{ExpiryConfig, ExpiryManager, Store};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let store = Arc::new(Store::new());
/// let config = ExpiryConfig::default().with_interval(Duration::from_millis(100));
///
/// let mut manager = ExpiryManager::new(Arc::clone(&store), config);
/// manager.start().unwrap();
/// assert!(manager.is_running());
///
/// manager.stop();
/// manager.stop(); // no-op
/// assert!(!manager.is_running());
/// ```
#[derive(Debug)]
pub struct ExpiryManager {
    store: Arc<Store>,
    config: ExpiryConfig,
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl ExpiryManager {
    /// Creates a stopped manager for `store`.
    pub fn new(store: Arc<Store>, config: ExpiryConfig) -> Self {
        Self {
            store,
            config,
            signal: Arc::new(StopSignal::default()),
            handle: None,
        }
    }

    /// Returns the configured sweep interval.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Returns true between a successful `start()` and the next `stop()`.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Launches the sweep thread.
    ///
    /// Calling this while already running logs a warning and does nothing.
    /// Fails only if the OS refuses to spawn the thread.
    pub fn start(&mut self) -> io::Result<()> {
        if self.is_running() {
            warn!("Expiry manager already running, ignoring start()");
            return Ok(());
        }

        self.signal.set(false);

        let store = Arc::clone(&self.store);
        let signal = Arc::clone(&self.signal);
        let interval = self.config.interval;

        let handle = thread::Builder::new()
            .name("expiry".to_string())
            .spawn(move || sweep_loop(store, interval, signal))?;
        self.handle = Some(handle);

        info!(interval_ms = interval.as_millis() as u64, "Expiry manager started");
        Ok(())
    }

    /// Stops the sweep thread and waits for it to exit.
    ///
    /// Wakes the thread even if it is mid-wait. Calling this when not running
    /// is a no-op.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.signal.trigger();
        if handle.join().is_err() {
            warn!("Expiry thread panicked");
        }

        info!("Expiry manager stopped");
    }
}

impl Drop for ExpiryManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweep loop.
fn sweep_loop(store: Arc<Store>, interval: Duration, signal: Arc<StopSignal>) {
    let _span = info_span!("expiry").entered();

    while !signal.is_set() {
        let removed = store.cleanup_expired();
        if removed > 0 {
            debug!(
                removed = removed,
                keys_remaining = store.len(),
                "Expired keys cleaned up"
            );
        }

        if signal.wait(interval) {
            debug!("Expiry manager received stop signal");
            break;
        }
    }
}
