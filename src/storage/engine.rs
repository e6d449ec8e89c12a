//! TTL-Aware Key-Value Store
//!
//! This module layers time-to-live semantics on top of [`ConcurrentMap`].
//!
//! ## Expiry Model
//!
//! Every entry carries an optional absolute deadline on the monotonic clock
//! (`Instant`). Wall-clock adjustments never move a deadline.
//!
//! An entry whose deadline has passed is *logically deleted* from that moment
//! on, whether or not it has been physically removed yet. Physical removal
//! happens in one of three ways:
//!
//! 1. **Lazy**: `get` finds the entry expired and removes it.
//! 2. **Active**: `cleanup_expired` sweeps the whole table (driven by the
//!    [`ExpiryManager`](crate::storage::ExpiryManager)).
//! 3. **Explicit**: `remove`, which does not care about expiry at all.
//!
//! Removing an absent key is a no-op, so lazy and active deletion racing on
//! the same key cannot corrupt anything. Each path counts only what it removed
//! itself.
//!
//! ## Sweep Cost
//!
//! `cleanup_expired` is O(n) in the table size and holds the exclusive lock
//! for the entire scan. Every reader and writer waits for it. With a large
//! table and a short sweep interval this shows up directly as request
//! latency; the interval is the knob that trades memory reclamation speed for
//! tail latency.

use crate::storage::map::ConcurrentMap;
use bytes::Bytes;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Represents a stored value with optional expiry time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The actual value stored
    pub value: Bytes,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl Entry {
    /// Creates a new entry without expiry.
    pub fn new(value: Bytes) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Creates a new entry that expires `ttl` from now.
    ///
    /// A deadline beyond what `Instant` can represent means the entry never
    /// expires.
    pub fn with_ttl(value: Bytes, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Checks if this entry had expired as of `now`.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// The TTL-aware store.
///
/// Designed to be wrapped in an `Arc` and shared between worker threads and
/// the expiry manager. All operations are thread-safe and infallible.
///
/// # Example
///
/// ```
/// use emberkv::storage::Store;
/// use bytes::Bytes;
///
/// let store = Store::new();
///
/// store.set("name", "ember", 0);
/// assert_eq!(store.get("name"), Some(Bytes::from("ember")));
///
/// store.set("session", "abc123", 60);
/// assert_eq!(store.keys().len(), 2);
///
/// assert!(store.remove("name"));
/// assert!(!store.remove("name"));
/// ```
#[derive(Debug, Default)]
pub struct Store {
    map: ConcurrentMap<String, Entry>,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. An expired
    /// entry found here is removed (lazy deletion), so this "read" may take
    /// the exclusive lock.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let entry = self.map.get(key)?;
        let now = Instant::now();

        if !entry.is_expired_at(now) {
            return Some(entry.value);
        }

        // Another thread may have replaced the entry since we read it. Only
        // remove what is still expired.
        if self.map.remove_where(key, |current| current.is_expired_at(now)) {
            debug!(key = key, "Key expired (lazy deletion)");
        }

        None
    }

    /// Sets a key-value pair.
    ///
    /// `ttl_seconds <= 0` stores the value without expiry; a positive value
    /// expires it that many seconds from now. Any existing entry is replaced.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Bytes>, ttl_seconds: i64) {
        match u64::try_from(ttl_seconds) {
            Ok(secs) if secs > 0 => {
                self.set_with_ttl(key, value, Duration::from_secs(secs));
            }
            _ => {
                let key = key.into();
                trace!(key = %key, "SET (no expiry)");
                self.map.set(key, Entry::new(value.into()));
            }
        }
    }

    /// Sets a key-value pair that expires `ttl` from now.
    ///
    /// A zero `ttl` stores an entry that is already expired.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: impl Into<Bytes>, ttl: Duration) {
        let key = key.into();
        trace!(key = %key, ttl_ms = ttl.as_millis() as u64, "SET");
        self.map.set(key, Entry::with_ttl(value.into(), ttl));
    }

    /// Deletes a key regardless of its expiry state.
    ///
    /// Returns `true` if an entry existed, including one that had expired but
    /// was not yet swept.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.map.remove(key);
        trace!(key = key, removed = removed, "DEL");
        removed
    }

    /// Returns every key whose entry has not expired.
    ///
    /// Runs under the shared lock only and never deletes anything; expired
    /// entries are skipped, not removed.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut result = Vec::new();
        self.map.for_each(|key, entry| {
            if !entry.is_expired_at(now) {
                result.push(key.clone());
            }
        });
        result
    }

    /// Removes every entry that has expired as of this call.
    ///
    /// Holds the exclusive lock for the full O(n) scan; see the module docs.
    ///
    /// # Returns
    ///
    /// Returns the number of entries this sweep removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let removed = self.map.remove_if(|_, entry| entry.is_expired_at(now));

        if removed > 0 {
            debug!(removed = removed, "Cleanup removed expired entries");
        }

        removed
    }

    /// Returns the number of physically stored entries, including expired
    /// ones that have not been swept yet.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if nothing is physically stored.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_and_get() {
        let store = Store::new();
        store.set("greeting", "Hello, World!", 0);
        assert_eq!(store.get("greeting"), Some(Bytes::from("Hello, World!")));
    }

    #[test]
    fn test_get_nonexistent() {
        let store = Store::new();
        assert!(store.get("nonexistent").is_none());
    }

    #[test]
    fn test_overwrite() {
        let store = Store::new();
        store.set("key", "old_value", 0);
        store.set("key", "new_value", 0);
        assert_eq!(store.get("key"), Some(Bytes::from("new_value")));
    }

    #[test]
    fn test_overwrite_clears_ttl() {
        let store = Store::new();
        store.set_with_ttl("key", "short", Duration::from_millis(20));
        store.set("key", "forever", 0);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(store.get("key"), Some(Bytes::from("forever")));
    }

    #[test]
    fn test_non_positive_ttl_never_expires() {
        let store = Store::new();
        store.set("zero", "v", 0);
        store.set("negative", "v", -5);

        let entry = store.map.get("zero").unwrap();
        assert!(entry.expires_at.is_none());
        let entry = store.map.get("negative").unwrap();
        assert!(entry.expires_at.is_none());
    }

    #[test]
    fn test_entry_expiry() {
        let entry = Entry::new(Bytes::from("v"));
        assert!(!entry.is_expired());

        let entry = Entry::with_ttl(Bytes::from("v"), Duration::ZERO);
        assert!(entry.is_expired());

        let entry = Entry::with_ttl(Bytes::from("v"), Duration::from_secs(60));
        assert!(!entry.is_expired());
        assert!(entry.is_expired_at(Instant::now() + Duration::from_secs(61)));
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let store = Store::new();
        store.set("key", "value", i64::MAX);
        assert_eq!(store.get("key"), Some(Bytes::from("value")));
    }

    #[test]
    fn test_delete() {
        let store = Store::new();
        store.set("to_delete", "some_value", 0);

        assert!(store.remove("to_delete"));
        assert!(store.get("to_delete").is_none());
        assert!(!store.remove("to_delete"));
        assert!(!store.remove("never_set"));
    }

    #[test]
    fn test_delete_expired_but_unswept() {
        let store = Store::new();
        store.set_with_ttl("key", "value", Duration::from_millis(10));
        thread::sleep(Duration::from_millis(30));

        // Still physically present, so it counts as existing
        assert!(store.remove("key"));
        assert!(!store.remove("key"));
    }

    #[test]
    fn test_ttl_expiration() {
        let store = Store::new();
        store.set("temp_key", "temp_value", 1);

        assert_eq!(store.get("temp_key"), Some(Bytes::from("temp_value")));

        thread::sleep(Duration::from_millis(1500));

        assert!(store.get("temp_key").is_none());
    }

    #[test]
    fn test_lazy_deletion_removes_entry() {
        let store = Store::new();
        store.set_with_ttl("key", "value", Duration::from_millis(10));
        assert_eq!(store.len(), 1);

        thread::sleep(Duration::from_millis(30));

        assert!(store.get("key").is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_keys() {
        let store = Store::new();
        store.set("alpha", "1", 0);
        store.set("beta", "2", 0);
        store.set("gamma", "3", 0);

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_keys_skips_expired_without_removing() {
        let store = Store::new();
        store.set("permanent", "1", 0);
        store.set_with_ttl("temporary", "2", Duration::from_millis(10));

        thread::sleep(Duration::from_millis(30));

        assert_eq!(store.keys(), vec!["permanent".to_string()]);
        // keys() has no side effects
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_cleanup_expired() {
        let store = Store::new();
        store.set("permanent", "stays forever", 0);
        store.set_with_ttl("key1", "value1", Duration::from_millis(10));
        store.set_with_ttl("key2", "value2", Duration::from_millis(10));
        store.set("later", "value", 60);

        thread::sleep(Duration::from_millis(50));

        assert_eq!(store.cleanup_expired(), 2);
        assert_eq!(store.cleanup_expired(), 0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("permanent"), Some(Bytes::from("stays forever")));
        assert_eq!(store.get("later"), Some(Bytes::from("value")));
    }

    #[test]
    fn test_cleanup_after_lazy_deletion_counts_only_its_own() {
        let store = Store::new();
        store.set_with_ttl("a", "1", Duration::from_millis(10));
        store.set_with_ttl("b", "2", Duration::from_millis(10));

        thread::sleep(Duration::from_millis(30));

        assert!(store.get("a").is_none());
        assert_eq!(store.cleanup_expired(), 1);
    }

    #[test]
    fn test_concurrent_access() {
        let store = Arc::new(Store::new());
        let mut handles = vec![];

        for t in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for i in 0..10_000 {
                    let key = format!("t{}-{}", t, i % 100);
                    let value = format!("{}", i);
                    match i % 3 {
                        0 | 1 => {
                            store.set(key.clone(), value.clone(), 0);
                            assert_eq!(store.get(&key), Some(Bytes::from(value)));
                        }
                        _ => {
                            store.remove(&key);
                            assert!(store.get(&key).is_none());
                        }
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        for t in 0..8 {
            for k in 0..100 {
                let key = format!("t{}-{}", t, k);
                // The last operation on each key decides whether it survives
                let last = (0..10_000).filter(|i| i % 100 == k).last().unwrap();
                match last % 3 {
                    0 | 1 => assert_eq!(store.get(&key), Some(Bytes::from(last.to_string()))),
                    _ => assert!(store.get(&key).is_none()),
                }
            }
        }
    }

    #[test]
    fn test_lazy_deletion_never_removes_fresh_value() {
        let store = Arc::new(Store::new());
        let done = Arc::new(AtomicBool::new(false));

        let reader = {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    store.get("contended");
                }
            })
        };

        for _ in 0..20_000 {
            store.set_with_ttl("contended", "old", Duration::ZERO);
            store.set("contended", "fresh", 0);
            assert_eq!(store.get("contended"), Some(Bytes::from("fresh")));
        }

        done.store(true, Ordering::Relaxed);
        reader.join().unwrap();
    }

    #[test]
    fn test_concurrent_sweep_and_lazy_deletion() {
        let store = Arc::new(Store::new());
        for i in 0..1_000 {
            store.set_with_ttl(format!("key{}", i), "v", Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(20));

        let sweeper = {
            let store = Arc::clone(&store);
            thread::spawn(move || store.cleanup_expired())
        };
        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..1_000 {
                    assert!(store.get(&format!("key{}", i)).is_none());
                }
            })
        };

        let swept = sweeper.join().unwrap();
        reader.join().unwrap();

        assert!(swept <= 1_000);
        assert!(store.is_empty());
    }
}
