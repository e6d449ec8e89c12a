//! Reader/Writer-Locked Concurrent Map
//!
//! A generic `HashMap` wrapped in a single `RwLock`. This is the only place in
//! EmberKV that touches shared table memory directly; everything above it
//! (the TTL store, the expiry sweeper) goes through the operations here.
//!
//! ## Locking
//!
//! | Operation      | Lock      |
//! |----------------|-----------|
//! | `get`          | shared    |
//! | `keys`         | shared    |
//! | `len`          | shared    |
//! | `for_each`     | shared    |
//! | `set`          | exclusive |
//! | `remove`       | exclusive |
//! | `remove_where` | exclusive |
//! | `remove_if`    | exclusive |
//!
//! Every call is atomic on its own. Two calls are not: `get` followed by `set`
//! is not a compare-and-swap.
//!
//! Callbacks passed to `for_each`, `remove_where` and `remove_if` run while the
//! lock is held and must not call back into the same map. A re-entrant write
//! deadlocks, and a re-entrant read can deadlock too when a writer is queued.
//!
//! ## Poisoning
//!
//! If a callback panics while the lock is held, the lock is poisoned. The map
//! holds no invariant that a half-finished callback can break (each mutation
//! is a single `HashMap` call), so the guard is recovered and later calls keep
//! working.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A thread-safe map with multiple-reader / single-writer semantics.
///
/// # Example
///
/// ```
/// use emberkv::storage::ConcurrentMap;
///
/// let map = ConcurrentMap::new();
/// map.set("a".to_string(), 1);
/// map.set("b".to_string(), 2);
///
/// assert_eq!(map.get("a"), Some(1));
/// assert_eq!(map.remove_if(|_, v| *v > 1), 1);
/// assert_eq!(map.len(), 1);
/// ```
#[derive(Debug)]
pub struct ConcurrentMap<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for ConcurrentMap<K, V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, V>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, V>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.read().get(key).cloned()
    }

    /// Inserts or overwrites the value stored under `key`.
    pub fn set(&self, key: K, value: V) {
        self.write().insert(key, value);
    }

    /// Removes `key`. Returns whether it was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.write().remove(key).is_some()
    }

    /// Removes `key` only if its current value satisfies `predicate`.
    ///
    /// The check and the removal happen under one exclusive lock, so a value
    /// written by another thread after the caller last looked is judged on
    /// its own merits.
    pub fn remove_where<Q, F>(&self, key: &Q, predicate: F) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> bool,
    {
        let mut map = self.write();
        match map.get(key) {
            Some(value) if predicate(value) => {
                map.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Returns a point-in-time copy of every key.
    ///
    /// The returned `Vec` is detached from the map and stays valid however the
    /// map changes afterwards.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.read().keys().cloned().collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every entry while holding the shared lock for the whole pass.
    ///
    /// `f` must not call back into this map.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for (key, value) in self.read().iter() {
            f(key, value);
        }
    }

    /// Removes every entry for which `predicate` returns true, in a single
    /// exclusive pass. The predicate is evaluated exactly once per entry.
    ///
    /// Returns the number of entries removed.
    pub fn remove_if<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut map = self.write();
        let before = map.len();
        map.retain(|key, value| !predicate(key, value));
        before - map.len()
    }
}
