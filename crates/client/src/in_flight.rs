//! Duplicate-write suppression.
//!
//! A key stays claimed for as long as its [`InFlightGuard`] lives. The
//! guard releases on drop, so a write future that is cancelled mid-await
//! frees its key the same way a finished one does.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct InFlightSet<K> {
    keys: Arc<Mutex<HashSet<K>>>,
}

impl<K: Eq + Hash + Copy> InFlightSet<K> {
    pub fn new() -> Self {
        Self {
            keys: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Claim `key`, or `None` if another write already holds it.
    pub fn try_acquire(&self, key: K) -> Option<InFlightGuard<K>> {
        if !lock(&self.keys).insert(key) {
            return None;
        }
        Some(InFlightGuard {
            keys: Arc::clone(&self.keys),
            key,
        })
    }

    pub fn contains(&self, key: &K) -> bool {
        lock(&self.keys).contains(key)
    }
}

impl<K: Eq + Hash + Copy> Default for InFlightSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InFlightGuard<K: Eq + Hash> {
    keys: Arc<Mutex<HashSet<K>>>,
    key: K,
}

impl<K: Eq + Hash> Drop for InFlightGuard<K> {
    fn drop(&mut self) {
        lock(&self.keys).remove(&self.key);
    }
}

fn lock<K>(keys: &Mutex<HashSet<K>>) -> MutexGuard<'_, HashSet<K>> {
    keys.lock().unwrap_or_else(PoisonError::into_inner)
}
