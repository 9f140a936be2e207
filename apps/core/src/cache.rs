//! Time-boxed cache on top of an LRU map.
//!
//! Entries are stamped with the injected clock when written and checked for
//! staleness on read (lazy expiry, no background sweep). Writes replace the
//! whole entry, so concurrent readers only ever observe complete snapshots.

use crate::clock::Clock;
use chrono::Duration;
use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

struct Entry<V> {
    value: V,
    written_at: chrono::DateTime<chrono::Utc>,
}

pub struct TtlCache<K: Hash + Eq, V: Clone> {
    entries: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("cache capacity is nonzero");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            clock,
        }
    }

    /// Returns a clone of the cached value, dropping it first if its TTL
    /// has elapsed.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache mutex poisoned");

        let fresh = match entries.get(key) {
            Some(entry) => now.signed_duration_since(entry.written_at) < self.ttl,
            None => return None,
        };

        if fresh {
            entries.get(key).map(|entry| entry.value.clone())
        } else {
            entries.pop(key);
            None
        }
    }

    /// Stores a value, resetting its TTL to start now.
    pub fn set(&self, key: K, value: V) {
        let entry = Entry {
            value,
            written_at: self.clock.now(),
        };
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .put(key, entry);
    }

    /// Drops an entry ahead of its TTL. Returns whether one was present.
    pub fn expire(&self, key: &K) -> bool {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .pop(key)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
