//! Bounded read cache.
//!
//! Sits in front of segment lookups. Capacity is measured in key plus
//! value bytes and the least recently used entries are evicted first.
//! A segment reads and refreshes entries only while holding its own
//! lock, so a cached value is never older than the log.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that fell through.
    pub misses: u64,
    /// Cached entries.
    pub entries: usize,
    /// Bytes held, keys included.
    pub bytes: usize,
}

struct Entry {
    value: Vec<u8>,
    tick: u64,
}

#[derive(Default)]
struct CacheInner {
    used: usize,
    tick: u64,
    entries: HashMap<Vec<u8>, Entry>,
    /// Recency order, oldest first.
    order: BTreeMap<u64, Vec<u8>>,
}

impl CacheInner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &[u8]) {
        if let Some(entry) = self.entries.remove(key) {
            self.order.remove(&entry.tick);
            self.used -= key.len() + entry.value.len();
        }
    }
}

/// An LRU cache bounded by total bytes.
pub struct ReadCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ReadCache {
    /// Creates a cache holding at most `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Byte budget.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a copy of the cached value and marks it recently used.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();
        let Some(entry) = inner.entries.get_mut(key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        let previous = std::mem::replace(&mut entry.tick, tick);
        let value = entry.value.clone();
        if let Some(k) = inner.order.remove(&previous) {
            inner.order.insert(tick, k);
        }
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(value)
    }

    /// Caches `value` under `key`, evicting old entries to make room.
    ///
    /// Entries larger than the whole budget are not cached, and any
    /// older value for `key` is dropped.
    pub fn insert(&self, key: &[u8], value: &[u8]) {
        let cost = key.len() + value.len();
        let mut inner = self.inner.lock();
        inner.remove(key);
        if cost > self.capacity {
            return;
        }
        while inner.used + cost > self.capacity {
            let Some((_, oldest)) = inner.order.pop_first() else {
                break;
            };
            if let Some(entry) = inner.entries.remove(&oldest) {
                inner.used -= oldest.len() + entry.value.len();
            }
        }
        let tick = inner.next_tick();
        inner.order.insert(tick, key.to_vec());
        inner.entries.insert(
            key.to_vec(),
            Entry {
                value: value.to_vec(),
                tick,
            },
        );
        inner.used += cost;
    }

    /// Returns current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: inner.entries.len(),
            bytes: inner.used,
        }
    }
}

impl std::fmt::Debug for ReadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_and_miss() {
        let cache = ReadCache::new(100);
        assert_eq!(cache.get(b"k"), None);
        cache.insert(b"k", b"value");
        assert_eq!(cache.get(b"k"), Some(b"value".to_vec()));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!((stats.entries, stats.bytes), (1, 6));
    }

    #[test]
    fn insert_replaces_value() {
        let cache = ReadCache::new(100);
        cache.insert(b"k", b"old");
        cache.insert(b"k", b"newer");
        assert_eq!(cache.get(b"k"), Some(b"newer".to_vec()));
        assert_eq!(cache.stats().bytes, 6);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = ReadCache::new(12);
        cache.insert(b"a", b"11111");
        cache.insert(b"b", b"22222");
        // Touch `a` so `b` is the oldest.
        cache.get(b"a");
        cache.insert(b"c", b"33333");

        assert_eq!(cache.get(b"b"), None);
        assert_eq!(cache.get(b"a"), Some(b"11111".to_vec()));
        assert_eq!(cache.get(b"c"), Some(b"33333".to_vec()));
        assert!(cache.stats().bytes <= 12);
    }

    #[test]
    fn oversized_entry_is_skipped() {
        let cache = ReadCache::new(4);
        cache.insert(b"k", b"v");
        cache.insert(b"k", b"too large");
        assert_eq!(cache.get(b"k"), None);
        assert_eq!(cache.stats().bytes, 0);
    }
}
