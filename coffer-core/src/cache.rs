//! Bounded, thread-safe entity cache.
//!
//! LRU with a hard capacity. `put` reports the entry pushed out by the
//! insertion so the owning store can write it back to disk and drop any
//! secondary-index entries before the value disappears — replacing the
//! value under an existing key is not an eviction and is not reported.

use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Bounded key→value cache with LRU eviction.
///
/// Internally synchronised; individual operations are atomic. Business
/// invariants spanning several operations still need the per-entity
/// locks carried by the cached values themselves.
pub struct EntityCache<K: Hash + Eq, V> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq + Clone, V: Clone> EntityCache<K, V> {
    /// Create a cache holding at most `capacity` entries (clamped to 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a key, marking it most-recently-used.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    /// Insert a value, returning the entry evicted to make room (if any).
    pub fn put(&self, key: K, value: V) -> Option<(K, V)> {
        let mut inner = self.inner.lock();
        match inner.push(key.clone(), value) {
            // push also returns the previous value when the key was
            // already present; that is a replacement, not an eviction.
            Some((old_key, old_value)) if old_key != key => Some((old_key, old_value)),
            _ => None,
        }
    }

    /// Remove a key, returning the value that was cached under it.
    pub fn invalidate(&self, key: &K) -> Option<V> {
        self.inner.lock().pop(key)
    }

    /// Whether a key is currently resident (does not touch LRU order).
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().contains(key)
    }

    /// Snapshot of every resident value.
    pub fn values(&self) -> Vec<V> {
        self.inner.lock().iter().map(|(_, v)| v.clone()).collect()
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_invalidate() {
        let cache = EntityCache::with_capacity(4);
        assert!(cache.put(1, "a").is_none());
        assert_eq!(cache.get(&1), Some("a"));
        assert_eq!(cache.invalidate(&1), Some("a"));
        assert!(cache.get(&1).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn eviction_reports_least_recently_used() {
        let cache = EntityCache::with_capacity(2);
        assert!(cache.put(1, "a").is_none());
        assert!(cache.put(2, "b").is_none());
        // Touch 1 so 2 becomes the LRU entry.
        let _ = cache.get(&1);
        let evicted = cache.put(3, "c").expect("must evict");
        assert_eq!(evicted, (2, "b"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn replacement_is_not_an_eviction() {
        let cache = EntityCache::with_capacity(2);
        assert!(cache.put(1, "a").is_none());
        assert!(cache.put(1, "b").is_none());
        assert_eq!(cache.get(&1), Some("b"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn values_snapshot() {
        let cache = EntityCache::with_capacity(4);
        let _ = cache.put(1, 10);
        let _ = cache.put(2, 20);
        let mut values = cache.values();
        values.sort_unstable();
        assert_eq!(values, vec![10, 20]);
    }
}
