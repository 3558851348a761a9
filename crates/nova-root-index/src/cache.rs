use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

/// Thread-safe segmented LRU.
///
/// New entries land in the probation segment; a second hit promotes them to the protected
/// segment, whose overflow is demoted back to probation. One-off lookups (e.g. a directory
/// walk) therefore can't flush entries that are queried repeatedly.
#[derive(Debug)]
pub(crate) struct SlruCache<K: Hash + Eq, V> {
    inner: Mutex<Segments<K, V>>,
}

#[derive(Debug)]
struct Segments<K: Hash + Eq, V> {
    probation: LruCache<K, V>,
    protected: LruCache<K, V>,
}

impl<K: Hash + Eq + Clone, V: Clone> SlruCache<K, V> {
    /// `capacity` applies to each segment.
    pub(crate) fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(Segments {
                probation: LruCache::new(capacity),
                protected: LruCache::new(capacity),
            }),
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        if let Some(value) = inner.protected.get(key) {
            return Some(value.clone());
        }

        let value = inner.probation.pop(key)?;
        if let Some((demoted_key, demoted)) = inner.protected.push(key.clone(), value.clone()) {
            inner.probation.put(demoted_key, demoted);
        }
        Some(value)
    }

    pub(crate) fn put(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        if inner.protected.contains(&key) {
            inner.protected.put(key, value);
        } else {
            inner.probation.put(key, value);
        }
    }

    /// Returns the cached value or computes, stores and returns a fresh one.
    ///
    /// The lock is not held while `compute` runs, so concurrent misses may compute twice.
    pub(crate) fn get_or_try_insert<E>(
        &self,
        key: &K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = compute()?;
        self.put(key.clone(), value.clone());
        Ok(value)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.probation.len() + inner.protected.len()
    }
}
