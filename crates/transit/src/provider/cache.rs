//! Process-local cache backed by a concurrent hash map.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::network::traits::Cache;

/// Unbounded in-memory [`Cache`]
#[derive(Debug)]
pub struct MemoryCache<V> {
    entries: DashMap<String, V>,
}

impl<V> MemoryCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> Cache<V> for MemoryCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: V) {
        self.entries.insert(key.to_owned(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

/// Invalidation counter for a memo.
///
/// Invalidating advances the counter before clearing the cache. A load that
/// started under an older generation writes its value and then takes it back
/// out, so a result read before the invalidation never outlives it.
#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn advance(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// Memoize `value` under `key` for a load that began at generation
    /// `seen`. Returns false when an invalidation ran in between.
    pub fn memoize<V>(&self, cache: &dyn Cache<V>, seen: u64, key: &str, value: V) -> bool {
        cache.set(key, value);
        if self.current() == seen {
            return true;
        }
        cache.remove(key);
        false
    }
}
