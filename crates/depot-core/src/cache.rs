//! Bounded insertion-ordered caches.
//!
//! Both process-wide caches (parsed index snapshots and `show` metadata)
//! evict their *oldest inserted* entry on overflow. That is deliberately
//! not LRU-on-access: keys are content hashes, so a stale entry can never
//! be returned for changed bytes and recency tracking buys nothing.

use std::collections::HashMap;
use std::collections::VecDeque;

/// Hard cap of the index-snapshot cache, keyed by SHA-256 of index bytes.
pub const INDEX_CACHE_CAP: usize = 20;

/// Hard cap of the package-metadata cache, keyed by artifact md5.
pub const SHOW_CACHE_CAP: usize = 100;

#[derive(Debug)]
pub struct BoundedCache<V> {
    cap: usize,
    map: HashMap<String, V>,
    order: VecDeque<String>,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(cap: usize) -> Self {
        assert!(cap > 0, "cache capacity must be positive");
        Self {
            cap,
            map: HashMap::with_capacity(cap),
            order: VecDeque::with_capacity(cap),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.map.get(key).cloned()
    }

    /// Insert, evicting the oldest entry when the cap is reached. A
    /// re-insert under an existing key keeps its original position.
    pub fn insert(&mut self, key: &str, value: V) {
        if self.map.insert(key.to_string(), value).is_some() {
            return;
        }
        self.order.push_back(key.to_string());
        while self.order.len() > self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
