//! Generic TTL content cache with fixed capacity and oldest-entry eviction.
//!
//! Keyed on an opaque `String` (the AI provider client hashes its own keys).
//! One oldest entry (by insertion time, not access recency) is evicted when
//! an insert would exceed capacity — this is a TTL+FIFO cache, not an LRU:
//! eviction is by cached-at time only, so eviction order never depends on
//! read traffic.

use indexmap::IndexMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    cached_at: Instant,
    hits: u64,
}

pub struct TtlCache<V: Clone> {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<IndexMap<String, Entry<V>>>,
    hit_count: Mutex<u64>,
    miss_count: Mutex<u64>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: Mutex::new(IndexMap::new()),
            hit_count: Mutex::new(0),
            miss_count: Mutex::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some(entry) if entry.cached_at.elapsed() < self.ttl => {
                entry.hits += 1;
                *self.hit_count.lock().unwrap() += 1;
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.shift_remove(key);
                *self.miss_count.lock().unwrap() += 1;
                None
            }
            None => {
                *self.miss_count.lock().unwrap() += 1;
                None
            }
        }
    }

    /// Inserts `value` under `key`, evicting exactly one oldest entry first
    /// if the cache is at capacity.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.lock().unwrap();
        let key = key.into();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.shift_remove_index(0);
        }
        entries.insert(
            key,
            Entry {
                value,
                cached_at: Instant::now(),
                hits: 0,
            },
        );
    }

    pub fn hit_count(&self) -> u64 {
        *self.hit_count.lock().unwrap()
    }

    pub fn miss_count(&self) -> u64 {
        *self.miss_count.lock().unwrap()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_insert_then_hit_bumps_counters() {
        let cache: TtlCache<String> = TtlCache::new(10, Duration::from_secs(60));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.miss_count(), 1);

        cache.insert("a", "value".to_string());
        assert_eq!(cache.get("a"), Some("value".to_string()));
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn expired_entry_counts_as_miss_and_is_evicted() {
        let cache: TtlCache<i32> = TtlCache::new(10, Duration::from_millis(10));
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn overflow_evicts_exactly_one_oldest_entry() {
        let cache: TtlCache<i32> = TtlCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }
}
