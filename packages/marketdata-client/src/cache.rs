//! In-process TTL cache used to front every market data endpoint.
//!
//! Each entry expires independently of the others; there is no capacity bound
//! here because unlike the AI response cache, the key space (ticker symbols)
//! is small and naturally self-limiting.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<V: Clone> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().unwrap();
        let entry = entries.get(key)?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn get_many(&self, keys: &[String]) -> HashMap<String, V> {
        let entries = self.entries.read().unwrap();
        let now = Instant::now();
        keys.iter()
            .filter_map(|k| {
                let entry = entries.get(k)?;
                if now >= entry.expires_at {
                    return None;
                }
                Some((k.clone(), entry.value.clone()))
            })
            .collect()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_before_expiry_miss_after() {
        let cache = TtlCache::new();
        cache.set("ASML", 123.4, Duration::from_millis(20));
        assert_eq!(cache.get("ASML"), Some(123.4));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("ASML"), None);
    }

    #[test]
    fn get_many_returns_only_cached_and_fresh() {
        let cache = TtlCache::new();
        cache.set("A", 1, Duration::from_secs(60));
        cache.set("B", 2, Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(20));
        let keys = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let found = cache.get_many(&keys);
        assert_eq!(found.len(), 1);
        assert_eq!(found.get("A"), Some(&1));
    }
}
