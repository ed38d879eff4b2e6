//! Eviction Policy Module
//!
//! Picks the next victim when the store is full.

use std::borrow::Borrow;
use std::hash::Hash;

use tracing::warn;

use crate::cache::LinkedMap;
use crate::config::EvictionStrategy;

// == Eviction Policy ==
/// Eviction bookkeeping, selected once at construction.
///
/// - `Lru` keeps every live key in recency order (front = least recently used).
/// - `Fifo` keeps nothing: the value table's own insertion order is the queue.
#[derive(Debug, Clone)]
pub enum EvictionPolicy<K> {
    Lru(LinkedMap<K, ()>),
    Fifo,
}

impl<K> EvictionPolicy<K>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    pub fn new(strategy: EvictionStrategy) -> Self {
        match strategy {
            EvictionStrategy::Lru => Self::Lru(LinkedMap::new()),
            EvictionStrategy::Fifo => Self::Fifo,
        }
    }

    pub fn strategy(&self) -> EvictionStrategy {
        match self {
            Self::Lru(_) => EvictionStrategy::Lru,
            Self::Fifo => EvictionStrategy::Fifo,
        }
    }

    // == Touch ==
    /// Marks a key as just used. New keys are registered as most recent.
    pub fn touch(&mut self, key: &K) {
        if let Self::Lru(order) = self {
            if !order.move_to_back(key) {
                order.insert(key.clone(), ());
            }
        }
    }

    // == Evict One ==
    /// Removes and returns the key that should leave the table next.
    ///
    /// `table` is the value table in insertion order. It is the FIFO queue, and
    /// the fallback when the LRU order has nothing live to offer while the
    /// table still holds entries.
    pub fn evict_one<V>(&mut self, table: &LinkedMap<K, V>) -> Option<K> {
        if let Self::Lru(order) = self {
            while let Some((key, ())) = order.pop_front() {
                if table.contains_key(&key) {
                    return Some(key);
                }
            }
            if !table.is_empty() {
                warn!(
                    table_len = table.len(),
                    "LRU order empty while table is not, falling back to insertion order"
                );
            }
        }
        table.front().map(|(key, _)| key.clone())
    }

    // == Remove ==
    pub fn remove<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Self::Lru(order) = self {
            order.remove(key);
        }
    }

    /// Number of eviction records held (always 0 for FIFO).
    pub fn len(&self) -> usize {
        match self {
            Self::Lru(order) => order.len(),
            Self::Fifo => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        if let Self::Lru(order) = self {
            order.clear();
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn table_of(keys: &[&str]) -> LinkedMap<String, u32> {
        let mut table = LinkedMap::new();
        for (i, key) in keys.iter().enumerate() {
            table.insert(key.to_string(), i as u32);
        }
        table
    }

    fn lru_with(keys: &[&str]) -> EvictionPolicy<String> {
        let mut policy = EvictionPolicy::new(EvictionStrategy::Lru);
        for key in keys {
            policy.touch(&key.to_string());
        }
        policy
    }

    #[test]
    fn test_lru_touch_new_keys() {
        let table = table_of(&["key1", "key2", "key3"]);
        let mut policy = lru_with(&["key1", "key2", "key3"]);

        assert_eq!(policy.len(), 3);
        assert_eq!(policy.evict_one(&table), Some("key1".to_string()));
    }

    #[test]
    fn test_lru_touch_existing_key() {
        let table = table_of(&["key1", "key2", "key3"]);
        let mut policy = lru_with(&["key1", "key2", "key3"]);

        policy.touch(&"key1".to_string());

        assert_eq!(policy.len(), 3);
        assert_eq!(policy.evict_one(&table), Some("key2".to_string()));
    }

    #[test]
    fn test_lru_evict_order_after_touches() {
        let table = table_of(&["a", "b", "c"]);
        let mut policy = lru_with(&["a", "b", "c"]);

        policy.touch(&"a".to_string());
        policy.touch(&"c".to_string());
        policy.touch(&"b".to_string());

        assert_eq!(policy.evict_one(&table), Some("a".to_string()));
        assert_eq!(policy.evict_one(&table), Some("c".to_string()));
        assert_eq!(policy.evict_one(&table), Some("b".to_string()));
    }

    #[test]
    fn test_lru_remove_from_middle() {
        let table = table_of(&["key1", "key2", "key3"]);
        let mut policy = lru_with(&["key1", "key2", "key3"]);

        policy.remove("key2");
        assert_eq!(policy.len(), 2);

        // Removing a missing key leaves the others alone
        policy.remove("nonexistent");
        assert_eq!(policy.len(), 2);

        assert_eq!(policy.evict_one(&table), Some("key1".to_string()));
        assert_eq!(policy.evict_one(&table), Some("key3".to_string()));
        assert!(policy.is_empty());
    }

    #[test]
    fn test_lru_evict_empty() {
        let mut policy: EvictionPolicy<String> = EvictionPolicy::new(EvictionStrategy::Lru);
        let table: LinkedMap<String, u32> = LinkedMap::new();
        assert_eq!(policy.evict_one(&table), None);
    }

    #[test]
    fn test_lru_falls_back_to_insertion_order() {
        let table = table_of(&["x", "y"]);
        let mut policy: EvictionPolicy<String> = EvictionPolicy::new(EvictionStrategy::Lru);

        assert_eq!(policy.evict_one(&table), Some("x".to_string()));
    }

    #[test]
    fn test_lru_skips_keys_missing_from_table() {
        let table = table_of(&["b"]);
        let mut policy = lru_with(&["a", "b"]);

        assert_eq!(policy.evict_one(&table), Some("b".to_string()));
        assert!(policy.is_empty());
    }

    #[test]
    fn test_fifo_ignores_touches() {
        let table = table_of(&["a", "b", "c"]);
        let mut policy: EvictionPolicy<String> = EvictionPolicy::new(EvictionStrategy::Fifo);

        policy.touch(&"a".to_string());

        assert_eq!(policy.len(), 0);
        assert_eq!(policy.strategy(), EvictionStrategy::Fifo);
        assert_eq!(policy.evict_one(&table), Some("a".to_string()));
    }

    #[test]
    fn test_clear() {
        let mut policy = lru_with(&["a", "b"]);
        policy.clear();
        assert!(policy.is_empty());
        assert_eq!(policy.len(), 0);
    }
}
