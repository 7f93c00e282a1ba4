// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use aptos_in_memory_cache::{CacheLevel, Eviction};
use aptos_infallible::Mutex;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::time::Duration;

/// One tier's configuration: its capacity, eviction policy, and TTL.
pub struct TierConfig {
    pub capacity: usize,
    pub eviction: Eviction,
    pub ttl: Option<Duration>,
}

/// Converts a value to and from a compact byte form. Values stored above
/// the configured compression threshold are kept compressed and expanded
/// again on read. Callers supply their own codec rather than the cache
/// hard-coding one, since the right trade-off (speed vs. ratio) is a
/// property of the value type, not of the cache.
pub trait Compressor<V>: Send + Sync {
    fn compress(&self, value: &V) -> Vec<u8>;
    fn decompress(&self, bytes: &[u8]) -> V;
}

#[derive(Clone)]
enum Entry<V> {
    Plain(V),
    Compressed(Vec<u8>),
}

/// Several [`CacheLevel`]s stacked from fastest/smallest to
/// slowest/largest (§4.H). A hit at a lower tier is promoted into every
/// tier above it so the next lookup is served by the fastest one; a miss
/// checks every tier before giving up.
///
/// Keys may declare dependents: deleting a key under the cascade strategy
/// also deletes everything transitively registered as depending on it.
/// Access patterns are recorded so a caller can ask `likely_successor` for
/// the key most often accessed right after a given one, and prefetch it.
pub struct MultiLevelCache<K, V> {
    tiers: Vec<CacheLevel<K, Entry<V>>>,
    compressor: Option<Box<dyn Compressor<V>>>,
    compress_threshold_bytes: Option<usize>,
    dependents: Mutex<HashMap<K, HashSet<K>>>,
    last_access: Mutex<Option<K>>,
    successor_counts: Mutex<HashMap<K, HashMap<K, u64>>>,
}

impl<K, V> MultiLevelCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(tiers: Vec<TierConfig>) -> Self {
        Self::with_compression(tiers, None, None)
    }

    /// Same as [`Self::new`], but values larger than `threshold_bytes`
    /// (measured by `compressor`) are stored compressed and transparently
    /// expanded on read.
    pub fn with_compression(
        tiers: Vec<TierConfig>,
        compressor: Option<Box<dyn Compressor<V>>>,
        compress_threshold_bytes: Option<usize>,
    ) -> Self {
        assert!(!tiers.is_empty(), "a multi-level cache needs at least one tier");
        MultiLevelCache {
            tiers: tiers
                .into_iter()
                .map(|t| CacheLevel::new(t.capacity, t.eviction))
                .collect(),
            compressor,
            compress_threshold_bytes,
            dependents: Mutex::new(HashMap::new()),
            last_access: Mutex::new(None),
            successor_counts: Mutex::new(HashMap::new()),
        }
    }

    fn encode(&self, value: V) -> Entry<V> {
        match (&self.compressor, self.compress_threshold_bytes) {
            (Some(codec), Some(threshold)) => {
                let bytes = codec.compress(&value);
                if bytes.len() >= threshold {
                    Entry::Compressed(bytes)
                } else {
                    Entry::Plain(value)
                }
            }
            _ => Entry::Plain(value),
        }
    }

    fn decode(&self, entry: Entry<V>) -> V {
        match entry {
            Entry::Plain(v) => v,
            Entry::Compressed(bytes) => self
                .compressor
                .as_ref()
                .expect("compressed entry exists only when a compressor is configured")
                .decompress(&bytes),
        }
    }

    fn record_access(&self, key: &K) {
        let mut last = self.last_access.lock();
        if let Some(previous) = last.replace(key.clone()) {
            if &previous != key {
                *self
                    .successor_counts
                    .lock()
                    .entry(previous)
                    .or_default()
                    .entry(key.clone())
                    .or_insert(0) += 1;
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.record_access(key);
        for (i, tier) in self.tiers.iter().enumerate() {
            if let Some(entry) = tier.get(key) {
                let value = self.decode(entry.clone());
                for faster in &self.tiers[..i] {
                    faster.set(key.clone(), entry.clone(), None);
                }
                return Some(value);
            }
        }
        None
    }

    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let entry = self.encode(value);
        for tier in &self.tiers {
            tier.set(key.clone(), entry.clone(), ttl);
        }
    }

    pub fn remove(&self, key: &K) {
        for tier in &self.tiers {
            tier.remove(key);
        }
    }

    /// Registers `dependent` as invalidated whenever `key` is invalidated
    /// under [`Self::invalidate_cascade`].
    pub fn register_dependent(&self, key: K, dependent: K) {
        self.dependents.lock().entry(key).or_default().insert(dependent);
    }

    /// Removes `key` and every key transitively registered as its
    /// dependent.
    pub fn invalidate_cascade(&self, key: &K) {
        let mut to_remove = vec![key.clone()];
        let mut seen = HashSet::new();
        seen.insert(key.clone());
        let mut i = 0;
        while i < to_remove.len() {
            let current = to_remove[i].clone();
            i += 1;
            if let Some(direct) = self.dependents.lock().get(&current).cloned() {
                for dependent in direct {
                    if seen.insert(dependent.clone()) {
                        to_remove.push(dependent);
                    }
                }
            }
        }
        for key in &to_remove {
            self.remove(key);
            self.dependents.lock().remove(key);
        }
    }

    /// The key most often accessed immediately after `key`, if any access
    /// history has been recorded for it.
    pub fn likely_successor(&self, key: &K) -> Option<K> {
        self.successor_counts
            .lock()
            .get(key)
            .and_then(|counts| counts.iter().max_by_key(|(_, count)| **count).map(|(k, _)| k.clone()))
    }

    /// If a successor has been predicted for `key` and is not already
    /// cached, loads it with `loader` and stores it. Call after a hit on
    /// `key` to speculatively warm the next likely lookup.
    pub fn prefetch(&self, key: &K, loader: impl FnOnce(&K) -> Option<V>) {
        if let Some(successor) = self.likely_successor(key) {
            if self.get(&successor).is_none() {
                if let Some(value) = loader(&successor) {
                    self.set(successor, value, None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tier_cache() -> MultiLevelCache<&'static str, u32> {
        MultiLevelCache::new(vec![
            TierConfig { capacity: 1, eviction: Eviction::Lru, ttl: None },
            TierConfig { capacity: 8, eviction: Eviction::Lru, ttl: None },
        ])
    }

    #[test]
    fn hit_on_lower_tier_promotes_to_upper_tier() {
        let cache = two_tier_cache();
        cache.tiers[1].set("a", Entry::Plain(1), None);
        assert!(cache.tiers[0].get(&"a").is_none());
        assert_eq!(cache.get(&"a"), Some(1));
        assert!(cache.tiers[0].get(&"a").is_some());
    }

    #[test]
    fn set_writes_through_every_tier() {
        let cache = two_tier_cache();
        cache.set("a", 1, None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert!(cache.tiers[1].get(&"a").is_some());
    }

    #[test]
    fn remove_clears_every_tier() {
        let cache = two_tier_cache();
        cache.set("a", 1, None);
        cache.remove(&"a");
        assert!(cache.get(&"a").is_none());
    }

    #[test]
    fn cascade_invalidation_removes_transitive_dependents() {
        let cache = two_tier_cache();
        cache.set("root", 1, None);
        cache.set("child", 2, None);
        cache.set("grandchild", 3, None);
        cache.register_dependent("root", "child");
        cache.register_dependent("child", "grandchild");

        cache.invalidate_cascade(&"root");

        assert!(cache.get(&"root").is_none());
        assert!(cache.get(&"child").is_none());
        assert!(cache.get(&"grandchild").is_none());
    }

    #[test]
    fn likely_successor_tracks_the_most_frequent_follow_up_access() {
        let cache = two_tier_cache();
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        cache.set("c", 3, None);

        cache.get(&"a");
        cache.get(&"b");
        cache.get(&"a");
        cache.get(&"b");
        cache.get(&"a");
        cache.get(&"c");

        assert_eq!(cache.likely_successor(&"a"), Some("b"));
    }

    struct Doubling;
    impl Compressor<Vec<u8>> for Doubling {
        fn compress(&self, value: &Vec<u8>) -> Vec<u8> {
            value.clone()
        }
        fn decompress(&self, bytes: &[u8]) -> Vec<u8> {
            bytes.to_vec()
        }
    }

    #[test]
    fn values_above_the_threshold_round_trip_through_the_compressor() {
        let cache: MultiLevelCache<&'static str, Vec<u8>> = MultiLevelCache::with_compression(
            vec![TierConfig { capacity: 8, eviction: Eviction::Lru, ttl: None }],
            Some(Box::new(Doubling)),
            Some(4),
        );
        let small = vec![1, 2];
        let large = vec![1, 2, 3, 4, 5, 6];
        cache.set("small", small.clone(), None);
        cache.set("large", large.clone(), None);

        assert_eq!(cache.get(&"small"), Some(small));
        assert_eq!(cache.get(&"large"), Some(large));
    }
}
