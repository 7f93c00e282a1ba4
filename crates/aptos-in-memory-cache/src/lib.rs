// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! A single bounded, TTL-aware, evicting cache level. `sequencer_resilience`
//! stacks several of these into the multi-level cache described in the spec
//! (§4.H); this crate only knows about one level and one eviction policy.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    hash::Hash,
    time::{Duration, Instant},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Eviction {
    Lru,
    Fifo,
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Option<Duration>,
}

/// A fixed-capacity cache level. `K` must be cheap to clone: it is stored twice,
/// once in the map and once in the recency/insertion order list.
pub struct CacheLevel<K, V> {
    capacity: usize,
    eviction: Eviction,
    entries: DashMap<K, Entry<V>>,
    order: Mutex<VecDeque<K>>,
}

impl<K, V> CacheLevel<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, eviction: Eviction) -> Self {
        Self {
            capacity,
            eviction,
            entries: DashMap::with_capacity(capacity),
            order: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let expired = {
            let entry = self.entries.get(key)?;
            match entry.ttl {
                Some(ttl) => entry.inserted_at.elapsed() > ttl,
                None => false,
            }
        };
        if expired {
            self.remove(key);
            return None;
        }
        if self.eviction == Eviction::Lru {
            self.touch(key);
        }
        self.entries.get(key).map(|e| e.value.clone())
    }

    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let is_new = !self.entries.contains_key(&key);
        self.entries.insert(
            key.clone(),
            Entry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        if is_new {
            let mut order = self.order.lock();
            order.push_back(key);
            if order.len() > self.capacity {
                if let Some(evicted) = order.pop_front() {
                    self.entries.remove(&evicted);
                }
            }
        } else if self.eviction == Eviction::Lru {
            self.touch(&key);
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let removed = self.entries.remove(key).map(|(_, e)| e.value);
        if removed.is_some() {
            self.order.lock().retain(|k| k != key);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&self, key: &K) {
        let mut order = self.order.lock();
        if let Some(pos) = order.iter().position(|k| k == key) {
            let k = order.remove(pos).expect("position came from iter");
            order.push_back(k);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_lru_entry_on_overflow() {
        let cache: CacheLevel<&str, u32> = CacheLevel::new(2, Eviction::Lru);
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        cache.get(&"a"); // touch a, b becomes the LRU entry
        cache.set("c", 3, None);
        assert!(cache.get(&"a").is_some());
        assert!(cache.get(&"b").is_none());
        assert!(cache.get(&"c").is_some());
    }

    #[test]
    fn fifo_ignores_reads() {
        let cache: CacheLevel<&str, u32> = CacheLevel::new(2, Eviction::Fifo);
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        cache.get(&"a");
        cache.set("c", 3, None);
        assert!(cache.get(&"a").is_none());
        assert!(cache.get(&"b").is_some());
    }

    #[test]
    fn ttl_expires_entries() {
        let cache: CacheLevel<&str, u32> = CacheLevel::new(4, Eviction::Lru);
        cache.set("a", 1, Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get(&"a").is_none());
    }
}
