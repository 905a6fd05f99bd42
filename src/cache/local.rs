//! Bounded in-process tier.
//!
//! The local tier is a resilience fallback for when the shared store is down,
//! so it is capped rather than sized for hit ratio. Once full, expired entries
//! are purged first and then the soonest-to-expire tenth of the entries is
//! dropped. Ordering by expiry approximates recency without tracking reads.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Instant;

use super::codec::CachedValue;

/// Share of the capacity evicted when the cache is full.
const EVICTION_DIVISOR: usize = 10;

#[derive(Debug, Clone)]
struct LocalEntry {
    value: CachedValue,
    expires_at: Instant,
}

/// Result of a local lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalLookup {
    Hit(CachedValue),
    /// Entry existed but was past its expiry; it has been purged.
    Expired,
    Missing,
}

/// Key → (value, expiry) map with a hard capacity ceiling.
#[derive(Debug)]
pub struct BoundedLocalCache {
    entries: HashMap<String, LocalEntry>,
    capacity: NonZeroUsize,
}

impl BoundedLocalCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    pub fn get(&mut self, key: &str, now: Instant) -> LocalLookup {
        match self.entries.get(key) {
            Some(entry) if now < entry.expires_at => LocalLookup::Hit(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                LocalLookup::Expired
            }
            None => LocalLookup::Missing,
        }
    }

    /// Insert or replace an entry. Returns how many other entries were dropped
    /// to stay within capacity.
    pub fn insert(
        &mut self,
        key: String,
        value: CachedValue,
        expires_at: Instant,
        now: Instant,
    ) -> usize {
        let mut dropped = 0;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity.get() {
            dropped += self.purge_expired(now);
            if self.entries.len() >= self.capacity.get() {
                dropped += self.evict_soonest_expiring();
            }
        }

        self.entries.insert(key, LocalEntry { value, expires_at });
        dropped
    }

    /// Remove `key`. Returns `false` when it was absent or already expired.
    pub fn remove(&mut self, key: &str, now: Instant) -> bool {
        self.entries
            .remove(key)
            .is_some_and(|entry| now < entry.expires_at)
    }

    /// Remove every key starting with `prefix`, returning the keys that were
    /// still live. Expired matches are purged without being reported.
    pub fn remove_prefix(&mut self, prefix: &str, now: Instant) -> Vec<String> {
        let matched: Vec<(String, bool)> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| (key.clone(), now < entry.expires_at))
            .collect();
        let mut live = Vec::with_capacity(matched.len());
        for (key, is_live) in matched {
            self.entries.remove(&key);
            if is_live {
                live.push(key);
            }
        }
        live
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        before - self.entries.len()
    }

    fn evict_soonest_expiring(&mut self) -> usize {
        let len = self.entries.len();
        let overflow = len + 1 - self.capacity.get();
        let count = (self.capacity.get() / EVICTION_DIVISOR).max(1).max(overflow);

        let mut by_expiry: Vec<(Instant, String)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.expires_at, key.clone()))
            .collect();
        by_expiry.sort_unstable();

        for (_, key) in by_expiry.into_iter().take(count) {
            self.entries.remove(&key);
        }
        len - self.entries.len()
    }
}
