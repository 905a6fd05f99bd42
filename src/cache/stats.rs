//! Usage counters for the tiered store.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use serde::Serialize;

pub(crate) const METRIC_REMOTE_HIT: &str = "catalog_cache_remote_hit_total";
pub(crate) const METRIC_LOCAL_HIT: &str = "catalog_cache_local_hit_total";
pub(crate) const METRIC_MISS: &str = "catalog_cache_miss_total";
pub(crate) const METRIC_LOCAL_EVICT: &str = "catalog_cache_local_evict_total";
pub(crate) const METRIC_REMOTE_ERROR: &str = "catalog_cache_remote_error_total";

/// Point-in-time view of store usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub remote_hits: u64,
    pub local_hits: u64,
    pub misses: u64,
    pub total_operations: u64,
    pub hit_ratio: f64,
    pub remote_available: bool,
    pub local_entries: usize,
}

/// Monotonic counters shared by every operation of one store.
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    remote_hits: AtomicU64,
    local_hits: AtomicU64,
    misses: AtomicU64,
    operations: AtomicU64,
}

impl CacheCounters {
    pub(crate) fn operation(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn remote_hit(&self) {
        self.remote_hits.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_REMOTE_HIT).increment(1);
    }

    pub(crate) fn local_hit(&self) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_LOCAL_HIT).increment(1);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_MISS).increment(1);
    }

    pub(crate) fn snapshot(&self, remote_available: bool, local_entries: usize) -> CacheStats {
        let remote_hits = self.remote_hits.load(Ordering::Relaxed);
        let local_hits = self.local_hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let hits = remote_hits + local_hits;
        let lookups = hits + misses;

        CacheStats {
            hits,
            remote_hits,
            local_hits,
            misses,
            total_operations: self.operations.load(Ordering::Relaxed),
            hit_ratio: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            remote_available,
            local_entries,
        }
    }
}
