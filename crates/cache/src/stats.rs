//! Cache statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Internal counters, updated with relaxed atomics on the hot path.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) builds: AtomicU64,
    pub(crate) discarded_builds: AtomicU64,
    pub(crate) evictions: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time cache statistics snapshot.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Factory runs whose value was published.
    pub builds: u64,
    /// Factory runs that lost the publication race and were dropped.
    pub discarded_builds: u64,
    /// Entries removed to stay within capacity.
    pub evictions: u64,
    /// Current entry count.
    pub len: usize,
    /// Configured capacity.
    pub capacity: usize,
}

impl CacheStats {
    pub(crate) fn snapshot(counters: &Counters, len: usize, capacity: usize) -> Self {
        Self {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            builds: counters.builds.load(Ordering::Relaxed),
            discarded_builds: counters.discarded_builds.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            len,
            capacity,
        }
    }

    /// Fraction of lookups that hit, `0.0` before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
