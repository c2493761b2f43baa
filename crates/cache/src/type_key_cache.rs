//! Bounded concurrent cache keyed by type descriptor.
//!
//! Both engine caches (compiled routines, proxy resolutions) are instances
//! of [`TypeKeyCache`]. The access pattern is extremely read-heavy: after
//! warm-up virtually every call is a lookup of an already-cached type, so
//! reads go through sharded map reads and never take the writer lock.
//!
//! ## Population protocol
//!
//! `get_or_try_insert_with` runs the factory **outside** all locks, so a
//! slow build never stalls readers or other writers. Concurrent misses on
//! the same type may each run their factory; the writer lock then decides a
//! single winner, and losing builds are dropped. Callers therefore get one
//! canonical `Arc` per type, and factories must tolerate being run more than
//! once for the same input.
//!
//! ## Eviction
//!
//! Strict least-recently-used over a fixed capacity. Recency is a per-slot
//! tick from a cache-wide logical clock, refreshed on every hit and insert;
//! eviction scans for the minimum tick under the writer lock. Evicted values
//! stay alive for as long as callers hold their `Arc` handles.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use hallmark_core::{EngineResult, TypeDescriptor};

use crate::stats::{CacheStats, Counters};

/// Default capacity used by [`Default`].
pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(capacity) => capacity,
    None => panic!("default capacity is non-zero"),
};

struct CacheSlot<V> {
    value: Arc<V>,
    last_touched: AtomicU64,
}

/// Bounded concurrent map from [`TypeDescriptor`] to `Arc<V>`.
pub struct TypeKeyCache<V> {
    slots: DashMap<TypeDescriptor, CacheSlot<V>>,
    capacity: NonZeroUsize,
    clock: AtomicU64,
    writer: Mutex<()>,
    counters: Counters,
}

impl<V> TypeKeyCache<V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: DashMap::new(),
            capacity,
            clock: AtomicU64::new(0),
            writer: Mutex::new(()),
            counters: Counters::default(),
        }
    }

    /// Cached value for `descriptor`, refreshing its recency.
    pub fn get(&self, descriptor: &TypeDescriptor) -> Option<Arc<V>> {
        match self.slots.get(descriptor) {
            Some(slot) => {
                slot.last_touched.store(self.tick(), Ordering::Relaxed);
                Counters::bump(&self.counters.hits);
                Some(Arc::clone(&slot.value))
            }
            None => {
                Counters::bump(&self.counters.misses);
                None
            }
        }
    }

    /// Cached value for `descriptor`, building and publishing it on a miss.
    ///
    /// The factory runs without any cache lock held. If a racing caller
    /// publishes first, that caller's value is returned and this build is
    /// dropped. A factory error is returned unchanged and leaves the cache
    /// untouched.
    pub fn get_or_try_insert_with<F>(
        &self,
        descriptor: &TypeDescriptor,
        factory: F,
    ) -> EngineResult<Arc<V>>
    where
        F: FnOnce() -> EngineResult<V>,
    {
        if let Some(value) = self.get(descriptor) {
            return Ok(value);
        }

        let candidate = Arc::new(factory()?);

        let _guard = self.writer.lock();
        if let Some(slot) = self.slots.get(descriptor) {
            // Lost the race: adopt the published value.
            slot.last_touched.store(self.tick(), Ordering::Relaxed);
            let winner = Arc::clone(&slot.value);
            drop(slot);
            Counters::bump(&self.counters.discarded_builds);
            return Ok(winner);
        }

        while self.slots.len() >= self.capacity.get() {
            if !self.evict_lru() {
                break;
            }
        }

        self.slots.insert(
            *descriptor,
            CacheSlot {
                value: Arc::clone(&candidate),
                last_touched: AtomicU64::new(self.tick()),
            },
        );
        Counters::bump(&self.counters.builds);
        Ok(candidate)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats::snapshot(&self.counters, self.len(), self.capacity.get())
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Remove the entry with the smallest recency tick. Caller holds the
    /// writer lock; no slot reference may be live across the removal.
    fn evict_lru(&self) -> bool {
        let mut victim: Option<(TypeDescriptor, u64)> = None;
        for entry in self.slots.iter() {
            let touched = entry.last_touched.load(Ordering::Relaxed);
            match victim {
                Some((_, oldest)) if touched >= oldest => {}
                _ => victim = Some((*entry.key(), touched)),
            }
        }

        match victim {
            Some((key, _)) => {
                let removed = self.slots.remove(&key).is_some();
                if removed {
                    Counters::bump(&self.counters.evictions);
                    debug!(evicted = %key, "cache at capacity, dropped least recently used entry");
                }
                removed
            }
            None => false,
        }
    }
}

impl<V> Default for TypeKeyCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<V> fmt::Debug for TypeKeyCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeKeyCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
