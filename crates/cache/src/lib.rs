//! `hallmark-cache` — bounded concurrent caches keyed by type descriptor.

pub mod stats;
pub mod type_key_cache;

pub use stats::CacheStats;
pub use type_key_cache::{DEFAULT_CAPACITY, TypeKeyCache};


