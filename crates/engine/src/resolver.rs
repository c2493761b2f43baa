//! Proxy-type resolution with per-type memoization.
//!
//! The proxy/real relationship is a property of the *type*, not of any
//! particular instance, so results are memoized in a bounded cache keyed by
//! the declared descriptor. After the first resolution of a declared type,
//! every later call is a single cache read.

use std::num::NonZeroUsize;
use std::sync::Arc;

use hallmark_cache::TypeKeyCache;
use hallmark_core::{Described, EngineError, EngineResult, ProxyConvention, TypeDescriptor};

/// Unwrap-depth cap applied when no explicit depth is configured.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Resolves declared (possibly proxy) types to real domain types.
pub struct ProxyResolver {
    convention: Arc<dyn ProxyConvention>,
    memo: TypeKeyCache<TypeDescriptor>,
    max_depth: usize,
}

impl ProxyResolver {
    pub fn new(
        convention: Arc<dyn ProxyConvention>,
        cache_capacity: NonZeroUsize,
        max_depth: usize,
    ) -> Self {
        Self {
            convention,
            memo: TypeKeyCache::new(cache_capacity),
            max_depth,
        }
    }

    /// Real (non-proxy) type behind `declared`.
    ///
    /// Unwraps one convention layer at a time until the convention reports a
    /// terminal type. A chain still unwrapping after `max_depth` steps fails
    /// with [`EngineError::TypeResolution`]; self-referential conventions hit
    /// the cap instead of looping.
    pub fn resolve(&self, declared: TypeDescriptor) -> EngineResult<TypeDescriptor> {
        let resolved = self
            .memo
            .get_or_try_insert_with(&declared, || self.unwrap_chain(declared))?;
        Ok(*resolved)
    }

    /// Instance-facing form of [`ProxyResolver::resolve`].
    pub fn resolve_instance(&self, instance: &dyn Described) -> EngineResult<TypeDescriptor> {
        self.resolve(instance.descriptor())
    }

    pub fn cache_stats(&self) -> hallmark_cache::CacheStats {
        self.memo.stats()
    }

    fn unwrap_chain(&self, declared: TypeDescriptor) -> EngineResult<TypeDescriptor> {
        let mut current = declared;
        for _ in 0..self.max_depth {
            match self.convention.unwrap_proxy(&current) {
                Some(next) => current = next,
                None => return Ok(current),
            }
        }
        if self.convention.unwrap_proxy(&current).is_none() {
            Ok(current)
        } else {
            Err(EngineError::type_resolution(declared.name(), self.max_depth))
        }
    }
}
