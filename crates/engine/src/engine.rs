//! The equality engine facade.
//!
//! Explicitly constructed and dependency-injected: callers hand over a
//! [`MemberCatalog`] and a [`ProxyConvention`] and get a self-contained
//! engine with its own pair of bounded caches. Nothing here is a global;
//! making one engine process-wide is the caller's deployment choice.

use std::num::NonZeroUsize;
use std::sync::Arc;

use hallmark_cache::{CacheStats, DEFAULT_CAPACITY, TypeKeyCache};
use hallmark_core::{
    Described, EngineError, EngineResult, KeyValue, MemberCatalog, ProxyConvention, TypeDescriptor,
};

use crate::compiler::{CompiledRoutine, EqualityCompiler, RoutineSource};
use crate::identity::{self, EntityRef};
use crate::resolver::{DEFAULT_MAX_DEPTH, ProxyResolver};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of the compiled-routine cache.
    pub routine_cache_capacity: NonZeroUsize,
    /// Capacity of the proxy-resolution memo.
    pub proxy_cache_capacity: NonZeroUsize,
    /// Proxy unwrap-depth cap.
    pub max_proxy_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            routine_cache_capacity: DEFAULT_CAPACITY,
            proxy_cache_capacity: DEFAULT_CAPACITY,
            max_proxy_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EngineConfig {
    pub fn with_routine_cache_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.routine_cache_capacity = capacity;
        self
    }

    pub fn with_proxy_cache_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.proxy_cache_capacity = capacity;
        self
    }

    pub fn with_max_proxy_depth(mut self, depth: usize) -> Self {
        self.max_proxy_depth = depth;
        self
    }
}

/// Snapshot of both engine caches.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineCacheStats {
    pub routines: CacheStats,
    pub proxies: CacheStats,
}

/// Structural equality, hashing, and identity over registered domain types.
pub struct EqualityEngine {
    resolver: ProxyResolver,
    compiler: EqualityCompiler,
    routines: TypeKeyCache<CompiledRoutine>,
}

impl EqualityEngine {
    pub fn new(
        catalog: Arc<dyn MemberCatalog>,
        convention: Arc<dyn ProxyConvention>,
        config: EngineConfig,
    ) -> Self {
        Self {
            resolver: ProxyResolver::new(
                convention,
                config.proxy_cache_capacity,
                config.max_proxy_depth,
            ),
            compiler: EqualityCompiler::new(catalog),
            routines: TypeKeyCache::new(config.routine_cache_capacity),
        }
    }

    /// Real (non-proxy) type of `instance`.
    pub fn resolve_real_type(&self, instance: &dyn Described) -> EngineResult<TypeDescriptor> {
        self.resolver.resolve_instance(instance)
    }

    /// Member-wise structural equality.
    ///
    /// Instances whose resolved types differ compare unequal; that is an
    /// answer, not an error. Errors mean the comparison is *indeterminate*
    /// (unknown type, accessor mismatch) and must not be read as unequal.
    pub fn structural_equals(
        &self,
        a: &dyn Described,
        b: &dyn Described,
    ) -> EngineResult<bool> {
        let ra = self.cached_routine(&a.descriptor())?;
        let rb = self.cached_routine(&b.descriptor())?;
        if ra.resolved() != rb.resolved() {
            return Ok(false);
        }
        ra.structural_eq(self, a.as_any(), &rb, b.as_any())
    }

    /// Order-sensitive structural hash, equal for structurally equal
    /// instances (proxied or not).
    pub fn structural_hash(&self, instance: &dyn Described) -> EngineResult<u64> {
        let routine = self.cached_routine(&instance.descriptor())?;
        routine.structural_hash(self, instance.as_any())
    }

    /// Identity reference for `instance` under `key`.
    pub fn entity_ref(&self, instance: &dyn Described, key: KeyValue) -> EngineResult<EntityRef> {
        let declared = instance.descriptor();
        let resolved = self.resolver.resolve(declared)?;
        Ok(EntityRef::new(key, declared, resolved))
    }

    /// Whether two references denote the same persisted entity.
    pub fn same_entity(&self, a: &EntityRef, b: &EntityRef) -> bool {
        identity::same_entity(a, b)
    }

    /// Entries currently in the compiled-routine cache.
    pub fn cache_size(&self) -> usize {
        self.routines.len()
    }

    /// Capacity of the compiled-routine cache.
    pub fn cache_capacity(&self) -> usize {
        self.routines.capacity().get()
    }

    pub fn cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            routines: self.routines.stats(),
            proxies: self.resolver.cache_stats(),
        }
    }

    /// Eagerly compile routines for `types`, e.g. at process startup.
    ///
    /// Stops at the first failure, reported as [`EngineError::CacheBuild`]
    /// naming the offending type; already-built routines stay cached.
    pub fn warm_up(&self, types: &[TypeDescriptor]) -> EngineResult<()> {
        for descriptor in types {
            self.cached_routine(descriptor).map_err(|err| match err {
                already @ EngineError::CacheBuild { .. } => already,
                other => EngineError::cache_build(descriptor.name(), other.to_string()),
            })?;
        }
        Ok(())
    }

    fn cached_routine(&self, declared: &TypeDescriptor) -> EngineResult<Arc<CompiledRoutine>> {
        self.routines.get_or_try_insert_with(declared, || {
            let resolved = self.resolver.resolve(*declared)?;
            self.compiler.compile(*declared, resolved)
        })
    }
}

impl RoutineSource for EqualityEngine {
    fn routine_for(&self, declared: &TypeDescriptor) -> EngineResult<Arc<CompiledRoutine>> {
        self.cached_routine(declared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use hallmark_core::{MemberDef, MemberRegistry, MemberValue, ProxyRegistry};

    #[derive(Debug, Clone, PartialEq)]
    struct Money {
        amount: i64,
        currency: String,
    }

    #[derive(Debug)]
    struct MoneyProxy {
        inner: Money,
    }

    #[derive(Debug)]
    struct Customer {
        name: String,
        balance: Money,
    }

    #[derive(Debug)]
    struct CustomerProxy {
        inner: Customer,
    }

    #[derive(Debug)]
    struct LopsidedProxy {
        inner: Customer,
    }

    hallmark_core::describe!(Money, MoneyProxy, Customer, CustomerProxy, LopsidedProxy);

    fn money(amount: i64, currency: &str) -> Money {
        Money {
            amount,
            currency: currency.to_owned(),
        }
    }

    fn customer(name: &str, balance: Money) -> Customer {
        Customer {
            name: name.to_owned(),
            balance,
        }
    }

    fn test_catalog() -> Arc<MemberRegistry> {
        let registry = MemberRegistry::new();
        registry.register::<Money>(vec![
            MemberDef::of::<Money>("amount", |m| MemberValue::Int(m.amount)),
            MemberDef::of::<Money>("currency", |m| MemberValue::Str(&m.currency)),
        ]);
        registry.register::<MoneyProxy>(vec![
            MemberDef::of::<MoneyProxy>("amount", |m| MemberValue::Int(m.inner.amount)),
            MemberDef::of::<MoneyProxy>("currency", |m| MemberValue::Str(&m.inner.currency)),
        ]);
        registry.register::<Customer>(vec![
            MemberDef::of::<Customer>("name", |c| MemberValue::Str(&c.name)),
            MemberDef::of::<Customer>("balance", |c| MemberValue::Nested(&c.balance)),
        ]);
        registry.register::<CustomerProxy>(vec![
            MemberDef::of::<CustomerProxy>("name", |c| MemberValue::Str(&c.inner.name)),
            MemberDef::of::<CustomerProxy>("balance", |c| MemberValue::Nested(&c.inner.balance)),
        ]);
        // Deliberately missing the balance member.
        registry.register::<LopsidedProxy>(vec![MemberDef::of::<LopsidedProxy>("name", |c| {
            MemberValue::Str(&c.inner.name)
        })]);
        Arc::new(registry)
    }

    fn test_convention() -> Arc<ProxyRegistry> {
        let registry = ProxyRegistry::new();
        registry.register::<MoneyProxy, Money>();
        registry.register::<CustomerProxy, Customer>();
        registry.register::<LopsidedProxy, Customer>();
        Arc::new(registry)
    }

    fn test_engine() -> EqualityEngine {
        EqualityEngine::new(test_catalog(), test_convention(), EngineConfig::default())
    }

    #[test]
    fn money_with_same_members_is_structurally_equal() {
        let engine = test_engine();
        let a = money(10, "USD");
        let b = money(10, "USD");
        let c = money(10, "EUR");

        assert!(engine.structural_equals(&a, &b).unwrap());
        assert!(!engine.structural_equals(&a, &c).unwrap());
        assert_eq!(
            engine.structural_hash(&a).unwrap(),
            engine.structural_hash(&b).unwrap()
        );
    }

    #[test]
    fn different_real_types_compare_unequal_without_error() {
        let engine = test_engine();
        let m = money(10, "USD");
        let c = customer("Ada", money(10, "USD"));
        assert!(!engine.structural_equals(&m, &c).unwrap());
    }

    #[test]
    fn proxy_is_transparent_for_equality_and_hash() {
        let engine = test_engine();
        let plain = customer("Ada", money(10, "USD"));
        let proxied = CustomerProxy {
            inner: customer("Ada", money(10, "USD")),
        };

        assert_eq!(
            engine.resolve_real_type(&proxied).unwrap(),
            TypeDescriptor::of::<Customer>()
        );
        assert!(engine.structural_equals(&proxied, &plain).unwrap());
        assert!(engine.structural_equals(&plain, &proxied).unwrap());
        assert_eq!(
            engine.structural_hash(&proxied).unwrap(),
            engine.structural_hash(&plain).unwrap()
        );
    }

    #[test]
    fn proxied_nested_member_is_transparent_too() {
        let engine = test_engine();
        let plain = customer("Ada", money(10, "USD"));
        let changed = customer("Ada", money(11, "USD"));

        assert!(!engine.structural_equals(&plain, &changed).unwrap());
    }

    #[test]
    fn inconsistent_proxy_registration_is_an_error() {
        let engine = test_engine();
        let plain = customer("Ada", money(10, "USD"));
        let lopsided = LopsidedProxy {
            inner: customer("Ada", money(10, "USD")),
        };

        let err = engine.structural_equals(&lopsided, &plain).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedTypeShape { .. }));
    }

    #[test]
    fn unregistered_type_is_indeterminate_not_unequal() {
        #[derive(Debug)]
        struct Stranger;
        hallmark_core::describe!(Stranger);

        let engine = test_engine();
        let err = engine.structural_equals(&Stranger, &Stranger).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedTypeShape { .. }));
    }

    #[test]
    fn cyclic_proxy_convention_surfaces_resolution_error() {
        let convention = ProxyRegistry::new();
        convention.register::<Money, Money>();

        let engine = EqualityEngine::new(
            test_catalog(),
            Arc::new(convention),
            EngineConfig::default().with_max_proxy_depth(2),
        );

        let err = engine.structural_hash(&money(1, "USD")).unwrap_err();
        assert!(matches!(err, EngineError::TypeResolution { .. }));
    }

    #[test]
    fn warm_up_precompiles_routines() {
        let engine = test_engine();
        assert_eq!(engine.cache_size(), 0);

        engine
            .warm_up(&[
                TypeDescriptor::of::<Money>(),
                TypeDescriptor::of::<Customer>(),
            ])
            .unwrap();

        assert_eq!(engine.cache_size(), 2);
        assert_eq!(engine.cache_stats().routines.builds, 2);
    }

    #[test]
    fn warm_up_reports_offending_type() {
        #[derive(Debug)]
        struct Stranger;

        let engine = test_engine();
        let err = engine
            .warm_up(&[TypeDescriptor::of::<Stranger>()])
            .unwrap_err();
        match err {
            EngineError::CacheBuild { type_name, .. } => {
                assert!(type_name.ends_with("Stranger"));
            }
            other => panic!("expected CacheBuild, got {other:?}"),
        }
    }

    #[test]
    fn routine_cache_respects_its_bound() {
        let config =
            EngineConfig::default().with_routine_cache_capacity(NonZeroUsize::new(2).unwrap());
        let engine = EqualityEngine::new(test_catalog(), test_convention(), config);

        let a = money(1, "USD");
        let b = customer("Ada", money(1, "USD"));
        let proxied = MoneyProxy {
            inner: money(1, "USD"),
        };

        engine.structural_hash(&a).unwrap();
        engine.structural_hash(&b).unwrap();
        engine.structural_hash(&proxied).unwrap();

        assert!(engine.cache_size() <= engine.cache_capacity());
        assert_eq!(engine.cache_capacity(), 2);
    }

    #[test]
    fn entity_refs_with_same_key_and_resolved_type_match() {
        let engine = test_engine();
        let plain = customer("Ada", money(10, "USD"));
        let proxied = CustomerProxy {
            inner: customer("Ada", money(0, "EUR")),
        };

        let a = engine.entity_ref(&plain, KeyValue::int(7)).unwrap();
        let b = engine.entity_ref(&proxied, KeyValue::int(7)).unwrap();
        assert!(engine.same_entity(&a, &b));
        assert_eq!(a.resolved(), b.resolved());
        assert_ne!(a.declared(), b.declared());
    }

    #[test]
    fn unassigned_entity_refs_never_match() {
        let engine = test_engine();
        let fresh_a = customer("Ada", money(1, "USD"));
        let fresh_b = customer("Ada", money(1, "USD"));

        let a = engine.entity_ref(&fresh_a, KeyValue::int(0)).unwrap();
        let b = engine.entity_ref(&fresh_b, KeyValue::int(0)).unwrap();
        assert!(!engine.same_entity(&a, &b));
    }

    #[test]
    fn engine_is_usable_across_threads() {
        let engine = Arc::new(test_engine());

        std::thread::scope(|scope| {
            for i in 0..4i64 {
                let engine = Arc::clone(&engine);
                scope.spawn(move || {
                    let a = money(i, "USD");
                    let b = money(i, "USD");
                    assert!(engine.structural_equals(&a, &b).unwrap());
                });
            }
        });

        assert_eq!(engine.cache_stats().routines.builds, 1);
    }

    fn money_strategy() -> impl Strategy<Value = Money> {
        (any::<i64>(), "[A-Z]{3}").prop_map(|(amount, currency)| Money { amount, currency })
    }

    /// Tiny domain so generated values collide often enough to exercise the
    /// equal branches of the laws.
    fn colliding_money_strategy() -> impl Strategy<Value = Money> {
        (0i64..3, prop::sample::select(vec!["USD", "EUR"]))
            .prop_map(|(amount, currency)| money(amount, currency))
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        #[test]
        fn prop_equality_is_reflexive(m in money_strategy()) {
            let engine = test_engine();
            prop_assert!(engine.structural_equals(&m, &m).unwrap());
        }

        #[test]
        fn prop_equality_is_symmetric(a in money_strategy(), b in money_strategy()) {
            let engine = test_engine();
            prop_assert_eq!(
                engine.structural_equals(&a, &b).unwrap(),
                engine.structural_equals(&b, &a).unwrap()
            );
        }

        #[test]
        fn prop_equality_is_transitive(
            a in colliding_money_strategy(),
            b in colliding_money_strategy(),
            c in colliding_money_strategy(),
        ) {
            let engine = test_engine();
            if engine.structural_equals(&a, &b).unwrap()
                && engine.structural_equals(&b, &c).unwrap()
            {
                prop_assert!(engine.structural_equals(&a, &c).unwrap());
            }
        }

        #[test]
        fn prop_equal_values_hash_equal(a in colliding_money_strategy(), b in colliding_money_strategy()) {
            let engine = test_engine();
            if engine.structural_equals(&a, &b).unwrap() {
                prop_assert_eq!(
                    engine.structural_hash(&a).unwrap(),
                    engine.structural_hash(&b).unwrap()
                );
            }
        }

        #[test]
        fn prop_proxy_wrapping_preserves_equality(m in money_strategy()) {
            let engine = test_engine();
            let wrapped = MoneyProxy { inner: m.clone() };
            prop_assert!(engine.structural_equals(&wrapped, &m).unwrap());
            prop_assert_eq!(
                engine.structural_hash(&wrapped).unwrap(),
                engine.structural_hash(&m).unwrap()
            );
        }

        #[test]
        fn prop_cache_never_exceeds_capacity(amounts in prop::collection::vec(any::<i64>(), 1..32)) {
            let config = EngineConfig::default()
                .with_routine_cache_capacity(NonZeroUsize::new(2).unwrap());
            let engine = EqualityEngine::new(test_catalog(), test_convention(), config);

            // Rotate through three declared types so the cache churns.
            for (idx, amount) in amounts.into_iter().enumerate() {
                match idx % 3 {
                    0 => {
                        engine.structural_hash(&money(amount, "USD")).unwrap();
                    }
                    1 => {
                        engine
                            .structural_hash(&customer("Ada", money(amount, "USD")))
                            .unwrap();
                    }
                    _ => {
                        engine
                            .structural_hash(&MoneyProxy {
                                inner: money(amount, "USD"),
                            })
                            .unwrap();
                    }
                }
                prop_assert!(engine.cache_size() <= engine.cache_capacity());
            }
        }
    }
}


