//! Proxy-type detection seam.
//!
//! Lazy-loading mapping layers hand out generated wrapper types instead of
//! the domain types they stand in for. The engine stays ignorant of any
//! particular generation scheme; it only asks a [`ProxyConvention`] to peel
//! one layer at a time.

use dashmap::DashMap;

use crate::descriptor::TypeDescriptor;

/// One-step proxy unwrapping, supplied by the mapping layer.
pub trait ProxyConvention: Send + Sync {
    /// If `descriptor` names a generated proxy type, the type it wraps;
    /// `None` for ordinary domain types.
    ///
    /// Implementations peel exactly one layer. The resolver drives repeated
    /// unwrapping and enforces the depth cap, so a convention never needs
    /// loop protection of its own.
    fn unwrap_proxy(&self, descriptor: &TypeDescriptor) -> Option<TypeDescriptor>;
}

/// Convention for mapping layers that never generate proxies.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProxies;

impl ProxyConvention for NoProxies {
    fn unwrap_proxy(&self, _descriptor: &TypeDescriptor) -> Option<TypeDescriptor> {
        None
    }
}

/// Explicit proxy-to-real table.
///
/// Mapping layers that know their generated types up front register each
/// pair here; lookups are lock-free reads on a sharded map.
#[derive(Debug, Default)]
pub struct ProxyRegistry {
    table: DashMap<TypeDescriptor, TypeDescriptor>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `Proxy` a generated wrapper over `Real`.
    pub fn register<Proxy: 'static, Real: 'static>(&self) {
        self.table
            .insert(TypeDescriptor::of::<Proxy>(), TypeDescriptor::of::<Real>());
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl ProxyConvention for ProxyRegistry {
    fn unwrap_proxy(&self, descriptor: &TypeDescriptor) -> Option<TypeDescriptor> {
        self.table.get(descriptor).map(|entry| *entry.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Customer;
    struct CustomerProxy;
    struct CustomerProxyProxy;

    #[test]
    fn no_proxies_never_unwraps() {
        let convention = NoProxies;
        assert!(convention
            .unwrap_proxy(&TypeDescriptor::of::<CustomerProxy>())
            .is_none());
    }

    #[test]
    fn registry_unwraps_one_layer_at_a_time() {
        let registry = ProxyRegistry::new();
        registry.register::<CustomerProxy, Customer>();
        registry.register::<CustomerProxyProxy, CustomerProxy>();

        let first = registry
            .unwrap_proxy(&TypeDescriptor::of::<CustomerProxyProxy>())
            .expect("outer layer");
        assert_eq!(first, TypeDescriptor::of::<CustomerProxy>());

        let second = registry.unwrap_proxy(&first).expect("inner layer");
        assert_eq!(second, TypeDescriptor::of::<Customer>());

        assert!(registry.unwrap_proxy(&second).is_none());
    }

    #[test]
    fn unknown_types_are_not_proxies() {
        let registry = ProxyRegistry::new();
        assert!(registry
            .unwrap_proxy(&TypeDescriptor::of::<Customer>())
            .is_none());
    }
}


