//! Entity identity across possibly-proxied instances.

use hallmark_core::{KeyValue, TypeDescriptor};

/// Ephemeral identity reference for one entity instance.
///
/// `resolved` is derived from the live instance at construction time and is
/// never persisted; build a fresh ref per comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    key: KeyValue,
    declared: TypeDescriptor,
    resolved: TypeDescriptor,
}

impl EntityRef {
    pub(crate) fn new(key: KeyValue, declared: TypeDescriptor, resolved: TypeDescriptor) -> Self {
        Self {
            key,
            declared,
            resolved,
        }
    }

    pub fn key(&self) -> &KeyValue {
        &self.key
    }

    /// Declared (possibly proxy) type of the instance.
    pub fn declared(&self) -> TypeDescriptor {
        self.declared
    }

    /// Real type behind any proxy layers.
    pub fn resolved(&self) -> TypeDescriptor {
        self.resolved
    }

    pub fn is_assigned(&self) -> bool {
        self.key.is_assigned()
    }
}

/// Same-row test: same resolved type, both keys assigned, keys equal
/// (composite keys element-wise in declared column order).
///
/// Two unassigned keys are never the same entity, so freshly constructed,
/// never-persisted instances stay distinct.
pub fn same_entity(a: &EntityRef, b: &EntityRef) -> bool {
    a.resolved == b.resolved && a.key.is_assigned() && b.key.is_assigned() && a.key == b.key
}
