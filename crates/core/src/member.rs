//! Comparable-member metadata.
//!
//! The mapping layer tells the engine *which* members of a type participate
//! in structural equality by registering a [`MemberSet`] per type. Member
//! order is declared order, and it is load-bearing: comparison, hashing, and
//! diffing all walk members in this order.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::descriptor::TypeDescriptor;
use crate::error::{EngineError, EngineResult};
use crate::value::MemberValue;

/// Accessor projecting one comparable member out of a type-erased instance.
pub type AccessorFn = dyn for<'a> Fn(&'a dyn Any) -> EngineResult<MemberValue<'a>> + Send + Sync;

/// One declared comparable member of a type: a name and an accessor.
pub struct MemberDef {
    name: &'static str,
    get: Box<AccessorFn>,
}

fn project<'a, T: 'static>(
    instance: &'a dyn Any,
    name: &'static str,
    get: for<'b> fn(&'b T) -> MemberValue<'b>,
) -> EngineResult<MemberValue<'a>> {
    let typed = instance.downcast_ref::<T>().ok_or_else(|| {
        EngineError::unsupported_shape(
            std::any::type_name::<T>(),
            format!("accessor `{name}` applied to a foreign instance"),
        )
    })?;
    Ok(get(typed))
}

impl MemberDef {
    /// Member of `T` read by a plain projection function.
    ///
    /// ```ignore
    /// MemberDef::of::<Money>("amount", |m| MemberValue::Int(m.amount))
    /// ```
    ///
    /// The stored accessor owns the downcast from `&dyn Any`; a mismatched
    /// instance surfaces as [`EngineError::UnsupportedTypeShape`] instead of
    /// a panic.
    pub fn of<T: 'static>(name: &'static str, get: for<'a> fn(&'a T) -> MemberValue<'a>) -> Self {
        Self {
            name,
            get: Box::new(move |instance| project::<T>(instance, name, get)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Project this member out of `instance`.
    pub fn read<'a>(&self, instance: &'a dyn Any) -> EngineResult<MemberValue<'a>> {
        (self.get)(instance)
    }
}

impl fmt::Debug for MemberDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDef")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered comparable members of one type.
#[derive(Debug)]
pub struct MemberSet {
    descriptor: TypeDescriptor,
    members: Vec<MemberDef>,
}

impl MemberSet {
    pub fn new(descriptor: TypeDescriptor, members: Vec<MemberDef>) -> Self {
        Self {
            descriptor,
            members,
        }
    }

    pub fn descriptor(&self) -> TypeDescriptor {
        self.descriptor
    }

    /// Members in declared order.
    pub fn members(&self) -> &[MemberDef] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Member enumeration facility, implemented by the mapping layer.
///
/// Lookups happen once per type (routine compilation is cached downstream),
/// but implementations must still be cheap and thread-safe.
pub trait MemberCatalog: Send + Sync {
    /// Ordered comparable members of `descriptor`, or `None` when the type
    /// is unknown to the mapping layer.
    fn members_of(&self, descriptor: &TypeDescriptor) -> Option<Arc<MemberSet>>;
}

/// In-memory [`MemberCatalog`] backed by a concurrent map.
///
/// Suitable both as the production catalog for mapping layers that discover
/// members eagerly at startup and as the catalog used in tests.
#[derive(Debug, Default)]
pub struct MemberRegistry {
    sets: DashMap<TypeDescriptor, Arc<MemberSet>>,
}

impl MemberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the comparable members of `T`, replacing any previous
    /// registration for the same type.
    pub fn register<T: 'static>(&self, members: Vec<MemberDef>) {
        let descriptor = TypeDescriptor::of::<T>();
        self.sets
            .insert(descriptor, Arc::new(MemberSet::new(descriptor, members)));
    }

    pub fn contains(&self, descriptor: &TypeDescriptor) -> bool {
        self.sets.contains_key(descriptor)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl MemberCatalog for MemberRegistry {
    fn members_of(&self, descriptor: &TypeDescriptor) -> Option<Arc<MemberSet>> {
        self.sets.get(descriptor).map(|entry| Arc::clone(entry.value()))
    }
}
