//! One-time compilation of structural equality and hash routines.
//!
//! Walking a catalog per comparison would pay a metadata lookup on every
//! call. Instead the compiler assembles, once per declared type, an
//! immutable [`CompiledRoutine`]: the ordered accessor list, the resolved
//! type it answers for, and boxed eq/hash closures over that list. Routines
//! are installed in the engine's cache and shared as `Arc` across threads.
//!
//! ## Proxies
//!
//! Routines are keyed by **declared** type: a generated proxy type gets its
//! own routine whose accessors read through the wrapper, while its hash is
//! seeded with the **resolved** type's name. Equal member values therefore
//! produce equal results whether an instance is proxied or not. The catalog
//! must know every declared type it is asked about, generated proxy types
//! included.
//!
//! ## Nested members
//!
//! A [`MemberValue::Nested`] member recurses through the routine of the
//! nested instance's own declared type, fetched from the cache *at call
//! time* via [`RoutineSource`]. Nothing holds a lock while user accessors
//! run, and routines never hold references to each other.

use std::any::Any;
use std::fmt;
use std::hash::{DefaultHasher, Hasher};
use std::sync::Arc;

use tracing::warn;

use hallmark_core::{
    Described, EngineError, EngineResult, FieldValue, MemberCatalog, MemberSet, MemberValue,
    TypeDescriptor,
};

/// Call-time supplier of routines for nested members.
///
/// Implemented by the engine facade; separated out so routines stay free of
/// any back-reference to the cache that owns them.
pub trait RoutineSource: Send + Sync {
    /// Routine for an instance's declared type, compiling on first use.
    fn routine_for(&self, declared: &TypeDescriptor) -> EngineResult<Arc<CompiledRoutine>>;
}

type EqFn =
    dyn Fn(&dyn RoutineSource, &dyn Any, &MemberSet, &dyn Any) -> EngineResult<bool> + Send + Sync;
type HashFn = dyn Fn(&dyn RoutineSource, &dyn Any) -> EngineResult<u64> + Send + Sync;

/// Immutable compiled equality/hash routine for one declared type.
pub struct CompiledRoutine {
    declared: TypeDescriptor,
    resolved: TypeDescriptor,
    members: Arc<MemberSet>,
    degenerate: bool,
    eq: Box<EqFn>,
    hash: Box<HashFn>,
}

impl CompiledRoutine {
    pub fn declared(&self) -> TypeDescriptor {
        self.declared
    }

    /// Real type this routine answers equality for.
    pub fn resolved(&self) -> TypeDescriptor {
        self.resolved
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// True for zero-member types, whose instances all compare equal.
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// Declared member names in comparison order.
    pub fn member_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.members.members().iter().map(|m| m.name())
    }

    /// Read the `index`-th declared member of `instance`.
    pub fn read_member<'a>(
        &self,
        index: usize,
        instance: &'a dyn Any,
    ) -> EngineResult<MemberValue<'a>> {
        let member = self.members.members().get(index).ok_or_else(|| {
            EngineError::unsupported_shape(
                self.declared.name(),
                format!("member index {index} out of range"),
            )
        })?;
        member.read(instance)
    }

    pub(crate) fn member_set(&self) -> &MemberSet {
        &self.members
    }

    /// Member-wise equality of `a` (read through this routine) against `b`
    /// (read through `other`). Callers must already have checked that both
    /// routines resolve to the same real type.
    pub fn structural_eq(
        &self,
        source: &dyn RoutineSource,
        a: &dyn Any,
        other: &CompiledRoutine,
        b: &dyn Any,
    ) -> EngineResult<bool> {
        (self.eq)(source, a, other.member_set(), b)
    }

    /// Order-sensitive structural hash of `instance`.
    pub fn structural_hash(&self, source: &dyn RoutineSource, instance: &dyn Any) -> EngineResult<u64> {
        (self.hash)(source, instance)
    }
}

impl fmt::Debug for CompiledRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoutine")
            .field("declared", &self.declared)
            .field("resolved", &self.resolved)
            .field("members", &self.member_count())
            .field("degenerate", &self.degenerate)
            .finish_non_exhaustive()
    }
}

/// Builds [`CompiledRoutine`]s from catalog registrations.
pub struct EqualityCompiler {
    catalog: Arc<dyn MemberCatalog>,
}

impl EqualityCompiler {
    pub fn new(catalog: Arc<dyn MemberCatalog>) -> Self {
        Self { catalog }
    }

    /// Compile the routine for `declared`, whose real type is `resolved`.
    ///
    /// A type the catalog does not know fails with
    /// [`EngineError::UnsupportedTypeShape`]. A type with zero declared
    /// members compiles to an always-equal / zero-hash routine and is
    /// reported once through `tracing::warn!`.
    pub fn compile(
        &self,
        declared: TypeDescriptor,
        resolved: TypeDescriptor,
    ) -> EngineResult<CompiledRoutine> {
        let members = self.catalog.members_of(&declared).ok_or_else(|| {
            EngineError::unsupported_shape(declared.name(), "no comparable members registered")
        })?;

        let degenerate = members.is_empty();
        if degenerate {
            warn!(
                type_name = declared.name(),
                "type declares no comparable members; all instances compare equal"
            );
        }

        let eq = build_eq(Arc::clone(&members));
        let hash = build_hash(Arc::clone(&members), resolved, degenerate);

        Ok(CompiledRoutine {
            declared,
            resolved,
            members,
            degenerate,
            eq,
            hash,
        })
    }
}

fn build_eq(members: Arc<MemberSet>) -> Box<EqFn> {
    Box::new(move |source, a, other_members, b| {
        if members.len() != other_members.len() {
            return Err(EngineError::unsupported_shape(
                members.descriptor().name(),
                format!(
                    "member count differs from {} ({} vs {})",
                    other_members.descriptor().name(),
                    members.len(),
                    other_members.len()
                ),
            ));
        }

        for (mine, theirs) in members.members().iter().zip(other_members.members()) {
            let va = mine.read(a)?;
            let vb = theirs.read(b)?;
            if !member_values_equal(source, &va, &vb)? {
                return Ok(false);
            }
        }
        Ok(true)
    })
}

fn build_hash(members: Arc<MemberSet>, resolved: TypeDescriptor, degenerate: bool) -> Box<HashFn> {
    Box::new(move |source, instance| {
        if degenerate {
            return Ok(0);
        }

        let mut hasher = DefaultHasher::new();
        hasher.write(resolved.name().as_bytes());
        for member in members.members() {
            let value = member.read(instance)?;
            hash_value(source, &mut hasher, &value)?;
        }
        Ok(hasher.finish())
    })
}

/// Per-member equality, shared by compiled routines and the snapshot
/// differ. Null equals only null at the same position; values of different
/// non-null kinds are unequal without coercion; floats use native `==`
/// (`-0.0 == 0.0`, `NaN != NaN`).
pub fn member_values_equal(
    source: &dyn RoutineSource,
    a: &MemberValue<'_>,
    b: &MemberValue<'_>,
) -> EngineResult<bool> {
    use MemberValue::*;

    Ok(match (a, b) {
        (Null, Null) => true,
        (Bool(x), Bool(y)) => x == y,
        (Int(x), Int(y)) => x == y,
        (UInt(x), UInt(y)) => x == y,
        (Float(x), Float(y)) => x == y,
        (Str(x), Str(y)) => x == y,
        (Bytes(x), Bytes(y)) => x == y,
        (Uuid(x), Uuid(y)) => x == y,
        (Timestamp(x), Timestamp(y)) => x == y,
        (Nested(x), Nested(y)) => nested_equal(source, *x, *y)?,
        _ => false,
    })
}

fn nested_equal(
    source: &dyn RoutineSource,
    a: &dyn Described,
    b: &dyn Described,
) -> EngineResult<bool> {
    let ra = source.routine_for(&a.descriptor())?;
    let rb = source.routine_for(&b.descriptor())?;
    if ra.resolved() != rb.resolved() {
        return Ok(false);
    }
    ra.structural_eq(source, a.as_any(), &rb, b.as_any())
}

/// Owned snapshot of a member value. Nested value objects flatten to
/// [`FieldValue::Composite`] holding their member snapshots in declared
/// order, recursing through the nested type's own routine.
pub fn snapshot_value(
    source: &dyn RoutineSource,
    value: &MemberValue<'_>,
) -> EngineResult<FieldValue> {
    if let MemberValue::Nested(nested) = value {
        let routine = source.routine_for(&nested.descriptor())?;
        let mut parts = Vec::with_capacity(routine.member_count());
        for index in 0..routine.member_count() {
            let member_value = routine.read_member(index, nested.as_any())?;
            parts.push(snapshot_value(source, &member_value)?);
        }
        return Ok(FieldValue::Composite(parts));
    }

    // `to_owned_scalar` covers every non-nested kind.
    match value.to_owned_scalar() {
        Some(owned) => Ok(owned),
        None => Err(EngineError::unsupported_shape(
            "member value",
            "value kind has no owned snapshot form",
        )),
    }
}

/// Order-sensitive combine: kind byte then payload per member; `-0.0`
/// normalized so the hash law holds; nested members contribute their own
/// routine's hash.
fn hash_value(
    source: &dyn RoutineSource,
    hasher: &mut DefaultHasher,
    value: &MemberValue<'_>,
) -> EngineResult<()> {
    hasher.write_u8(value.kind().tag());
    match value {
        MemberValue::Null => {}
        MemberValue::Bool(v) => hasher.write_u8(*v as u8),
        MemberValue::Int(v) => hasher.write_i64(*v),
        MemberValue::UInt(v) => hasher.write_u64(*v),
        MemberValue::Float(v) => {
            let normalized = if *v == 0.0 { 0.0 } else { *v };
            hasher.write_u64(normalized.to_bits());
        }
        MemberValue::Str(v) => {
            hasher.write(v.as_bytes());
            hasher.write_u8(0xff);
        }
        MemberValue::Bytes(v) => {
            hasher.write_u64(v.len() as u64);
            hasher.write(v);
        }
        MemberValue::Uuid(v) => hasher.write(v.as_bytes()),
        MemberValue::Timestamp(v) => hasher.write_i64(v.timestamp_micros()),
        MemberValue::Nested(v) => {
            let routine = source.routine_for(&v.descriptor())?;
            let nested = routine.structural_hash(source, v.as_any())?;
            hasher.write_u64(nested);
        }
    }
    Ok(())
}
