//! Snapshot diffing.
//!
//! `diff` walks the declared comparable members of two instances of the
//! same real type, compares each pair through the engine's member-level
//! comparator, and snapshots only the members that actually changed. The
//! walk order is declared member order, so `changed_fields` is
//! deterministic regardless of what other threads are doing.

use std::sync::Arc;

use chrono::Utc;

use hallmark_core::{Described, EngineError, EngineResult, KeyValue};
use hallmark_engine::{
    CompiledRoutine, EqualityEngine, RoutineSource, member_values_equal, snapshot_value,
};

use crate::record::{AuditRecord, FieldChange};

/// Field-level diff of `before` → `after`, attributed to `actor`.
///
/// Both instances must resolve to the same real type; anything else is a
/// [`EngineError::SnapshotTypeMismatch`] and no partial record is produced.
/// Proxy-wrapped instances diff like their unwrapped counterparts.
pub fn diff(
    engine: &EqualityEngine,
    before: &dyn Described,
    after: &dyn Described,
    entity_key: KeyValue,
    actor: impl Into<String>,
) -> EngineResult<AuditRecord> {
    let (before_routine, after_routine) = routines_for_pair(engine, before, after)?;

    let mut changed_fields = Vec::new();
    for (index, field) in after_routine.member_names().enumerate() {
        let old = before_routine.read_member(index, before.as_any())?;
        let new = after_routine.read_member(index, after.as_any())?;
        if member_values_equal(engine, &old, &new)? {
            continue;
        }
        changed_fields.push(FieldChange {
            field: field.to_owned(),
            old: snapshot_value(engine, &old)?,
            new: snapshot_value(engine, &new)?,
        });
    }

    Ok(AuditRecord {
        entity_key,
        changed_fields,
        recorded_at: Utc::now(),
        actor: actor.into(),
    })
}

/// Dirty-check form of [`diff`]: answers whether anything changed without
/// allocating a record.
pub fn has_changes(
    engine: &EqualityEngine,
    before: &dyn Described,
    after: &dyn Described,
) -> EngineResult<bool> {
    let (before_routine, after_routine) = routines_for_pair(engine, before, after)?;
    let equal =
        before_routine.structural_eq(engine, before.as_any(), &after_routine, after.as_any())?;
    Ok(!equal)
}

fn routines_for_pair(
    engine: &EqualityEngine,
    before: &dyn Described,
    after: &dyn Described,
) -> EngineResult<(Arc<CompiledRoutine>, Arc<CompiledRoutine>)> {
    let before_routine = engine.routine_for(&before.descriptor())?;
    let after_routine = engine.routine_for(&after.descriptor())?;
    if before_routine.resolved() != after_routine.resolved() {
        return Err(EngineError::snapshot_mismatch(
            before_routine.resolved().name(),
            after_routine.resolved().name(),
        ));
    }
    if before_routine.member_count() != after_routine.member_count() {
        return Err(EngineError::unsupported_shape(
            after_routine.resolved().name(),
            format!(
                "member count differs between {} and {}",
                before_routine.declared().name(),
                after_routine.declared().name()
            ),
        ));
    }
    Ok((before_routine, after_routine))
}
