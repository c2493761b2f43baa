//! Audit record model.
//!
//! An [`AuditRecord`] is produced fresh per detected mutation, is immutable
//! after creation, and is handed off to whatever persistence sink consumes
//! it; this crate never retains records. The serde derives give sinks a
//! ready-made JSON export; the compact binary form lives in [`crate::codec`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hallmark_core::{FieldValue, KeyValue};

/// One changed member: name plus owned before/after snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Field-level before/after diff of one entity mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Key of the mutated entity.
    pub entity_key: KeyValue,
    /// Changed members only, in declared member order.
    pub changed_fields: Vec<FieldChange>,
    pub recorded_at: DateTime<Utc>,
    /// Principal the mutation is attributed to.
    pub actor: String,
}

impl AuditRecord {
    /// True when the diff found no changed members.
    pub fn is_empty(&self) -> bool {
        self.changed_fields.is_empty()
    }
}
