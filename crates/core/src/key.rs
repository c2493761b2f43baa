//! Entity key values.
//!
//! Keys decide *identity* equality (same row), as opposed to the structural
//! equality the compiled routines decide. The interesting state is
//! [`KeyValue::Unassigned`]: a freshly constructed entity that has never been
//! persisted. Two unassigned entities are never the same entity, no matter
//! how alike their members are.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owned entity-key value.
///
/// Constructors normalize the usual "unsaved value" conventions of mapping
/// layers - zero integers, empty strings/bytes, the nil UUID - to
/// [`KeyValue::Unassigned`], so identity checks never mistake a default for
/// a real key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyValue {
    /// No persistent identity yet.
    Unassigned,
    Int(i64),
    UInt(u64),
    Str(String),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    /// Multi-column key, components in declared column order.
    Composite(Vec<KeyValue>),
}

impl KeyValue {
    /// `0` is the unsaved-value convention for integer keys.
    pub fn int(value: i64) -> Self {
        if value == 0 {
            Self::Unassigned
        } else {
            Self::Int(value)
        }
    }

    /// `0` is the unsaved-value convention for unsigned keys.
    pub fn uint(value: u64) -> Self {
        if value == 0 {
            Self::Unassigned
        } else {
            Self::UInt(value)
        }
    }

    /// Empty strings are the unsaved-value convention for string keys.
    pub fn str(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Unassigned
        } else {
            Self::Str(value)
        }
    }

    /// The nil UUID is the unsaved-value convention for UUID keys.
    pub fn uuid(value: Uuid) -> Self {
        if value.is_nil() {
            Self::Unassigned
        } else {
            Self::Uuid(value)
        }
    }

    /// Empty buffers are the unsaved-value convention for binary keys.
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Unassigned
        } else {
            Self::Bytes(value)
        }
    }

    /// Composite key from already-normalized components.
    pub fn composite(parts: Vec<KeyValue>) -> Self {
        Self::Composite(parts)
    }

    /// Whether this key identifies a persisted entity.
    ///
    /// A composite key is assigned only when it has at least one component
    /// and every component is assigned; a partially-populated composite
    /// identifies nothing.
    pub fn is_assigned(&self) -> bool {
        match self {
            Self::Unassigned => false,
            Self::Composite(parts) => !parts.is_empty() && parts.iter().all(Self::is_assigned),
            _ => true,
        }
    }
}
