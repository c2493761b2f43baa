//! Member value model.
//!
//! Accessors hand the engine **borrowed** views ([`MemberValue`]) so the
//! comparison hot path never allocates; audit snapshots need owned data and
//! use [`FieldValue`]. [`ValueKind`] tags both and doubles as the audit
//! codec's on-wire type tag, so its discriminants are part of the buffer
//! format and must stay stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::descriptor::Described;

/// Kind tag for member values.
///
/// Discriminants are serialized verbatim into audit buffers; never renumber.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ValueKind {
    Null = 0,
    Bool = 1,
    Int = 2,
    UInt = 3,
    Float = 4,
    Str = 5,
    Bytes = 6,
    Uuid = 7,
    Timestamp = 8,
    Nested = 9,
}

impl ValueKind {
    /// Wire tag for this kind.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Inverse of [`ValueKind::tag`]; `None` for unknown tags.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Null),
            1 => Some(Self::Bool),
            2 => Some(Self::Int),
            3 => Some(Self::UInt),
            4 => Some(Self::Float),
            5 => Some(Self::Str),
            6 => Some(Self::Bytes),
            7 => Some(Self::Uuid),
            8 => Some(Self::Timestamp),
            9 => Some(Self::Nested),
            _ => None,
        }
    }
}

/// Borrowed view of one comparable member.
///
/// Produced by member accessors; consumed by compiled equality routines and
/// the snapshot differ. A null member is equal only to another null at the
/// same position, and two members of different non-null kinds are simply
/// unequal (no numeric cross-kind coercion).
#[derive(Debug, Clone, Copy)]
pub enum MemberValue<'a> {
    /// Absent member (`Option::None` in the domain model).
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(&'a str),
    Bytes(&'a [u8]),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    /// Value-object member, compared through its own compiled routine.
    Nested(&'a dyn Described),
}

impl<'a> MemberValue<'a> {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::UInt(_) => ValueKind::UInt,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Uuid(_) => ValueKind::Uuid,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::Nested(_) => ValueKind::Nested,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Owned snapshot of this value, or `None` for [`MemberValue::Nested`]
    /// (nested values snapshot member-by-member, which needs the engine).
    pub fn to_owned_scalar(&self) -> Option<FieldValue> {
        match *self {
            Self::Null => Some(FieldValue::Null),
            Self::Bool(v) => Some(FieldValue::Bool(v)),
            Self::Int(v) => Some(FieldValue::Int(v)),
            Self::UInt(v) => Some(FieldValue::UInt(v)),
            Self::Float(v) => Some(FieldValue::Float(v)),
            Self::Str(v) => Some(FieldValue::Str(v.to_owned())),
            Self::Bytes(v) => Some(FieldValue::Bytes(v.to_vec())),
            Self::Uuid(v) => Some(FieldValue::Uuid(v)),
            Self::Timestamp(v) => Some(FieldValue::Timestamp(v)),
            Self::Nested(_) => None,
        }
    }
}

/// Owned snapshot of a member value, as captured into audit records.
///
/// Nested value objects flatten to [`FieldValue::Composite`] holding their
/// member snapshots in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Composite(Vec<FieldValue>),
}

impl FieldValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::UInt(_) => ValueKind::UInt,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Uuid(_) => ValueKind::Uuid,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::Composite(_) => ValueKind::Nested,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}
