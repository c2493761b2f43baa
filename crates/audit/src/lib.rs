//! `hallmark-audit` — field-level before/after diffs and their compact
//! binary encoding.
//!
//! [`diff`] produces an [`AuditRecord`] naming exactly the members that
//! changed between two snapshots of the same real type; [`codec`] turns
//! records into length-prefixed buffers a sink can stream or skip through.

pub mod codec;
pub mod diff;
pub mod record;

pub use codec::{AuditReader, FieldFrame, decode, encode};
pub use diff::{diff, has_changes};
pub use record::{AuditRecord, FieldChange};
