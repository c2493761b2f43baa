//! Engine error model.

use thiserror::Error;

/// Result type used across the engine crates.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level error.
///
/// Every failure here is deterministic and synchronous. Callers must treat a
/// failed comparison or diff as *indeterminate*, never as "equal" or
/// "unequal".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Proxy unwrapping did not reach a terminal type within the configured
    /// depth (cyclic or malformed proxy hierarchy).
    #[error("type resolution failed for {type_name}: proxy depth {depth} exceeded")]
    TypeResolution { type_name: String, depth: usize },

    /// The type offers no usable comparable-member enumeration.
    #[error("unsupported type shape for {type_name}: {reason}")]
    UnsupportedTypeShape { type_name: String, reason: String },

    /// A diff was requested across two different real types.
    #[error("snapshot type mismatch: before is {before}, after is {after}")]
    SnapshotTypeMismatch { before: String, after: String },

    /// An entry factory failed while populating a cache; the cache itself is
    /// unchanged.
    #[error("cache entry build failed for {type_name}: {reason}")]
    CacheBuild { type_name: String, reason: String },

    /// An audit buffer could not be decoded.
    #[error("malformed audit record: {0}")]
    MalformedAuditRecord(String),
}

impl EngineError {
    pub fn type_resolution(type_name: impl Into<String>, depth: usize) -> Self {
        Self::TypeResolution {
            type_name: type_name.into(),
            depth,
        }
    }

    pub fn unsupported_shape(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedTypeShape {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    pub fn snapshot_mismatch(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self::SnapshotTypeMismatch {
            before: before.into(),
            after: after.into(),
        }
    }

    pub fn cache_build(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CacheBuild {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed_record(msg: impl Into<String>) -> Self {
        Self::MalformedAuditRecord(msg.into())
    }
}


