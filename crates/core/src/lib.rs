//! `hallmark-core` — identity and equality primitives for domain models.
//!
//! This crate contains the **pure data model** (descriptors, member values,
//! keys); caching and comparison machinery live in the engine crates.

pub mod descriptor;
pub mod error;
pub mod key;
pub mod member;
pub mod proxy;
pub mod value;

pub use descriptor::{Described, TypeDescriptor};
pub use error::{EngineError, EngineResult};
pub use key::KeyValue;
pub use member::{AccessorFn, MemberCatalog, MemberDef, MemberRegistry, MemberSet};
pub use proxy::{NoProxies, ProxyConvention, ProxyRegistry};
pub use value::{FieldValue, MemberValue, ValueKind};


