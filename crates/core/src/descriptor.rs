//! Runtime type descriptors and the instance-inspection seam.
//!
//! Everything the engine compares is handed over as `&dyn Described`, so the
//! engine never needs compile-time knowledge of the domain model. The
//! descriptor is the key under which member sets, compiled routines, and
//! proxy mappings are looked up.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Opaque descriptor for a concrete Rust type.
///
/// ## Identity
///
/// Two descriptors are equal exactly when they describe the same type; the
/// stored name is carried for diagnostics only and never participates in
/// equality or hashing. A proxy type and the real type it wraps therefore
/// have **distinct** descriptors, which is what lets the resolver tell them
/// apart.
///
/// ## Cheapness
///
/// `TypeDescriptor` is two words and `Copy`. It is used as a map key on every
/// hot path, so it must stay that way.
#[derive(Debug, Copy, Clone)]
pub struct TypeDescriptor {
    type_id: TypeId,
    name: &'static str,
}

impl TypeDescriptor {
    /// Descriptor for `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully-qualified type name, e.g. `my_app::billing::Money`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, e.g. `Money`.
    ///
    /// Generic arguments are kept intact: `Wrapper<a::B>` stays
    /// `Wrapper<a::B>`, not `B>`.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(idx) => &self.name[idx + 2..],
            None => self.name,
        }
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Implemented by every object the engine can inspect.
///
/// The descriptor reported here is the **declared** runtime type of the
/// instance. For a lazy-loading proxy wrapper that is the proxy's own
/// descriptor; unwrapping it to the real domain type is the resolver's job,
/// not the instance's.
///
/// Domain types normally get their impl stamped by [`describe!`] rather than
/// written by hand.
pub trait Described: Any + fmt::Debug {
    /// Declared runtime type of this instance.
    fn descriptor(&self) -> TypeDescriptor;

    /// Upcast for member accessors.
    fn as_any(&self) -> &dyn Any;
}

/// Stamp [`Described`] impls for plain domain types.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq)]
/// struct Money {
///     amount: i64,
///     currency: String,
/// }
///
/// describe!(Money);
/// ```
#[macro_export]
macro_rules! describe {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::Described for $t {
                fn descriptor(&self) -> $crate::TypeDescriptor {
                    $crate::TypeDescriptor::of::<$t>()
                }

                fn as_any(&self) -> &dyn ::std::any::Any {
                    self
                }
            }
        )+
    };
}
