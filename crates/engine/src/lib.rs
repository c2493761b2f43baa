//! `hallmark-engine` — proxy resolution, compiled structural equality, and
//! entity identity over the `hallmark-core` data model.

pub mod compiler;
pub mod engine;
pub mod identity;
pub mod resolver;

pub use compiler::{
    CompiledRoutine, EqualityCompiler, RoutineSource, member_values_equal, snapshot_value,
};
pub use engine::{EngineCacheStats, EngineConfig, EqualityEngine};
pub use identity::{EntityRef, same_entity};
pub use resolver::{DEFAULT_MAX_DEPTH, ProxyResolver};


