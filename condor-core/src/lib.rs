//! CONDOR Core - Value Types
//!
//! Keys, validity windows, immutable values and dependency descriptors.
//! Pools live in condor-storage; resolution lives in condor-resolve.

pub mod config;
pub mod dependency;
pub mod error;
pub mod identity;
pub mod iov;
pub mod value;

pub use config::{BulkPolicy, ResolverConfig};
pub use dependency::{Dependency, DerivationCallback, DerivationContext, Derived, Resolver};
pub use error::{
    CondorError, CondorResult, ConfigError, PoolError, RegistryError, ResolutionError,
    ValidationError, ValueError,
};
pub use identity::{hash32, Key, ScopeId};
pub use iov::{Iov, IovKind};
pub use value::Value;
