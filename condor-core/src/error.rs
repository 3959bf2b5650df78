//! Error types for CONDOR operations

use crate::{Iov, Key};
use thiserror::Error;

/// Failures raised while resolving a key in a session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Unresolved key {key}: neither stored nor derivable")]
    UnresolvedKey { key: Key },

    #[error("Cyclic dependency detected at {key}: {}", format_chain(chain))]
    CyclicDependency { key: Key, chain: Vec<Key> },

    #[error("Derivation callback for {key} failed: {reason}")]
    CallbackFailed { key: Key, reason: String },

    #[error("Resolution depth limit {limit} exceeded at {key}")]
    DepthExceeded { key: Key, limit: usize },
}

/// Payload access errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("Type mismatch for {key}: requested {expected}, stored {found}")]
    TypeMismatch {
        key: Key,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Input index {index} out of range for {key} ({len} inputs)")]
    InputOutOfRange { key: Key, index: usize, len: usize },
}

/// Pool insertion and publication errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("Duplicate key {key}: present for {existing}, inserted for {attempted}")]
    DuplicateKey {
        key: Key,
        existing: Iov,
        attempted: Iov,
    },

    #[error("Value {key} valid for {value} does not cover pool window {pool}")]
    WindowMismatch { key: Key, value: Iov, pool: Iov },

    #[error("Target window {target} is not covered by pool window {pool}")]
    TargetNotCovered { target: Iov, pool: Iov },

    #[error("Stale pool for {pool}: version {attempted} does not supersede {current}")]
    StaleVersion {
        pool: Iov,
        attempted: u64,
        current: u64,
    },
}

/// Dependency registry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Dependency for {key} already registered as '{name}'")]
    AlreadyRegistered { key: Key, name: String },

    #[error("Dependency for {key} lists itself as a prerequisite")]
    SelfReference { key: Key },
}

/// Validation errors for constructed data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Empty validity window: [{lower}, {upper})")]
    EmptyWindow { lower: i64, upper: i64 },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all CONDOR errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CondorError {
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Value error: {0}")]
    Value(#[from] ValueError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CondorError {
    /// The key this error concerns, if any.
    pub fn key(&self) -> Option<Key> {
        match self {
            CondorError::Resolution(err) => Some(match err {
                ResolutionError::UnresolvedKey { key }
                | ResolutionError::CyclicDependency { key, .. }
                | ResolutionError::CallbackFailed { key, .. }
                | ResolutionError::DepthExceeded { key, .. } => *key,
            }),
            CondorError::Value(
                ValueError::TypeMismatch { key, .. } | ValueError::InputOutOfRange { key, .. },
            ) => Some(*key),
            CondorError::Pool(
                PoolError::DuplicateKey { key, .. } | PoolError::WindowMismatch { key, .. },
            ) => Some(*key),
            CondorError::Registry(
                RegistryError::AlreadyRegistered { key, .. } | RegistryError::SelfReference { key },
            ) => Some(*key),
            _ => None,
        }
    }

    /// Returns true for the cyclic-dependency failure.
    pub fn is_cycle(&self) -> bool {
        matches!(
            self,
            CondorError::Resolution(ResolutionError::CyclicDependency { .. })
        )
    }
}

/// Result type alias for CONDOR operations.
pub type CondorResult<T> = Result<T, CondorError>;

fn format_chain(chain: &[Key]) -> String {
    chain
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

// =============================================================================
// TESTS
// =============================================================================
