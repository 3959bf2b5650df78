//! CONDOR Storage - Value Pools
//!
//! Shared IOV pools published copy-on-write, and the per-session pools the
//! resolution engine memoizes into. Loading raw values from persistent
//! storage happens elsewhere; callers publish what they load.

pub mod pool;

pub use pool::{
    InsertOutcome, IovPool, PoolId, PoolSet, PoolSnapshot, PoolStats, SessionPool, ValueSource,
};
