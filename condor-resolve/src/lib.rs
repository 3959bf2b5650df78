//! CONDOR Resolve - Derived Value Resolution
//!
//! Resolves keys for one validity window at a time. Each pass owns a
//! [`SessionPool`](condor_storage::SessionPool) and reads the shared
//! registry and IOV pools through pinned snapshots, so any number of
//! passes can run side by side while the [`Manager`] keeps publishing.

pub mod engine;
pub mod in_flight;
pub mod manager;
pub mod registry;

pub use engine::ResolutionEngine;
pub use in_flight::InFlight;
pub use manager::{Manager, ResolveFailure, ResolveReport, SessionScope};
pub use registry::DependencyRegistry;
