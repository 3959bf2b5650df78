//! Value pools with explicit window contracts.
//!
//! Two kinds of pool hold resolved values:
//!
//! - [`IovPool`]: shared, read-only, versioned. Published through a
//!   [`PoolSet`] and read concurrently by any number of sessions.
//! - [`SessionPool`]: private to one resolution pass. Memoizes everything the
//!   pass resolves and is dropped with it.
//!
//! Every member of either pool covers the pool's window, so a lookup hit is
//! always valid for the window being resolved.
//!
//! # Example
//!
//! ```ignore
//! let set = PoolSet::new();
//! set.publish_value(window, Value::new(width_key, window, 3.0f64))?;
//!
//! let pool = set.pool_for(&target).expect("a pool covers the target");
//! let width = pool.lookup(width_key);
//! ```

pub mod iov_pool;
pub mod pool_set;
pub mod session_pool;
pub mod traits;

pub use iov_pool::{IovPool, PoolId};
pub use pool_set::{PoolSet, PoolSnapshot};
pub use session_pool::{InsertOutcome, SessionPool};
pub use traits::{PoolStats, ValueSource};
