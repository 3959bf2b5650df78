//! Shared, read-only pools of materialized values.
//!
//! An [`IovPool`] is never mutated in place. Adding values yields a new
//! version that shares nothing mutable with the old one, so a reader holding
//! an older version keeps a consistent view for as long as it likes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use condor_core::{CondorResult, Iov, Key, PoolError, Value};
use uuid::Uuid;

use super::traits::ValueSource;

/// Identifier shared by every version of one pool.
pub type PoolId = Uuid;

/// Versioned set of already-materialized values for one window.
#[derive(Debug, Clone)]
pub struct IovPool {
    id: PoolId,
    version: u64,
    validity: Iov,
    published_at: DateTime<Utc>,
    values: Arc<HashMap<Key, Value>>,
}

impl IovPool {
    /// Create an empty pool covering `validity`.
    pub fn new(validity: Iov) -> Self {
        Self {
            id: Uuid::now_v7(),
            version: 0,
            validity,
            published_at: Utc::now(),
            values: Arc::new(HashMap::new()),
        }
    }

    /// Create a pool holding `values`.
    ///
    /// # Errors
    ///
    /// Fails with [`PoolError::WindowMismatch`] if any value does not cover
    /// `validity`.
    pub fn from_values<I>(validity: Iov, values: I) -> CondorResult<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        Self::new(validity).with_values(values)
    }

    /// A new version of this pool with `value` added or replaced.
    pub fn with_value(&self, value: Value) -> CondorResult<Self> {
        self.with_values(std::iter::once(value))
    }

    /// A new version of this pool with every value in `values` added.
    ///
    /// Nothing is published if any value is rejected.
    pub fn with_values<I>(&self, values: I) -> CondorResult<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut next = HashMap::clone(&self.values);
        for value in values {
            if !value.validity().contains(&self.validity) {
                return Err(PoolError::WindowMismatch {
                    key: value.key(),
                    value: *value.validity(),
                    pool: self.validity,
                }
                .into());
            }
            next.insert(value.key(), value);
        }

        Ok(Self {
            id: self.id,
            version: self.version + 1,
            validity: self.validity,
            published_at: Utc::now(),
            values: Arc::new(next),
        })
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Monotonically increasing version; 0 for a freshly created pool.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.values.keys().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.values.values()
    }
}

impl ValueSource for IovPool {
    fn lookup(&self, key: Key) -> Option<Value> {
        self.values.get(&key).cloned()
    }

    fn validity(&self) -> &Iov {
        &self.validity
    }

    fn contains(&self, key: Key) -> bool {
        self.values.contains_key(&key)
    }
}
