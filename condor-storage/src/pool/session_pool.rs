//! Per-session value cache.
//!
//! A [`SessionPool`] belongs to exactly one resolution pass. It memoizes
//! everything the pass touches (values copied from the shared pool and
//! freshly derived ones) and is dropped when the pass ends.

use std::collections::HashMap;

use condor_core::{CondorResult, Iov, Key, PoolError, Value};

use super::traits::ValueSource;

/// Result of a successful [`SessionPool::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key was new to the session.
    Inserted,
    /// An entry for the same key and window was already present; the
    /// existing value was kept.
    AlreadyPresent,
}

/// Exclusively-owned cache of values resolved for one target window.
#[derive(Debug, Clone)]
pub struct SessionPool {
    validity: Iov,
    values: HashMap<Key, Value>,
}

impl SessionPool {
    /// Create an empty session targeting `validity`.
    pub fn new(validity: Iov) -> Self {
        Self {
            validity,
            values: HashMap::new(),
        }
    }

    pub fn get(&self, key: Key) -> Option<&Value> {
        self.values.get(&key)
    }

    /// Cache `value` for the rest of the session.
    ///
    /// # Errors
    ///
    /// - [`PoolError::WindowMismatch`] if the value does not cover the
    ///   session window.
    /// - [`PoolError::DuplicateKey`] if the key is already cached with a
    ///   different window.
    pub fn insert(&mut self, value: Value) -> CondorResult<InsertOutcome> {
        if !value.validity().contains(&self.validity) {
            return Err(PoolError::WindowMismatch {
                key: value.key(),
                value: *value.validity(),
                pool: self.validity,
            }
            .into());
        }

        if let Some(existing) = self.values.get(&value.key()) {
            if existing.validity() == value.validity() {
                return Ok(InsertOutcome::AlreadyPresent);
            }
            return Err(PoolError::DuplicateKey {
                key: value.key(),
                existing: *existing.validity(),
                attempted: *value.validity(),
            }
            .into());
        }

        self.values.insert(value.key(), value);
        Ok(InsertOutcome::Inserted)
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

    /// Consume the session, yielding every cached value.
    pub fn into_values(self) -> Vec<Value> {
        self.values.into_values().collect()
    }
}

impl ValueSource for SessionPool {
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

#[cfg(test)]
mod tests {
    use super::*;
    use condor_core::{CondorError, IovKind};
    use proptest::prelude::*;

    fn run(lower: i64, upper: i64) -> Iov {
        Iov::new(IovKind::Run, lower, upper).expect("valid window")
    }

    #[test]
    fn test_insert_and_get() {
        let mut pool = SessionPool::new(run(10, 20));
        let key = Key::global("Area");
        let outcome = pool
            .insert(Value::new(key, run(10, 20), 12.0f64))
            .expect("insert succeeds");
        assert_eq!(outcome, InsertOutcome::Inserted);
        assert_eq!(*pool.get(key).expect("cached").get::<f64>().expect("f64"), 12.0);
        assert!(pool.get(Key::global("Other")).is_none());
    }

    #[test]
    fn test_wider_value_accepted() {
        let mut pool = SessionPool::new(run(10, 20));
        let outcome = pool
            .insert(Value::new(Key::global("Width"), run(0, 100), 3.0f64))
            .expect("wider window covers session");
        assert_eq!(outcome, InsertOutcome::Inserted);
    }

    #[test]
    fn test_same_window_insert_is_noop() {
        let mut pool = SessionPool::new(run(10, 20));
        let key = Key::global("Area");
        pool.insert(Value::new(key, run(10, 20), 12.0f64))
            .expect("first insert");
        let outcome = pool
            .insert(Value::new(key, run(10, 20), 99.0f64))
            .expect("second insert is a no-op");
        assert_eq!(outcome, InsertOutcome::AlreadyPresent);
        // First writer wins.
        assert_eq!(*pool.get(key).expect("cached").get::<f64>().expect("f64"), 12.0);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_conflicting_window_is_duplicate() {
        let mut pool = SessionPool::new(run(10, 20));
        let key = Key::global("Area");
        pool.insert(Value::new(key, run(10, 20), 12.0f64))
            .expect("first insert");
        let err = pool
            .insert(Value::new(key, run(0, 100), 12.0f64))
            .expect_err("conflicting window");
        assert_eq!(
            err,
            CondorError::Pool(PoolError::DuplicateKey {
                key,
                existing: run(10, 20),
                attempted: run(0, 100),
            })
        );
    }

    #[test]
    fn test_uncovering_value_rejected() {
        let mut pool = SessionPool::new(run(10, 20));
        let err = pool
            .insert(Value::new(Key::global("Late"), run(15, 30), 1u8))
            .expect_err("does not cover session");
        assert!(matches!(err, CondorError::Pool(PoolError::WindowMismatch { .. })));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_into_values() {
        let mut pool = SessionPool::new(run(0, 5));
        pool.insert(Value::new(Key::global("A"), run(0, 5), 1u8))
            .expect("insert A");
        pool.insert(Value::new(Key::global("B"), run(0, 5), 2u8))
            .expect("insert B");
        assert_eq!(pool.keys().count(), 2);
        assert_eq!(pool.into_values().len(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Every value held by a session covers the session window,
        /// whatever mix of inserts was attempted.
        #[test]
        fn prop_session_members_cover_target(
            inserts in prop::collection::vec((0u8..8, -50i64..50, 1i64..100), 0..40),
        ) {
            let target = run(0, 10);
            let mut pool = SessionPool::new(target);
            for (name, lower, len) in inserts {
                let key = Key::global(&format!("k{}", name));
                let _ = pool.insert(Value::new(key, run(lower, lower + len), name));
            }
            for value in pool.values() {
                prop_assert!(value.validity().contains(&target));
            }
        }
    }
}
