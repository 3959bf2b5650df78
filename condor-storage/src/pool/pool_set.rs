//! Published IOV pools, one per window.
//!
//! Readers load an immutable [`PoolSnapshot`] and resolve against it for as
//! long as they need; writers build a replacement snapshot and publish it
//! with a compare-and-swap, retrying from the latest snapshot if another
//! writer won first. A snapshot handed to an in-flight session is never
//! changed underneath it.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use condor_core::{CondorResult, Iov, PoolError, Value};

use super::iov_pool::IovPool;
use super::traits::ValueSource;

/// Immutable view of every published pool.
#[derive(Debug, Clone, Default)]
pub struct PoolSnapshot {
    pools: Vec<Arc<IovPool>>,
    generation: u64,
}

impl PoolSnapshot {
    /// The narrowest published pool whose window contains `window`.
    pub fn pool_for(&self, window: &Iov) -> Option<Arc<IovPool>> {
        self.pools
            .iter()
            .filter(|pool| pool.validity().contains(window))
            .min_by_key(|pool| pool.validity().span())
            .cloned()
    }

    /// Every published value visible to `window`, as one pool.
    ///
    /// All pools whose window contains `window` are merged over the
    /// intersection of their windows. When two pools store the same key the
    /// narrower pool wins. A single covering pool is returned as is.
    ///
    /// # Errors
    ///
    /// Fails only if a stored value does not cover the merged window, which
    /// a published pool never allows.
    pub fn merged_for(&self, window: &Iov) -> CondorResult<Option<Arc<IovPool>>> {
        let mut covering: Vec<&Arc<IovPool>> = self
            .pools
            .iter()
            .filter(|pool| pool.validity().contains(window))
            .collect();

        match covering.len() {
            0 => return Ok(None),
            1 => return Ok(Some(Arc::clone(covering[0]))),
            _ => {}
        }

        // Widest first, so narrower pools overwrite on shared keys.
        covering.sort_by_key(|pool| std::cmp::Reverse(pool.validity().span()));

        let validity = covering
            .iter()
            .fold(*covering[0].validity(), |acc, pool| {
                acc.intersection(pool.validity()).unwrap_or(*window)
            });
        let mut values = HashMap::new();
        for pool in &covering {
            for value in pool.values() {
                values.insert(value.key(), value.clone());
            }
        }

        tracing::trace!(
            target_window = %window,
            window = %validity,
            pools = covering.len(),
            values = values.len(),
            "Merged covering pools"
        );
        IovPool::from_values(validity, values.into_values()).map(|pool| Some(Arc::new(pool)))
    }

    /// The pool published for exactly `window`.
    pub fn exact(&self, window: &Iov) -> Option<Arc<IovPool>> {
        self.pools
            .iter()
            .find(|pool| pool.validity() == window)
            .cloned()
    }

    pub fn pools(&self) -> &[Arc<IovPool>] {
        &self.pools
    }

    /// Number of publications that produced this snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    fn replace(&mut self, pool: Arc<IovPool>) {
        match self
            .pools
            .iter_mut()
            .find(|p| p.validity() == pool.validity())
        {
            Some(slot) => *slot = pool,
            None => self.pools.push(pool),
        }
        self.generation += 1;
    }
}

/// Copy-on-write collection of published pools.
pub struct PoolSet {
    snap: ArcSwap<PoolSnapshot>,
}

impl PoolSet {
    pub fn new() -> Self {
        Self {
            snap: ArcSwap::from_pointee(PoolSnapshot::default()),
        }
    }

    /// Pin the current snapshot.
    pub fn snapshot(&self) -> Arc<PoolSnapshot> {
        self.snap.load_full()
    }

    pub fn pool_for(&self, window: &Iov) -> Option<Arc<IovPool>> {
        self.snap.load().pool_for(window)
    }

    pub fn merged_for(&self, window: &Iov) -> CondorResult<Option<Arc<IovPool>>> {
        self.snap.load().merged_for(window)
    }

    /// Publish `pool`, superseding any pool for the same window.
    ///
    /// # Errors
    ///
    /// Fails with [`PoolError::StaleVersion`] when the current pool for the
    /// window is a version of the same pool at least as new as `pool`.
    pub fn publish(&self, pool: IovPool) -> CondorResult<Arc<IovPool>> {
        let pool = Arc::new(pool);
        loop {
            let cur = self.snap.load_full();
            if let Some(current) = cur.exact(pool.validity()) {
                if current.id() == pool.id() && pool.version() <= current.version() {
                    return Err(PoolError::StaleVersion {
                        pool: *pool.validity(),
                        attempted: pool.version(),
                        current: current.version(),
                    }
                    .into());
                }
            }
            let mut next = (*cur).clone();
            next.replace(Arc::clone(&pool));

            let prev = self.snap.compare_and_swap(&cur, Arc::new(next));
            if Arc::ptr_eq(&prev, &cur) {
                tracing::debug!(
                    window = %pool.validity(),
                    version = pool.version(),
                    values = pool.len(),
                    "Published IOV pool"
                );
                return Ok(pool);
            }
        }
    }

    /// Add `value` to the pool for exactly `window`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Fails if the value does not cover `window`; nothing is published.
    pub fn publish_value(&self, window: Iov, value: Value) -> CondorResult<Arc<IovPool>> {
        loop {
            let cur = self.snap.load_full();
            let base = match cur.exact(&window) {
                Some(pool) => (*pool).clone(),
                None => IovPool::new(window),
            };
            let pool = Arc::new(base.with_value(value.clone())?);

            let mut next = (*cur).clone();
            next.replace(Arc::clone(&pool));

            let prev = self.snap.compare_and_swap(&cur, Arc::new(next));
            if Arc::ptr_eq(&prev, &cur) {
                tracing::debug!(
                    key = %value.key(),
                    window = %window,
                    version = pool.version(),
                    "Published value"
                );
                return Ok(pool);
            }
        }
    }

    /// The pool for exactly `window`, publishing an empty one if absent.
    pub fn get_or_create(&self, window: Iov) -> Arc<IovPool> {
        loop {
            let cur = self.snap.load_full();
            if let Some(pool) = cur.exact(&window) {
                return pool;
            }
            let pool = Arc::new(IovPool::new(window));
            let mut next = (*cur).clone();
            next.replace(Arc::clone(&pool));

            let prev = self.snap.compare_and_swap(&cur, Arc::new(next));
            if Arc::ptr_eq(&prev, &cur) {
                return pool;
            }
        }
    }
}

impl Default for PoolSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PoolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolSet")
            .field("snapshot", &self.snap.load_full())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use condor_core::{CondorError, IovKind, Key};

    fn run(lower: i64, upper: i64) -> Iov {
        Iov::new(IovKind::Run, lower, upper).expect("valid window")
    }

    #[test]
    fn test_pool_for_picks_narrowest_cover() {
        let set = PoolSet::new();
        set.publish(IovPool::new(run(0, 1000))).expect("publish");
        set.publish(IovPool::new(run(0, 100))).expect("publish");
        set.publish(IovPool::new(run(50, 60))).expect("publish");

        let pool = set.pool_for(&run(10, 20)).expect("a pool covers");
        assert_eq!(pool.validity(), &run(0, 100));
        assert!(set.pool_for(&run(900, 1100)).is_none());
    }

    #[test]
    fn test_publish_supersedes_same_window() {
        let set = PoolSet::new();
        let key = Key::global("Width");
        set.publish_value(run(0, 100), Value::new(key, run(0, 100), 3.0f64))
            .expect("publish width");
        let pinned = set.snapshot();

        set.publish_value(run(0, 100), Value::new(key, run(0, 100), 5.0f64))
            .expect("publish new width");

        let old = pinned.exact(&run(0, 100)).expect("pinned pool");
        let new = set.snapshot().exact(&run(0, 100)).expect("current pool");
        assert_eq!(*old.lookup(key).expect("w").get::<f64>().expect("f64"), 3.0);
        assert_eq!(*new.lookup(key).expect("w").get::<f64>().expect("f64"), 5.0);
        assert_eq!(set.snapshot().len(), 1);
        assert!(new.version() > old.version());
        assert!(set.snapshot().generation() > pinned.generation());
    }

    #[test]
    fn test_merged_for_combines_covering_pools() {
        let set = PoolSet::new();
        let width = Key::global("Width");
        let height = Key::global("Height");
        let temp = Key::global("Temp");
        set.publish_value(run(0, 100), Value::new(width, run(0, 100), 3.0f64))
            .expect("publish width");
        set.publish_value(run(0, 200), Value::new(height, run(0, 200), 4.0f64))
            .expect("publish height");
        set.publish_value(run(10, 20), Value::new(temp, run(10, 20), 20.5f64))
            .expect("publish temp");
        set.publish(IovPool::new(run(500, 600))).expect("publish unrelated");

        let merged = set
            .merged_for(&run(10, 20))
            .expect("merge")
            .expect("pools cover");
        assert_eq!(merged.validity(), &run(10, 20));
        assert_eq!(merged.len(), 3);
        assert!(merged.contains(width));
        assert!(merged.contains(height));
        assert!(merged.contains(temp));

        let wide = set
            .merged_for(&run(30, 40))
            .expect("merge")
            .expect("pools cover");
        assert_eq!(wide.validity(), &run(0, 100));
        assert!(!wide.contains(temp));

        assert!(set.merged_for(&run(900, 1000)).expect("merge").is_none());
    }

    #[test]
    fn test_merged_for_prefers_narrower_pool() {
        let set = PoolSet::new();
        let key = Key::global("Gain");
        set.publish_value(run(0, 1000), Value::new(key, run(0, 1000), 1.0f64))
            .expect("publish wide");
        set.publish_value(run(0, 100), Value::new(key, run(0, 100), 2.0f64))
            .expect("publish narrow");

        let merged = set
            .merged_for(&run(10, 20))
            .expect("merge")
            .expect("pools cover");
        let gain = merged.lookup(key).expect("gain");
        assert_eq!(*gain.get::<f64>().expect("f64"), 2.0);
        assert_eq!(merged.validity(), &run(0, 100));
    }

    #[test]
    fn test_single_cover_is_returned_unmerged() {
        let set = PoolSet::new();
        let published = set.publish(IovPool::new(run(0, 100))).expect("publish");
        let found = set
            .merged_for(&run(10, 20))
            .expect("merge")
            .expect("pool covers");
        assert!(Arc::ptr_eq(&published, &found));
    }

    #[test]
    fn test_publish_rejects_stale_version() {
        let set = PoolSet::new();
        let height = Key::global("Height");
        let v1 = IovPool::from_values(
            run(0, 100),
            [Value::new(Key::global("Width"), run(0, 100), 3.0f64)],
        )
        .expect("build pool");
        set.publish(v1.clone()).expect("publish v1");
        let current = set
            .publish_value(run(0, 100), Value::new(height, run(0, 100), 4.0f64))
            .expect("publish height");
        assert_eq!(current.version(), v1.version() + 1);

        let err = set.publish(v1.clone()).expect_err("stale version");
        assert_eq!(
            err,
            CondorError::from(PoolError::StaleVersion {
                pool: run(0, 100),
                attempted: v1.version(),
                current: current.version(),
            })
        );
        let after = set.snapshot().exact(&run(0, 100)).expect("pool");
        assert_eq!(after.version(), current.version());
        assert!(after.contains(height));
    }

    #[test]
    fn test_publish_accepts_newer_version_and_other_pools() {
        let set = PoolSet::new();
        let v1 = IovPool::new(run(0, 100));
        set.publish(v1.clone()).expect("publish v1");
        let v2 = v1
            .with_value(Value::new(Key::global("Width"), run(0, 100), 3.0f64))
            .expect("v2");
        set.publish(v2).expect("newer version supersedes");

        // A distinct pool for the same window replaces regardless of version.
        set.publish(IovPool::new(run(0, 100))).expect("fresh pool");
        let pool = set.snapshot().exact(&run(0, 100)).expect("pool");
        assert_eq!(pool.version(), 0);
        assert_eq!(set.snapshot().len(), 1);
    }

    #[test]
    fn test_publish_value_rejects_uncovering_value() {
        let set = PoolSet::new();
        let result = set.publish_value(
            run(0, 100),
            Value::new(Key::global("Short"), run(0, 10), 1u8),
        );
        assert!(result.is_err());
        assert!(set.snapshot().is_empty());
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let set = PoolSet::new();
        let a = set.get_or_create(run(0, 10));
        let b = set.get_or_create(run(0, 10));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(set.snapshot().len(), 1);
    }

    #[test]
    fn test_concurrent_publication_loses_nothing() {
        let set = Arc::new(PoolSet::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        let key = Key::global(&format!("k{}-{}", i, j));
                        set.publish_value(run(0, 100), Value::new(key, run(0, 100), j))
                            .expect("publish succeeds");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("publisher thread");
        }
        let pool = set.pool_for(&run(0, 100)).expect("pool published");
        assert_eq!(pool.len(), 200);
    }
}
