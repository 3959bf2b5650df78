//! Long-lived owner of the dependency registry and the published IOV pools.
//!
//! Registration and publication are copy-on-write: each builds a new
//! snapshot and swaps it in, so sessions that already pinned the previous
//! snapshot keep resolving against it untouched. Bulk resolution runs one
//! engine per window; independent windows resolve in parallel.

use std::any::Any;
use std::sync::Arc;

use arc_swap::ArcSwap;
use condor_core::{
    BulkPolicy, CondorError, CondorResult, Dependency, Iov, Key, ResolverConfig, Value,
};
use condor_storage::{IovPool, PoolSet, PoolStats, SessionPool, ValueSource};
use rayon::prelude::*;

use crate::engine::ResolutionEngine;
use crate::registry::DependencyRegistry;

// ============================================================================
// REPORTS
// ============================================================================

/// A dependency that failed during bulk resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveFailure {
    pub key: Key,
    pub name: String,
    pub error: CondorError,
}

/// Outcome of resolving every applicable dependency for one window.
#[derive(Debug)]
pub struct ResolveReport {
    pub validity: Iov,
    /// Everything the session resolved, derived or copied from the pool.
    pub values: SessionPool,
    pub stats: PoolStats,
    /// Empty unless the manager runs with [`BulkPolicy::Skip`].
    pub failures: Vec<ResolveFailure>,
}

impl ResolveReport {
    pub fn get(&self, key: Key) -> Option<&Value> {
        self.values.get(key)
    }

    /// Number of callbacks the session invoked.
    pub fn callbacks(&self) -> u64 {
        self.stats.callbacks
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// PINNED SESSION INPUTS
// ============================================================================

/// Registry and pool snapshots pinned for one target window.
///
/// Publications made after the scope was taken are not visible through it.
#[derive(Debug, Clone)]
pub struct SessionScope {
    registry: Arc<DependencyRegistry>,
    pool: Arc<IovPool>,
    target: Iov,
    max_depth: usize,
}

impl SessionScope {
    /// A fresh engine over the pinned snapshots.
    pub fn engine(&self) -> CondorResult<ResolutionEngine<'_>> {
        Ok(ResolutionEngine::new(&self.registry, &self.pool, self.target)?
            .with_max_depth(self.max_depth))
    }

    pub fn target(&self) -> &Iov {
        &self.target
    }

    pub fn registry(&self) -> &Arc<DependencyRegistry> {
        &self.registry
    }

    pub fn pool(&self) -> &Arc<IovPool> {
        &self.pool
    }
}

// ============================================================================
// MANAGER
// ============================================================================

pub struct Manager {
    config: ResolverConfig,
    registry: ArcSwap<DependencyRegistry>,
    pools: PoolSet,
}

impl Manager {
    /// Create a manager with no dependencies and no pools.
    ///
    /// # Errors
    ///
    /// Fails if `config` does not validate.
    pub fn new(config: ResolverConfig) -> CondorResult<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: ResolverConfig) -> Self {
        Self {
            config,
            registry: ArcSwap::from_pointee(DependencyRegistry::new()),
            pools: PoolSet::new(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Register one dependency.
    pub fn register(&self, dep: Dependency) -> CondorResult<()> {
        self.register_all(std::iter::once(dep)).map(|_| ())
    }

    /// Register every dependency in `deps`, or none of them.
    ///
    /// Returns the number registered.
    pub fn register_all<I>(&self, deps: I) -> CondorResult<usize>
    where
        I: IntoIterator<Item = Dependency>,
    {
        let deps: Vec<Dependency> = deps.into_iter().collect();
        loop {
            let cur = self.registry.load_full();
            let mut next = (*cur).clone();
            for dep in &deps {
                next.insert(dep.clone())?;
            }
            let total = next.len();

            let prev = self.registry.compare_and_swap(&cur, Arc::new(next));
            if Arc::ptr_eq(&prev, &cur) {
                tracing::debug!(
                    registered = deps.len(),
                    total,
                    "Published dependency registry"
                );
                return Ok(deps.len());
            }
        }
    }

    pub fn dependency(&self, key: Key) -> Option<Arc<Dependency>> {
        self.registry.load().get(key)
    }

    /// Pin the current registry snapshot.
    pub fn registry(&self) -> Arc<DependencyRegistry> {
        self.registry.load_full()
    }

    pub fn pools(&self) -> &PoolSet {
        &self.pools
    }

    /// Publish `pool`, superseding any pool for the same window.
    ///
    /// # Errors
    ///
    /// Fails if a newer version of the same pool is already published.
    pub fn publish_pool(&self, pool: IovPool) -> CondorResult<Arc<IovPool>> {
        self.pools.publish(pool)
    }

    /// Add `value` to the pool for its own window, creating the pool if absent.
    pub fn publish_value(&self, value: Value) -> CondorResult<Arc<IovPool>> {
        let window = *value.validity();
        self.pools.publish_value(window, value)
    }

    /// The narrowest published pool covering `window`.
    pub fn pool_for(&self, window: &Iov) -> Option<Arc<IovPool>> {
        self.pools.pool_for(window)
    }

    /// Every published value visible to `window`, merged into one pool.
    ///
    /// Falls back to publishing an empty pool for exactly `window` when no
    /// published pool covers it.
    pub fn pool_for_or_create(&self, window: &Iov) -> CondorResult<Arc<IovPool>> {
        match self.pools.merged_for(window)? {
            Some(pool) => Ok(pool),
            None => Ok(self.pools.get_or_create(*window)),
        }
    }

    /// Pin the current registry and the values visible to `target`.
    ///
    /// # Errors
    ///
    /// Fails if the covering pools cannot be merged.
    pub fn session(&self, target: &Iov) -> CondorResult<SessionScope> {
        Ok(SessionScope {
            registry: self.registry(),
            pool: self.pool_for_or_create(target)?,
            target: *target,
            max_depth: self.config.max_depth,
        })
    }

    /// Resolve every dependency applicable to `target` in one session.
    ///
    /// # Errors
    ///
    /// With [`BulkPolicy::Abort`] the first failure is returned. With
    /// [`BulkPolicy::Skip`] failures are collected in the report instead.
    pub fn resolve_window(
        &self,
        target: &Iov,
        user_param: Option<&(dyn Any + Send + Sync)>,
    ) -> CondorResult<ResolveReport> {
        let scope = self.session(target)?;
        let mut engine = scope.engine()?;
        if let Some(param) = user_param {
            engine = engine.with_user_param(param);
        }

        let mut failures = Vec::new();
        for dep in scope.registry().applicable(target) {
            let Err(error) = engine.resolve_shared(dep) else {
                continue;
            };
            if self.config.log_failures {
                tracing::warn!(
                    key = %dep.target(),
                    name = dep.name(),
                    window = %target,
                    error = %error,
                    "Dependency failed during bulk resolution"
                );
            }
            match self.config.bulk_policy {
                BulkPolicy::Abort => return Err(error),
                BulkPolicy::Skip => failures.push(ResolveFailure {
                    key: dep.target(),
                    name: dep.name().to_string(),
                    error,
                }),
            }
        }

        let stats = engine.stats();
        let values = engine.into_session();
        tracing::info!(
            window = %target,
            pool = %scope.pool().validity(),
            values = values.len(),
            callbacks = stats.callbacks,
            failures = failures.len(),
            "Resolved window"
        );

        Ok(ResolveReport {
            validity: *target,
            values,
            stats,
            failures,
        })
    }

    /// Resolve several windows, each in its own session, in parallel.
    ///
    /// Results come back in the order of `targets`.
    pub fn resolve_windows(
        &self,
        targets: &[Iov],
        user_param: Option<&(dyn Any + Send + Sync)>,
    ) -> Vec<CondorResult<ResolveReport>> {
        targets
            .par_iter()
            .map(|target| self.resolve_window(target, user_param))
            .collect()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::with_valid_config(ResolverConfig::default())
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("config", &self.config)
            .field("dependencies", &self.registry.load().len())
            .field("pools", &self.pools.snapshot().len())
            .finish()
    }
}
