//! Single-session resolution engine.
//!
//! One [`ResolutionEngine`] drives one pass over one target window. Lookup
//! order for a key is fixed:
//!
//! 1. in-progress guard (a key asked for while it is being derived is a cycle)
//! 2. session pool (memoized)
//! 3. shared IOV pool (materialized; copied into the session)
//! 4. dependency registry (derive, cache in the session, return)
//!
//! Prerequisites are walked with an explicit frame stack rather than by
//! recursion, so graph depth is bounded by `max_depth`, not by the thread's
//! stack. Callbacks still get a `&mut dyn Resolver` and may call back into
//! the engine; those nested calls go through the same guard.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use condor_core::{
    CondorError, CondorResult, Dependency, DerivationContext, Iov, Key, PoolError,
    ResolutionError, Resolver, ResolverConfig, Value,
};
use condor_storage::{IovPool, PoolStats, SessionPool, ValueSource};

use crate::in_flight::InFlight;
use crate::registry::DependencyRegistry;

/// A descriptor being derived and the index of its next unresolved prerequisite.
struct Frame {
    dep: Arc<Dependency>,
    next: usize,
}

pub struct ResolutionEngine<'a> {
    registry: &'a DependencyRegistry,
    iov_pool: &'a IovPool,
    session: SessionPool,
    user_param: Option<&'a (dyn Any + Send + Sync)>,
    in_flight: InFlight,
    max_depth: usize,
    stats: PoolStats,
}

impl<'a> ResolutionEngine<'a> {
    /// Start a pass for `target` with an empty session pool.
    ///
    /// # Errors
    ///
    /// Fails with [`PoolError::TargetNotCovered`] if `iov_pool` does not
    /// cover `target`.
    pub fn new(
        registry: &'a DependencyRegistry,
        iov_pool: &'a IovPool,
        target: Iov,
    ) -> CondorResult<Self> {
        Self::with_session(registry, iov_pool, SessionPool::new(target))
    }

    /// Start a pass that continues from an existing session pool.
    pub fn with_session(
        registry: &'a DependencyRegistry,
        iov_pool: &'a IovPool,
        session: SessionPool,
    ) -> CondorResult<Self> {
        if !iov_pool.validity().contains(session.validity()) {
            return Err(PoolError::TargetNotCovered {
                target: *session.validity(),
                pool: *iov_pool.validity(),
            }
            .into());
        }

        Ok(Self {
            registry,
            iov_pool,
            session,
            user_param: None,
            in_flight: InFlight::new(),
            max_depth: ResolverConfig::default().max_depth,
            stats: PoolStats::default(),
        })
    }

    /// Parameter handed to every callback of this pass.
    pub fn with_user_param(mut self, param: &'a (dyn Any + Send + Sync)) -> Self {
        self.user_param = Some(param);
        self
    }

    /// Limit on nested derivations. A limit below 1 is raised to 1.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Apply the per-session settings of `config`.
    pub fn with_config(self, config: &ResolverConfig) -> Self {
        self.with_max_depth(config.max_depth)
    }

    /// Derive the target of `dep` without going through the registry.
    ///
    /// Returns the cached value if the target is already materialized.
    pub fn resolve_dependency(&mut self, dep: &Dependency) -> CondorResult<Value> {
        if let Some(value) = self.ready(dep.target())? {
            return Ok(value);
        }
        self.derive_from(Arc::new(dep.clone()))
    }

    /// [`ResolutionEngine::resolve_dependency`] for a descriptor already
    /// held in an [`Arc`], such as one taken from a registry.
    pub fn resolve_shared(&mut self, dep: &Arc<Dependency>) -> CondorResult<Value> {
        if let Some(value) = self.ready(dep.target())? {
            return Ok(value);
        }
        self.derive_from(Arc::clone(dep))
    }

    /// Number of derived values computed so far.
    pub fn num_callbacks(&self) -> u64 {
        self.stats.callbacks
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn target(&self) -> &Iov {
        self.session.validity()
    }

    pub fn session(&self) -> &SessionPool {
        &self.session
    }

    /// End the pass, keeping everything it resolved.
    pub fn into_session(self) -> SessionPool {
        self.session
    }

    pub fn registry(&self) -> &'a DependencyRegistry {
        self.registry
    }

    pub fn iov_pool(&self) -> &'a IovPool {
        self.iov_pool
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    // ------------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------------

    /// Cycle check plus cached lookup for a descriptor entry point.
    fn ready(&mut self, key: Key) -> CondorResult<Option<Value>> {
        if self.in_flight.contains(key) {
            return Err(self.cycle(key));
        }
        self.materialized(key)
    }

    fn cycle(&self, key: Key) -> CondorError {
        let chain = self.in_flight.chain_from(key);
        tracing::debug!(key = %key, depth = chain.len(), "Cyclic dependency");
        ResolutionError::CyclicDependency { key, chain }.into()
    }

    /// Session or IOV pool value for `key`, copying pool hits into the session.
    fn materialized(&mut self, key: Key) -> CondorResult<Option<Value>> {
        if let Some(value) = self.session.get(key) {
            self.stats.session_hits += 1;
            tracing::trace!(key = %key, "Session pool hit");
            return Ok(Some(value.clone()));
        }

        if let Some(value) = self.iov_pool.lookup(key) {
            self.session.insert(value.clone())?;
            self.stats.iov_hits += 1;
            tracing::trace!(key = %key, window = %value.validity(), "IOV pool hit");
            return Ok(Some(value));
        }

        Ok(None)
    }

    /// Derive `root`, clearing every mark set on the way if it fails.
    fn derive_from(&mut self, root: Arc<Dependency>) -> CondorResult<Value> {
        let base = self.in_flight.len();
        let key = root.target();
        let result = self.run_frames(root);
        if let Err(err) = &result {
            self.in_flight.unwind_to(base);
            tracing::debug!(key = %key, error = %err, "Derivation aborted");
        }
        result
    }

    fn run_frames(&mut self, root: Arc<Dependency>) -> CondorResult<Value> {
        let root_key = root.target();
        let mut stack = Vec::new();
        self.push_frame(root, &mut stack)?;

        let mut resolved = None;
        while let Some(frame) = stack.last_mut() {
            match frame.dep.depends_on().get(frame.next).copied() {
                Some(prereq) => {
                    frame.next += 1;
                    if self.in_flight.contains(prereq) {
                        return Err(self.cycle(prereq));
                    }
                    if self.materialized(prereq)?.is_some() {
                        continue;
                    }
                    let dep = self
                        .registry
                        .get(prereq)
                        .ok_or(ResolutionError::UnresolvedKey { key: prereq })?;
                    self.push_frame(dep, &mut stack)?;
                }
                None => {
                    let dep = Arc::clone(&frame.dep);
                    stack.pop();
                    resolved = Some(self.compute(&dep)?);
                }
            }
        }

        resolved.ok_or_else(|| ResolutionError::UnresolvedKey { key: root_key }.into())
    }

    fn push_frame(&mut self, dep: Arc<Dependency>, stack: &mut Vec<Frame>) -> CondorResult<()> {
        let key = dep.target();
        if self.in_flight.len() >= self.max_depth {
            return Err(ResolutionError::DepthExceeded {
                key,
                limit: self.max_depth,
            }
            .into());
        }
        if !self.in_flight.enter(key) {
            return Err(self.cycle(key));
        }
        stack.push(Frame { dep, next: 0 });
        Ok(())
    }

    /// Run the callback of `dep`, whose prerequisites are all in the session.
    fn compute(&mut self, dep: &Dependency) -> CondorResult<Value> {
        let key = dep.target();
        let validity = *self.session.validity();
        let inputs = dep
            .depends_on()
            .iter()
            .map(|k| {
                self.session
                    .get(*k)
                    .cloned()
                    .ok_or_else(|| CondorError::from(ResolutionError::UnresolvedKey { key: *k }))
            })
            .collect::<CondorResult<Vec<Value>>>()?;
        let user_param = self.user_param;

        tracing::debug!(
            key = %key,
            name = dep.name(),
            inputs = inputs.len(),
            window = %validity,
            "Invoking derivation callback"
        );
        let derived = {
            let mut ctx = DerivationContext::new(key, validity, &inputs, user_param, self);
            dep.derive(&mut ctx)?
        };

        let mut value = derived.into_value(key, validity).with_name(dep.name());
        if !key.scope().is_root() {
            value = value.with_owner(key.scope());
        }
        self.session.insert(value.clone())?;
        self.in_flight.leave(key);
        self.stats.callbacks += 1;
        Ok(value)
    }
}

impl Resolver for ResolutionEngine<'_> {
    fn required_validity(&self) -> &Iov {
        self.session.validity()
    }

    fn get(&mut self, key: Key) -> CondorResult<Value> {
        if self.in_flight.contains(key) {
            return Err(self.cycle(key));
        }
        if let Some(value) = self.materialized(key)? {
            return Ok(value);
        }
        let dep = self
            .registry
            .get(key)
            .ok_or(ResolutionError::UnresolvedKey { key })?;
        self.derive_from(dep)
    }
}

impl fmt::Debug for ResolutionEngine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionEngine")
            .field("target", self.session.validity())
            .field("session_values", &self.session.len())
            .field("in_flight", &self.in_flight.len())
            .field("max_depth", &self.max_depth)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
