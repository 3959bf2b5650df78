//! CONDOR Test Utilities
//!
//! Shared test infrastructure for the CONDOR workspace:
//! - Proptest generators for windows, keys and acyclic dependency graphs
//! - Fixtures for the common resolution scenarios
//! - A map-backed stub resolver for exercising callbacks in isolation
//! - Custom assertions for CONDOR error variants

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Re-export core types for convenience
pub use condor_core::{
    CondorError, CondorResult, Dependency, DerivationContext, Derived, Iov, IovKind, Key,
    PoolError, ResolutionError, Resolver, ScopeId, Value, ValueError,
};
pub use condor_storage::{IovPool, SessionPool};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// TRACING
// ============================================================================

/// Filter used when `RUST_LOG` is unset: debug for every workspace crate.
pub const DEFAULT_LOG_FILTER: &str = "condor_core=debug,condor_storage=debug,condor_resolve=debug";

/// Install a test-friendly subscriber once per process.
///
/// `RUST_LOG` overrides [`DEFAULT_LOG_FILTER`]. Later calls are no-ops.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

// ============================================================================
// STUB RESOLVER
// ============================================================================

/// Map-backed [`Resolver`] that records every key it was asked for.
#[derive(Debug, Clone)]
pub struct StubResolver {
    validity: Iov,
    values: HashMap<Key, Value>,
    requests: Vec<Key>,
}

impl StubResolver {
    pub fn new(validity: Iov) -> Self {
        Self {
            validity,
            values: HashMap::new(),
            requests: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.insert(value);
        self
    }

    pub fn insert(&mut self, value: Value) {
        self.values.insert(value.key(), value);
    }

    /// Keys requested so far, in order.
    pub fn requests(&self) -> &[Key] {
        &self.requests
    }

    /// Run `dep`'s callback against this resolver.
    ///
    /// Prerequisites are fetched with [`Resolver::get`], so they must already
    /// be stored here.
    pub fn derive(&mut self, dep: &Dependency) -> CondorResult<Value> {
        let inputs = dep
            .depends_on()
            .iter()
            .map(|key| self.get(*key))
            .collect::<CondorResult<Vec<_>>>()?;
        let validity = self.validity;
        let derived = {
            let mut ctx = DerivationContext::new(dep.target(), validity, &inputs, None, self);
            dep.derive(&mut ctx)?
        };
        Ok(derived.into_value(dep.target(), validity))
    }
}

impl Resolver for StubResolver {
    fn required_validity(&self) -> &Iov {
        &self.validity
    }

    fn get(&mut self, key: Key) -> CondorResult<Value> {
        self.requests.push(key);
        self.values
            .get(&key)
            .cloned()
            .ok_or_else(|| ResolutionError::UnresolvedKey { key }.into())
    }
}

/// Counts callback invocations; clones share the count.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for CONDOR types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a window kind.
    pub fn arb_iov_kind() -> impl Strategy<Value = IovKind> {
        prop_oneof![
            Just(IovKind::Run),
            Just(IovKind::Sequence),
            Just(IovKind::Timestamp),
            (0u32..8).prop_map(IovKind::Custom),
        ]
    }

    /// Generate a non-empty run window.
    pub fn arb_iov() -> impl Strategy<Value = Iov> {
        (-10_000i64..10_000, 1i64..5_000).prop_map(|(lower, len)| {
            Iov::new(IovKind::Run, lower, lower + len).expect("non-empty window")
        })
    }

    /// Generate a non-empty window contained in `outer`.
    pub fn arb_window_within(outer: Iov) -> impl Strategy<Value = Iov> {
        let (lower, upper) = (outer.lower(), outer.upper());
        (lower..upper)
            .prop_flat_map(move |start| (Just(start), (start + 1)..=upper))
            .prop_map(move |(start, end)| {
                Iov::new(outer.kind(), start, end).expect("non-empty window")
            })
    }

    /// Generate a scope identity.
    pub fn arb_scope_id() -> impl Strategy<Value = ScopeId> {
        any::<u32>().prop_map(ScopeId::from_hash)
    }

    /// Generate a key with a random scope and an identifier-like name.
    pub fn arb_key() -> impl Strategy<Value = Key> {
        (arb_scope_id(), "[A-Za-z][A-Za-z0-9_]{0,15}")
            .prop_map(|(scope, name)| Key::new(scope, &name))
    }

    /// Generate a chain length.
    pub fn arb_chain_len(max_len: usize) -> impl Strategy<Value = usize> {
        1..=max_len
    }

    /// Generate an acyclic graph as adjacency lists.
    ///
    /// Node `i` only depends on nodes below `i`; node 0 never has
    /// prerequisites.
    pub fn arb_dag(max_nodes: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
        (1..=max_nodes.max(1)).prop_flat_map(|nodes| {
            (0..nodes)
                .map(|i| {
                    if i == 0 {
                        Just(Vec::new()).boxed()
                    } else {
                        prop::collection::btree_set(0..i, 0..=i.min(3))
                            .prop_map(|deps| deps.into_iter().collect::<Vec<usize>>())
                            .boxed()
                    }
                })
                .collect::<Vec<_>>()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made registries and pools.

    use super::*;

    /// Run window `[lower, upper)`.
    pub fn run(lower: i64, upper: i64) -> Iov {
        Iov::new(IovKind::Run, lower, upper).expect("valid window")
    }

    /// Key of graph node `index`.
    pub fn node_key(index: usize) -> Key {
        Key::global(&format!("node{}", index))
    }

    /// Width and Height stored over `[0, 100)`, Area derived from both.
    pub struct AreaScenario {
        pub width: Key,
        pub height: Key,
        pub area: Key,
        pub dependencies: Vec<Dependency>,
        pub pool: IovPool,
        pub calls: CallCounter,
    }

    pub fn area_scenario() -> AreaScenario {
        let width = Key::global("Width");
        let height = Key::global("Height");
        let area = Key::global("Area");
        let calls = CallCounter::new();

        let counter = calls.clone();
        let dependency = Dependency::new(
            area,
            "Area",
            vec![width, height],
            move |ctx: &mut DerivationContext<'_>| {
                counter.bump();
                let w = *ctx.input::<f64>(0)?;
                let h = *ctx.input::<f64>(1)?;
                Ok(Derived::new(w * h))
            },
        );
        let pool = IovPool::from_values(
            run(0, 100),
            vec![
                Value::new(width, run(0, 100), 3.0f64),
                Value::new(height, run(0, 100), 4.0f64),
            ],
        )
        .expect("area pool builds");

        AreaScenario {
            width,
            height,
            area,
            dependencies: vec![dependency],
            pool,
            calls,
        }
    }

    /// Dependencies and pool for the graph described by `edges`.
    ///
    /// Nodes without prerequisites are stored in an unbounded run pool with
    /// payload `1u64`; every other node derives the sum of its inputs. Each
    /// callback bumps `calls`.
    pub fn dag(edges: &[Vec<usize>], calls: &CallCounter) -> (Vec<Dependency>, IovPool) {
        let window = Iov::unbounded(IovKind::Run);
        let mut leaves = Vec::new();
        let mut dependencies = Vec::new();

        for (index, deps) in edges.iter().enumerate() {
            let key = node_key(index);
            if deps.is_empty() {
                leaves.push(Value::new(key, window, 1u64));
                continue;
            }
            let counter = calls.clone();
            dependencies.push(Dependency::new(
                key,
                format!("node{}", index),
                deps.iter().map(|d| node_key(*d)).collect(),
                move |ctx: &mut DerivationContext<'_>| {
                    counter.bump();
                    let mut total = 0u64;
                    for input in ctx.inputs() {
                        total += *input.get::<u64>()?;
                    }
                    Ok(Derived::new(total))
                },
            ));
        }

        let pool = IovPool::from_values(window, leaves).expect("leaf pool builds");
        (dependencies, pool)
    }

    /// `len` derived nodes, each depending on the one below; node 0 is stored.
    pub fn chain(len: usize, calls: &CallCounter) -> (Vec<Dependency>, IovPool) {
        let edges: Vec<Vec<usize>> = (0..=len)
            .map(|i| if i == 0 { Vec::new() } else { vec![i - 1] })
            .collect();
        dag(&edges, calls)
    }

    /// Node 3 depends on 1 and 2, both of which depend on stored node 0.
    pub fn diamond(calls: &CallCounter) -> (Vec<Dependency>, IovPool) {
        dag(&[vec![], vec![0], vec![0], vec![1, 2]], calls)
    }

    /// A depends on B and B depends on A.
    pub fn cyclic_pair() -> (Key, Key, Vec<Dependency>) {
        let a = Key::global("CycleA");
        let b = Key::global("CycleB");
        let forward = |_ctx: &mut DerivationContext<'_>| -> CondorResult<Derived> {
            Ok(Derived::new(0u8))
        };
        (
            a,
            b,
            vec![
                Dependency::new(a, "CycleA", vec![b], forward),
                Dependency::new(b, "CycleB", vec![a], forward),
            ],
        )
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for CONDOR results.

    use super::*;

    /// Assert that a result failed with unresolved-key for `key`.
    #[track_caller]
    pub fn assert_unresolved<T: std::fmt::Debug>(result: &CondorResult<T>, key: Key) {
        match result {
            Err(CondorError::Resolution(ResolutionError::UnresolvedKey { key: k })) if *k == key => {}
            other => panic!("Expected UnresolvedKey for {}, got: {:?}", key, other),
        }
    }

    /// Assert that a result failed with a cycle through `key`.
    #[track_caller]
    pub fn assert_cycle<T: std::fmt::Debug>(result: &CondorResult<T>, key: Key) {
        match result {
            Err(CondorError::Resolution(ResolutionError::CyclicDependency { chain, .. })) => {
                assert!(
                    chain.contains(&key),
                    "Cycle chain {:?} does not pass through {}",
                    chain,
                    key
                );
                assert_eq!(
                    chain.first(),
                    chain.last(),
                    "Cycle chain {:?} is not closed",
                    chain
                );
            }
            other => panic!("Expected CyclicDependency through {}, got: {:?}", key, other),
        }
    }

    /// Assert that a result is a type-mismatch error.
    #[track_caller]
    pub fn assert_type_mismatch<T: std::fmt::Debug>(result: &CondorResult<T>) {
        match result {
            Err(CondorError::Value(ValueError::TypeMismatch { .. })) => {}
            other => panic!("Expected TypeMismatch error, got: {:?}", other),
        }
    }

    /// Assert that a result failed with duplicate-key for `key`.
    #[track_caller]
    pub fn assert_duplicate<T: std::fmt::Debug>(result: &CondorResult<T>, key: Key) {
        match result {
            Err(CondorError::Pool(PoolError::DuplicateKey { key: k, .. })) if *k == key => {}
            other => panic!("Expected DuplicateKey for {}, got: {:?}", key, other),
        }
    }

    /// Assert that a callback failure was reported for `key`.
    #[track_caller]
    pub fn assert_callback_failed<T: std::fmt::Debug>(result: &CondorResult<T>, key: Key) {
        match result {
            Err(CondorError::Resolution(ResolutionError::CallbackFailed { key: k, .. }))
                if *k == key => {}
            other => panic!("Expected CallbackFailed for {}, got: {:?}", key, other),
        }
    }

    /// Assert that `value` is valid over all of `window`.
    #[track_caller]
    pub fn assert_covers(value: &Value, window: &Iov) {
        assert!(
            value.validity().contains(window),
            "Value {} valid for {} does not cover {}",
            value.key(),
            value.validity(),
            window
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
