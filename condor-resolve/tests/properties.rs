//! Property tests over generated acyclic graphs.

use condor_resolve::{DependencyRegistry, ResolutionEngine};
use condor_test_utils::fixtures::{self, node_key};
use condor_test_utils::generators::{arb_chain_len, arb_dag, arb_window_within};
use condor_test_utils::{CallCounter, Iov, IovKind, Resolver};
use proptest::prelude::*;

fn outer() -> Iov {
    Iov::new(IovKind::Run, -1_000, 1_000).expect("valid window")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every value handed out for a window covers that window.
    #[test]
    fn prop_resolved_values_cover_target(
        edges in arb_dag(16),
        target in arb_window_within(outer()),
    ) {
        let calls = CallCounter::new();
        let (deps, pool) = fixtures::dag(&edges, &calls);
        let registry = DependencyRegistry::from_dependencies(deps).expect("registry builds");
        let mut engine = ResolutionEngine::new(&registry, &pool, target).expect("engine");

        for i in 0..edges.len() {
            let value = engine.get(node_key(i)).expect("acyclic graph resolves");
            prop_assert!(value.validity().contains(&target));
        }
    }

    /// Callbacks run at most once per derived node, however often each is asked for.
    #[test]
    fn prop_callbacks_bounded_by_derived_nodes(edges in arb_dag(16), repeats in 1usize..4) {
        let calls = CallCounter::new();
        let (deps, pool) = fixtures::dag(&edges, &calls);
        let derived = deps.len();
        let registry = DependencyRegistry::from_dependencies(deps).expect("registry builds");
        let mut engine = ResolutionEngine::new(&registry, &pool, outer()).expect("engine");

        for _ in 0..repeats {
            for i in (0..edges.len()).rev() {
                engine.get(node_key(i)).expect("acyclic graph resolves");
            }
        }
        prop_assert!(calls.get() <= derived);
        prop_assert_eq!(engine.num_callbacks() as usize, calls.get());
    }

    /// A chain's top node equals the single stored leaf, whatever its length.
    #[test]
    fn prop_chain_value(len in arb_chain_len(64)) {
        let calls = CallCounter::new();
        let (deps, pool) = fixtures::chain(len, &calls);
        let registry = DependencyRegistry::from_dependencies(deps).expect("registry builds");
        let mut engine = ResolutionEngine::new(&registry, &pool, outer()).expect("engine");

        let top = engine.get(node_key(len)).expect("chain resolves");
        prop_assert_eq!(*top.get::<u64>().expect("u64"), 1);
        prop_assert_eq!(calls.get(), len);
    }
}
