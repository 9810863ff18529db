//! Property tests for cycle detection
//!
//! A path is always acyclic; closing it with any back edge (including a
//! self-loop) must be rejected, and the reported region must contain the
//! closed part of the path but none of the nodes downstream of it.

use proptest::prelude::*;
use stagegate::graph::{cyclic_region, is_acyclic};
use stagegate::prelude::*;
use std::collections::BTreeMap;

fn name(i: usize) -> String {
    format!("n{i:02}")
}

fn path(len: usize, phases: &[Phase]) -> DependencyManager {
    let mut manager = DependencyManager::new();
    for i in 0..len {
        manager.register_node(name(i)).unwrap();
    }
    for i in 1..len {
        let phase = phases[i % phases.len()];
        manager
            .add_dependency(&name(i), phase, &name(i - 1), phase)
            .unwrap();
    }
    manager
}

fn phase() -> impl Strategy<Value = Phase> {
    prop::sample::select(Phase::ALL.to_vec())
}

proptest! {
    #[test]
    fn path_is_acyclic(len in 1usize..16, phases in prop::collection::vec(phase(), 1..5)) {
        let manager = path(len, &phases);
        prop_assert!(manager.check_acyclicity().is_ok());
        prop_assert_eq!(manager.freeze().unwrap().len(), len);
    }

    #[test]
    fn back_edge_closes_a_cycle(
        (len, from, to) in (2usize..16).prop_flat_map(|len| (Just(len), 0..len, 0..len)),
        depender_phase in phase(),
        dependee_phase in phase(),
    ) {
        // `lo` waits on `hi`, where `hi` already (transitively) waits on `lo`.
        let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
        let mut manager = path(len, &[Phase::Create]);
        manager
            .add_dependency(&name(lo), depender_phase, &name(hi), dependee_phase)
            .unwrap();

        // Repeated checks agree.
        let first = manager.check_acyclicity();
        prop_assert!(first.is_err());
        prop_assert_eq!(&first, &manager.check_acyclicity());
        match manager.freeze() {
            Err(DependencyError::CyclicDependencies { region, .. }) => {
                prop_assert!(region.contains(&name(lo)));
                prop_assert!(region.contains(&name(hi)));
                for downstream in hi + 1..len {
                    prop_assert!(!region.contains(&name(downstream)));
                }
            }
            other => prop_assert!(false, "expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn adjacency_map_without_back_edges_is_acyclic(
        edges in prop::collection::vec((0usize..10, 0usize..10), 0..40),
    ) {
        // Edges only point from lower to higher indices, so no cycle can form.
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (a, b) in edges {
            if a < b {
                map.entry(name(a)).or_default().push(name(b));
            }
        }
        prop_assert!(is_acyclic(&map));
        prop_assert_eq!(cyclic_region(&map), None);
    }
}
