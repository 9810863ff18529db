//! Cycle detection by iterative leaf pruning
//!
//! Works on a `dependee -> [dependers]` adjacency map, a variant of Kahn's
//! algorithm:
//!
//! 1. An empty map is acyclic.
//! 2. Nodes nobody depends on any more are leaves.
//! 3. If nodes remain but none of them is a leaf, the rest contains a cycle.
//! 4. Otherwise drop the leaves from the map and from every depender list,
//!    then go again.
//!
//! Every round removes at least one node or stops, so the loop terminates.
//! A node depending on itself never becomes a leaf and is caught by the
//! same rule as any longer cycle.

use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Returns the nodes that cannot be pruned, or `None` if the graph is acyclic.
///
/// The returned region contains every node of every cycle, plus the nodes
/// those cycles still depend on. Nodes that only appear as dependers are
/// treated as nodes without dependers of their own.
pub fn cyclic_region(dependers: &BTreeMap<String, Vec<String>>) -> Option<Vec<String>> {
    let mut remaining: BTreeMap<&str, BTreeSet<&str>> = dependers
        .iter()
        .map(|(dependee, list)| {
            (
                dependee.as_str(),
                list.iter().map(String::as_str).collect::<BTreeSet<_>>(),
            )
        })
        .collect();

    for depender in dependers.values().flatten() {
        remaining.entry(depender.as_str()).or_default();
    }

    let mut round = 1;
    loop {
        if remaining.is_empty() {
            trace!("dependency graph validated as acyclic after {} rounds", round - 1);
            return None;
        }

        trace!(round, "cycle check round:\n{}", render_round(&remaining));

        let leaves: BTreeSet<&str> = remaining
            .iter()
            .filter(|(_, list)| list.is_empty())
            .map(|(name, _)| *name)
            .collect();

        if leaves.is_empty() {
            return Some(remaining.keys().map(|name| name.to_string()).collect());
        }

        remaining.retain(|name, _| !leaves.contains(name));
        for list in remaining.values_mut() {
            list.retain(|depender| !leaves.contains(depender));
        }

        round += 1;
    }
}

/// Returns true if the adjacency map contains no cycle
pub fn is_acyclic(dependers: &BTreeMap<String, Vec<String>>) -> bool {
    cyclic_region(dependers).is_none()
}

fn render_round(remaining: &BTreeMap<&str, BTreeSet<&str>>) -> String {
    remaining
        .iter()
        .map(|(dependee, list)| {
            let list: Vec<&str> = list.iter().copied().collect();
            format!("{} <- [ {} ]", dependee, list.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjacency(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(dependee, dependers)| {
                (
                    dependee.to_string(),
                    dependers.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_graph_is_acyclic() {
        assert!(is_acyclic(&BTreeMap::new()));
    }

    #[test]
    fn test_single_node() {
        assert!(is_acyclic(&adjacency(&[("node1", &[])])));
    }

    #[test]
    fn test_chain_is_acyclic() {
        let graph = adjacency(&[
            ("node1", &["node2"]),
            ("node2", &["node3"]),
            ("node3", &["node4"]),
            ("node4", &["node5"]),
            ("node5", &["node6"]),
            ("node6", &["node7"]),
            ("node7", &[]),
        ]);
        assert!(is_acyclic(&graph));
    }

    #[test]
    fn test_ring_is_cyclic() {
        let graph = adjacency(&[
            ("node1", &["node2"]),
            ("node2", &["node3"]),
            ("node3", &["node4"]),
            ("node4", &["node5"]),
            ("node5", &["node6"]),
            ("node6", &["node7"]),
            ("node7", &["node1"]),
        ]);
        let region = cyclic_region(&graph).unwrap();
        assert_eq!(region.len(), 7);
    }

    #[test]
    fn test_dense_dag_is_acyclic() {
        let graph = adjacency(&[
            ("node1", &[]),
            ("node2", &["node1"]),
            ("node3", &["node1", "node2"]),
            ("node4", &["node1", "node2", "node3"]),
            ("node5", &["node2"]),
            ("node6", &["node7"]),
            ("node7", &["node1", "node2", "node3", "node5"]),
        ]);
        assert!(is_acyclic(&graph));
    }

    #[test]
    fn test_self_loop_is_cyclic() {
        let graph = adjacency(&[("node1", &["node1"]), ("node2", &[])]);
        assert_eq!(cyclic_region(&graph), Some(vec!["node1".to_string()]));
    }

    #[test]
    fn test_partial_cycle_next_to_acyclic_region() {
        // b <-> c form a cycle; a and d hang off it, e and f are independent
        let graph = adjacency(&[
            ("a", &["b"]),
            ("b", &["c"]),
            ("c", &["b", "d"]),
            ("d", &[]),
            ("e", &["f"]),
            ("f", &[]),
        ]);
        let region = cyclic_region(&graph).unwrap();
        assert_eq!(region, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_depender_without_own_entry() {
        let graph = adjacency(&[("node1", &["node2"])]);
        assert!(is_acyclic(&graph));
    }

    #[test]
    fn test_repeated_check_is_stable() {
        let graph = adjacency(&[("x", &["y"]), ("y", &["x"])]);
        assert_eq!(cyclic_region(&graph), cyclic_region(&graph));
    }
}
