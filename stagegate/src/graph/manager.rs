//! Dependency manager and scheduler
//!
//! Construction and execution are two different types:
//!
//! - [`DependencyManager`] is the builder. Nodes are registered and edges
//!   are added through `&mut self` on a single thread.
//! - [`DependencyScheduler`] is what node tasks share. It is only obtained
//!   through [`DependencyManager::freeze`], which consumes the manager after
//!   checking the graph for cycles, and only offers `enter`/`signal_done`.
//!
//! A gate count is therefore fixed before any task can observe it. Adding an
//! edge after execution has started does not compile.
//!
//! # Liveness
//!
//! The scheduler does not detect a prerequisite that never signals. A node
//! task that crashes without calling [`DependencyScheduler::signal_done`] or
//! [`DependencyScheduler::signal_failed`] leaves its dependers blocked in
//! [`DependencyScheduler::enter`] until the driver times out or cancels them.

use super::acyclic::cyclic_region;
use super::error::{DependencyError, DependencyResult};
use super::gate::Release;
use super::node::{Depender, DependencyNode};
use crate::core::{Phase, WaitFor};
use petgraph::dot::Dot;
use petgraph::graph::DiGraph;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, error, warn};

/// Registry shared by the builder and the frozen scheduler
#[derive(Debug, Default)]
struct NodeTable {
    nodes: Vec<DependencyNode>,
    index: HashMap<String, usize>,
}

impl NodeTable {
    fn lookup(&self, name: &str) -> DependencyResult<&DependencyNode> {
        self.index
            .get(name)
            .map(|&idx| &self.nodes[idx])
            .ok_or_else(|| DependencyError::nodes_not_found([name]))
    }

    fn check_nodes_exist(&self, names: &[&str]) -> DependencyResult<()> {
        let mut missing: Vec<&str> = Vec::new();
        for name in names {
            if !self.index.contains_key(*name) && !missing.contains(name) {
                missing.push(*name);
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DependencyError::nodes_not_found(missing))
        }
    }

    /// `dependee -> [dependers]` projected onto node names, all phases collapsed,
    /// dependers sorted and deduplicated
    fn dependency_map(&self) -> BTreeMap<String, Vec<String>> {
        self.nodes
            .iter()
            .map(|node| {
                let mut dependers: Vec<String> = node
                    .all_dependers()
                    .map(|(_, depender)| self.nodes[depender.node].name().to_string())
                    .collect();
                dependers.sort();
                dependers.dedup();
                (node.name().to_string(), dependers)
            })
            .collect()
    }

    fn check_acyclicity(&self) -> DependencyResult<()> {
        debug!("dependencies:\n{}", self);

        match cyclic_region(&self.dependency_map()) {
            None => Ok(()),
            Some(region) => Err(DependencyError::cyclic(region, self.to_string())),
        }
    }

    fn to_dot(&self) -> String {
        let mut graph = DiGraph::<&str, String>::new();
        let indices: Vec<_> = self
            .nodes
            .iter()
            .map(|node| graph.add_node(node.name()))
            .collect();

        for (dependee, node) in self.nodes.iter().enumerate() {
            for (phase, depender) in node.all_dependers() {
                graph.add_edge(
                    indices[dependee],
                    indices[depender.node],
                    format!("{}→{}", phase, depender.phase),
                );
            }
        }

        format!("{}", Dot::new(&graph))
    }
}

impl fmt::Display for NodeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .dependency_map()
            .into_iter()
            .map(|(dependee, dependers)| format!("{} -> [ {} ]", dependee, dependers.join(", ")))
            .collect();
        f.write_str(&lines.join("\n"))
    }
}

/// Builds the dependency graph of one deployment run.
///
/// # Example
///
/// ```
/// use stagegate::core::Phase;
/// use stagegate::graph::DependencyManager;
///
/// let mut manager = DependencyManager::new();
/// manager.register_node("spine1").unwrap();
/// manager.register_node("leaf1").unwrap();
///
/// // leaf1 may only be configured once spine1 is healthy
/// manager
///     .add_dependency("leaf1", Phase::Configure, "spine1", Phase::Healthy)
///     .unwrap();
///
/// assert_eq!(manager.to_string(), "leaf1 -> [  ]\nspine1 -> [ leaf1 ]");
/// let scheduler = manager.freeze().unwrap();
/// assert!(scheduler.must_wait("spine1", Phase::Healthy).unwrap());
/// ```
#[derive(Debug, Default)]
pub struct DependencyManager {
    table: NodeTable,
}

impl DependencyManager {
    /// Creates an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered nodes
    pub fn len(&self) -> usize {
        self.table.nodes.len()
    }

    /// Returns true if no node is registered
    pub fn is_empty(&self) -> bool {
        self.table.nodes.is_empty()
    }

    /// Returns true if the node is registered
    pub fn contains(&self, name: &str) -> bool {
        self.table.index.contains_key(name)
    }

    /// Registers a node with all gates open and no dependers.
    ///
    /// Registering a name twice is an error.
    pub fn register_node(&mut self, name: impl Into<String>) -> DependencyResult<()> {
        let name = name.into();
        if self.table.index.contains_key(&name) {
            return Err(DependencyError::duplicate_node(name));
        }

        let idx = self.table.nodes.len();
        self.table.index.insert(name.clone(), idx);
        self.table.nodes.push(DependencyNode::new(name));
        Ok(())
    }

    /// Records that `depender_phase` of `depender` waits for `dependee` to
    /// complete `dependee_phase`.
    ///
    /// Both names are checked before anything changes; the error lists every
    /// unknown name, not just the first one.
    pub fn add_dependency(
        &mut self,
        depender: &str,
        depender_phase: Phase,
        dependee: &str,
        dependee_phase: Phase,
    ) -> DependencyResult<()> {
        self.table.check_nodes_exist(&[depender, dependee])?;

        let depender_idx = self.table.index[depender];
        let dependee_idx = self.table.index[dependee];

        self.table.nodes[depender_idx].arm(depender_phase);
        self.table.nodes[dependee_idx].add_depender(
            dependee_phase,
            Depender {
                node: depender_idx,
                phase: depender_phase,
            },
        );

        debug!(
            "added dependency: {}@{} waits for {}@{}",
            depender, depender_phase, dependee, dependee_phase
        );
        Ok(())
    }

    /// Checks that the node-level projection of all edges contains no cycle
    pub fn check_acyclicity(&self) -> DependencyResult<()> {
        self.table.check_acyclicity()
    }

    /// Ends construction.
    ///
    /// Checks acyclicity and hands out the scheduler used by node tasks. The
    /// manager is consumed, so no edge can be added afterwards.
    pub fn freeze(self) -> DependencyResult<DependencyScheduler> {
        self.check_acyclicity()?;
        Ok(DependencyScheduler { table: self.table })
    }

    /// Returns the multi-line adjacency listing (`dependee -> [ dependers ]`)
    pub fn describe(&self) -> String {
        self.table.to_string()
    }

    /// Renders the graph in Graphviz DOT format
    pub fn to_dot(&self) -> String {
        self.table.to_dot()
    }
}

impl fmt::Display for DependencyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.table, f)
    }
}

/// How a node was let into a phase by [`DependencyScheduler::enter`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Admission {
    /// Every prerequisite completed normally
    Clear,
    /// Every prerequisite signalled, but some of them signalled a failure
    Degraded {
        /// The prerequisites that failed
        failed: Vec<WaitFor>,
    },
}

impl Admission {
    /// Returns true if no prerequisite failed
    pub fn is_clear(&self) -> bool {
        matches!(self, Admission::Clear)
    }
}

/// The frozen dependency graph, shared by all node tasks of a run.
///
/// Obtained from [`DependencyManager::freeze`]. All methods take `&self`;
/// wrap the scheduler in an `Arc` to hand it to tasks.
#[derive(Debug)]
pub struct DependencyScheduler {
    table: NodeTable,
}

impl DependencyScheduler {
    /// Returns the number of registered nodes
    pub fn len(&self) -> usize {
        self.table.nodes.len()
    }

    /// Returns true if no node is registered
    pub fn is_empty(&self) -> bool {
        self.table.nodes.is_empty()
    }

    /// Names of all nodes in registration order
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.table.nodes.iter().map(DependencyNode::name)
    }

    /// Waits until every prerequisite of `phase` of the node has signalled.
    ///
    /// Returns immediately if nothing is outstanding. Fails only if the node
    /// is unknown.
    pub async fn enter(&self, name: &str, phase: Phase) -> DependencyResult<Admission> {
        let node = self.table.lookup(name)?;

        debug!(node = name, %phase, "stage change: enter wait");
        let failed = node.gate(phase).wait().await;
        debug!(node = name, %phase, "stage change: enter go");

        if failed.is_empty() {
            Ok(Admission::Clear)
        } else {
            Ok(Admission::Degraded { failed })
        }
    }

    /// Signals that the node finished `phase`.
    ///
    /// Every depender waiting on that phase gets one prerequisite closer to
    /// proceeding. Never blocks. Must be called at most once per node and
    /// phase; an unknown node is logged and ignored.
    pub fn signal_done(&self, name: &str, phase: Phase) {
        self.signal(name, phase, false);
    }

    /// Signals that the node gave up on `phase`.
    ///
    /// Dependers are unblocked like with [`signal_done`](Self::signal_done),
    /// but their [`enter`](Self::enter) returns [`Admission::Degraded`]
    /// naming this node and phase.
    pub fn signal_failed(&self, name: &str, phase: Phase) {
        self.signal(name, phase, true);
    }

    fn signal(&self, name: &str, phase: Phase, failed: bool) {
        let node = match self.table.lookup(name) {
            Ok(node) => node,
            Err(err) => {
                error!("cannot signal {}@{}: {}", name, phase, err);
                return;
            }
        };

        debug!(node = name, %phase, failed, "stage change: done");

        let failure = failed.then(|| WaitFor::new(name, phase));
        for depender in node.dependers(phase) {
            let target = &self.table.nodes[depender.node];
            debug!(
                "node {} unblocking {}@{}",
                name,
                target.name(),
                depender.phase
            );

            if target.gate(depender.phase).release(failure.as_ref()) == Release::Underflow {
                warn!(
                    "gate of {}@{} was already open when {}@{} signalled, signal ignored",
                    target.name(),
                    depender.phase,
                    name,
                    phase
                );
            }
        }
    }

    /// Returns true if another node waits on `phase` of this node
    pub fn must_wait(&self, name: &str, phase: Phase) -> DependencyResult<bool> {
        Ok(!self.table.lookup(name)?.dependers(phase).is_empty())
    }

    /// Number of prerequisites of `phase` that have not signalled yet
    pub fn remaining(&self, name: &str, phase: Phase) -> DependencyResult<usize> {
        Ok(self.table.lookup(name)?.gate(phase).remaining())
    }

    /// Re-runs the cycle check; the result never changes for a frozen graph
    pub fn check_acyclicity(&self) -> DependencyResult<()> {
        self.table.check_acyclicity()
    }

    /// Returns the multi-line adjacency listing (`dependee -> [ dependers ]`)
    pub fn describe(&self) -> String {
        self.table.to_string()
    }

    /// Renders the graph in Graphviz DOT format
    pub fn to_dot(&self) -> String {
        self.table.to_dot()
    }
}

impl fmt::Display for DependencyScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.table, f)
    }
}
