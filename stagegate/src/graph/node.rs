//! Dependency graph nodes
//!
//! The runtime wrapper around one topology node. For every phase it holds a
//! [`CompletionGate`] and the reverse edges: the (node, phase) pairs that
//! get unblocked once this node completes the phase.
//!
//! Gates and depender lists are allocated for the closed phase enumeration
//! when the node is created, so no lookup ever has to create them lazily.

use super::gate::CompletionGate;
use crate::core::Phase;

/// A reverse edge: `phase` of the node at index `node` waits on us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Depender {
    pub(crate) node: usize,
    pub(crate) phase: Phase,
}

#[derive(Debug)]
pub(crate) struct DependencyNode {
    name: String,
    gates: [CompletionGate; Phase::COUNT],
    dependers: [Vec<Depender>; Phase::COUNT],
}

impl DependencyNode {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gates: std::array::from_fn(|_| CompletionGate::new()),
            dependers: std::array::from_fn(|_| Vec::new()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn gate(&self, phase: Phase) -> &CompletionGate {
        &self.gates[phase.index()]
    }

    /// Records one more prerequisite for `phase`
    pub(crate) fn arm(&mut self, phase: Phase) {
        self.gates[phase.index()].arm();
    }

    /// Records that `depender` waits on this node completing `phase`
    pub(crate) fn add_depender(&mut self, phase: Phase, depender: Depender) {
        self.dependers[phase.index()].push(depender);
    }

    /// Reverse edges unblocked when this node completes `phase`
    pub(crate) fn dependers(&self, phase: Phase) -> &[Depender] {
        &self.dependers[phase.index()]
    }

    /// All reverse edges together with the phase they wait on, in phase order
    pub(crate) fn all_dependers(&self) -> impl Iterator<Item = (Phase, &Depender)> + '_ {
        Phase::ALL
            .into_iter()
            .flat_map(move |phase| self.dependers(phase).iter().map(move |d| (phase, d)))
    }
}
