//! Dependency graph construction from a topology
//!
//! Besides the user-declared wait-for edges, a topology implies ordering on
//! its own:
//!
//! - nodes with a statically assigned management address are created
//!   before nodes that get one dynamically, so a dynamic assignment can not
//!   grab an address reserved for a static node;
//! - a node sharing the network namespace of another node
//!   (`network-mode: container:<peer>`) is created after that peer. A peer
//!   that is not part of the topology is an external container; the driver
//!   waits for it to run before creating the node, see
//!   [`Topology::external_peers`].

use super::definition::Topology;
use super::error::Result;
use crate::core::Phase;
use crate::graph::{DependencyError, DependencyManager};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

const CONTAINER_NETWORK_MODE: &str = "container";

impl Topology {
    /// Builds the dependency graph of every node in the topology.
    ///
    /// Unknown wait-for targets are collected over the whole topology and
    /// reported in one error. The returned manager is not frozen yet; call
    /// [`DependencyManager::freeze`] to check for cycles and start a run.
    pub fn build_manager(&self) -> Result<DependencyManager> {
        let mut manager = DependencyManager::new();
        for name in self.node_names() {
            manager.register_node(name)?;
        }

        self.add_static_dynamic_dependencies(&mut manager)?;
        self.add_wait_for_dependencies(&mut manager)?;
        self.add_namespace_sharing_dependencies(&mut manager)?;

        Ok(manager)
    }

    fn add_static_dynamic_dependencies(&self, manager: &mut DependencyManager) -> Result<()> {
        let mut static_nodes = Vec::new();
        let mut dynamic_nodes = Vec::new();
        for name in self.node_names() {
            if self.has_static_mgmt_address(name)? {
                static_nodes.push(name);
            } else {
                dynamic_nodes.push(name);
            }
        }

        for dynamic in &dynamic_nodes {
            for static_node in &static_nodes {
                manager.add_dependency(dynamic, Phase::Create, static_node, Phase::Create)?;
            }
        }
        Ok(())
    }

    fn add_wait_for_dependencies(&self, manager: &mut DependencyManager) -> Result<()> {
        let resolved = self.stages_by_node()?;

        let missing: BTreeSet<&str> = resolved
            .values()
            .flat_map(|stages| stages.wait_for())
            .flat_map(|(_, edges)| edges.iter())
            .map(|edge| edge.node.as_str())
            .filter(|name| !manager.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(DependencyError::nodes_not_found(missing).into());
        }

        for (depender, stages) in &resolved {
            for (depender_phase, edges) in stages.wait_for() {
                for edge in edges {
                    manager.add_dependency(depender, depender_phase, &edge.node, edge.stage)?;
                }
            }
        }
        Ok(())
    }

    /// External containers whose network namespace a node shares, keyed by
    /// node name.
    ///
    /// These peers are not scheduled, so no dependency edge covers them.
    pub fn external_peers(&self) -> Result<BTreeMap<String, String>> {
        let mut peers = BTreeMap::new();
        for name in self.node_names() {
            if let Some(peer) = self.namespace_peer(name)? {
                if !self.nodes.contains_key(peer) {
                    peers.insert(name.to_string(), peer.to_string());
                }
            }
        }
        Ok(peers)
    }

    fn namespace_peer(&self, name: &str) -> Result<Option<&str>> {
        Ok(self
            .node_network_mode(name)?
            .and_then(|mode| mode.split_once(':'))
            .filter(|(mode, _)| *mode == CONTAINER_NETWORK_MODE)
            .map(|(_, peer)| peer))
    }

    fn add_namespace_sharing_dependencies(&self, manager: &mut DependencyManager) -> Result<()> {
        for name in self.node_names() {
            let Some(peer) = self.namespace_peer(name)? else {
                continue;
            };

            if !manager.contains(peer) {
                warn!(
                    "node {} shares the namespace of {}, which is not part of the topology; treating it as an external container",
                    name, peer
                );
                continue;
            }

            debug!("node {} shares the network namespace of {}", name, peer);
            manager.add_dependency(name, Phase::Create, peer, Phase::Create)?;
        }
        Ok(())
    }
}
