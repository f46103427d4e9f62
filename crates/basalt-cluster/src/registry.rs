//! Peer registry: authoritative node and edge state.
//!
//! The registry is the only mutable shared state in the supervisor. It
//! is seeded from configuration — nodes are never added or removed at
//! runtime — and mutated through two operations: health recording (by
//! the probe) and whole-edge-set replacement (by the reconciliation
//! loop). Readers take [`ClusterView`] snapshots; a snapshot is cloned
//! under the read lock, so it never shows a node's edge set mid-replace.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::SystemTime;

use basalt_types::{ClusterView, HealthState, NodeHealth, NodeId, PeerEdge, PeerState};

struct RegistryState {
    nodes: BTreeMap<NodeId, NodeHealth>,
    edges: BTreeMap<NodeId, Vec<PeerEdge>>,
}

/// In-memory membership bookkeeping for one cluster.
///
/// All operations are infallible: observations about nodes outside the
/// configured set are dropped (the node set is configuration, and a
/// stray hostname in a peer report must not grow the cluster).
pub struct PeerRegistry {
    inner: RwLock<RegistryState>,
}

impl PeerRegistry {
    /// Creates a registry over the configured node set, all `Unknown`.
    pub fn new(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        let nodes: BTreeMap<NodeId, NodeHealth> = nodes
            .into_iter()
            .map(|id| (id, NodeHealth::unknown()))
            .collect();
        let edges = nodes.keys().cloned().map(|id| (id, Vec::new())).collect();

        Self {
            inner: RwLock::new(RegistryState { nodes, edges }),
        }
    }

    /// Whether `node` belongs to the configured set.
    pub fn contains(&self, node: &NodeId) -> bool {
        self.read().nodes.contains_key(node)
    }

    /// Records a probe result for `node`, stamping the probe time.
    pub fn record_health(&self, node: &NodeId, state: HealthState) {
        let mut inner = self.write();
        match inner.nodes.get_mut(node) {
            Some(health) => {
                health.state = state;
                health.last_probe = Some(SystemTime::now());
            }
            None => {
                tracing::debug!(%node, "dropping health observation for unconfigured node");
            }
        }
    }

    /// Atomically replaces `node`'s outgoing edge set.
    ///
    /// The previous set is discarded wholesale; edges are never patched
    /// individually, so readers only ever see complete observations.
    pub fn record_observation(&self, node: &NodeId, peers: Vec<(NodeId, PeerState)>) {
        let mut inner = self.write();
        if !inner.nodes.contains_key(node) {
            tracing::debug!(%node, "dropping peer observation from unconfigured node");
            return;
        }

        let outgoing: Vec<PeerEdge> = peers
            .into_iter()
            .map(|(peer, state)| PeerEdge::new(node.clone(), peer, state))
            .collect();
        inner.edges.insert(node.clone(), outgoing);
    }

    /// Returns an internally consistent snapshot of the registry.
    pub fn snapshot(&self) -> ClusterView {
        let inner = self.read();
        ClusterView::from_parts(inner.nodes.clone(), inner.edges.clone())
    }

    /// Whether the current registry contents satisfy the convergence
    /// invariant. Shorthand for `snapshot().is_fully_converged()`.
    pub fn is_fully_converged(&self) -> bool {
        self.snapshot().is_fully_converged()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryState> {
        self.inner.read().expect("peer registry lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RegistryState> {
        self.inner.write().expect("peer registry lock poisoned")
    }
}
