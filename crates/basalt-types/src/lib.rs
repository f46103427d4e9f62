//! # basalt-types: Core types for `Basalt` cluster management
//!
//! This crate contains the shared data model used across the `Basalt`
//! lifecycle-management tooling:
//! - Node identity ([`NodeId`]) and health ([`HealthState`], [`NodeHealth`])
//! - Peer membership observations ([`PeerState`], [`PeerEdge`])
//! - Point-in-time membership snapshots ([`ClusterView`]) and the
//!   full-mesh convergence invariant
//!
//! Nodes are configuration, not runtime state: a cluster's node set is
//! fixed when the cluster is described, and only health and peer edges
//! change while the management daemon (`basaltd`) is driven through its
//! lifecycle.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

// ============================================================================
// Node identity
// ============================================================================

/// Identity of a cluster node: a hostname or `host:port` address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Returns the node address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(addr: &str) -> Self {
        Self(addr.to_string())
    }
}

impl From<String> for NodeId {
    fn from(addr: String) -> Self {
        Self(addr)
    }
}

// ============================================================================
// Health
// ============================================================================

/// Last-known liveness of a node's management daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthState {
    /// The daemon answered its most recent probe.
    Up,

    /// The daemon did not answer (stopped, crashed, or unreachable).
    Down,

    /// The node has never been probed.
    Unknown,
}

impl HealthState {
    /// Whether the node counts as live for the convergence check.
    pub fn is_up(self) -> bool {
        self == HealthState::Up
    }
}

impl Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthState::Up => "up",
            HealthState::Down => "down",
            HealthState::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Health record for a single node: state plus the time of the probe
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHealth {
    /// Last observed liveness.
    pub state: HealthState,

    /// When the node was last probed, if ever.
    pub last_probe: Option<SystemTime>,
}

impl NodeHealth {
    /// Health of a node that has never been probed.
    pub fn unknown() -> Self {
        Self {
            state: HealthState::Unknown,
            last_probe: None,
        }
    }
}

impl Default for NodeHealth {
    fn default() -> Self {
        Self::unknown()
    }
}

// ============================================================================
// Peer observations
// ============================================================================

/// State of a peer as reported by another node's management daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerState {
    /// The peer is in the cluster and reachable.
    Connected,

    /// The peer is in the cluster but not reachable.
    Disconnected,

    /// The peer was rejected (configuration or checksum mismatch).
    PeerRejected,
}

impl Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeerState::Connected => "connected",
            PeerState::Disconnected => "disconnected",
            PeerState::PeerRejected => "peer rejected",
        };
        write!(f, "{s}")
    }
}

/// Directed observation: `from` considers `to` to be in state `state`.
///
/// Edges are refreshed wholesale — a node's outgoing edge set is always
/// replaced in one piece, never patched edge by edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEdge {
    /// The observing node.
    pub from: NodeId,

    /// The observed peer.
    pub to: NodeId,

    /// How `from` sees `to`.
    pub state: PeerState,
}

impl PeerEdge {
    pub fn new(from: NodeId, to: NodeId, state: PeerState) -> Self {
        Self { from, to, state }
    }
}

// ============================================================================
// Cluster view
// ============================================================================

/// Immutable point-in-time snapshot of cluster membership.
///
/// A view pairs every configured node's last-known health with the peer
/// edges it reported. Views are cheap to clone and carry no locks; a
/// view taken from a registry never changes after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterView {
    nodes: BTreeMap<NodeId, NodeHealth>,
    edges: BTreeMap<NodeId, Vec<PeerEdge>>,
}

impl ClusterView {
    /// Assembles a view from node healths and per-origin edge sets.
    pub fn from_parts(
        nodes: BTreeMap<NodeId, NodeHealth>,
        edges: BTreeMap<NodeId, Vec<PeerEdge>>,
    ) -> Self {
        Self { nodes, edges }
    }

    /// All configured node identities, in order.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Number of configured nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Last-known health of `node`, if it is part of this view.
    pub fn health_of(&self, node: &NodeId) -> Option<NodeHealth> {
        self.nodes.get(node).copied()
    }

    /// Nodes whose daemon answered its most recent probe.
    pub fn up_nodes(&self) -> Vec<&NodeId> {
        self.nodes
            .iter()
            .filter(|(_, health)| health.state.is_up())
            .map(|(id, _)| id)
            .collect()
    }

    /// Outgoing edges reported by `node` in this view.
    pub fn edges_from(&self, node: &NodeId) -> &[PeerEdge] {
        self.edges.get(node).map_or(&[], Vec::as_slice)
    }

    fn edge_state(&self, from: &NodeId, to: &NodeId) -> Option<PeerState> {
        self.edges_from(from)
            .iter()
            .find(|edge| &edge.to == to)
            .map(|edge| edge.state)
    }

    /// Whether the cluster has reached full membership convergence.
    ///
    /// Converged means every ordered pair of distinct UP nodes has a
    /// `Connected` edge — a complete, symmetric mesh over the live
    /// nodes. DOWN and UNKNOWN nodes are excluded from the check and
    /// re-included once they probe UP again. A view with fewer than two
    /// UP nodes is vacuously converged.
    pub fn is_fully_converged(&self) -> bool {
        let up = self.up_nodes();

        for from in &up {
            for to in &up {
                if from == to {
                    continue;
                }
                if self.edge_state(from, to) != Some(PeerState::Connected) {
                    return false;
                }
            }
        }

        true
    }
}
