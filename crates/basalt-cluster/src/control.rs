//! Collaborator interface to the per-node management daemon.
//!
//! The supervisor never talks to a daemon directly; it drives an
//! implementation of [`ClusterControl`] — in production a transport
//! that shells out or speaks the daemon's RPC, in tests an in-memory
//! fake. All set-wide calls return a per-node accept/reject map; a node
//! missing from the map counts as rejected (or not running).

use std::collections::HashMap;
use std::fmt::{self, Display};

use async_trait::async_trait;
use basalt_types::{HealthState, NodeId, PeerState};

/// One lifecycle transition applied across a node set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Start the management daemon.
    Start,

    /// Stop the management daemon.
    Stop,

    /// Stop, then start the management daemon.
    Restart,
}

impl LifecycleAction {
    /// Health a node must reach for the transition to count as applied.
    pub fn expected_health(self) -> HealthState {
        match self {
            LifecycleAction::Stop => HealthState::Down,
            LifecycleAction::Start | LifecycleAction::Restart => HealthState::Up,
        }
    }
}

impl Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleAction::Start => "start",
            LifecycleAction::Stop => "stop",
            LifecycleAction::Restart => "restart",
        };
        write!(f, "{s}")
    }
}

/// Primitives the lifecycle supervisor consumes.
///
/// Implementations fan out across nodes however they like (ssh, RPC,
/// process control); the supervisor only requires that each call
/// returns within a reasonable bound and reports per-node results.
#[async_trait]
pub trait ClusterControl: Send + Sync {
    /// Starts the management daemon on each node.
    async fn start_service(&self, nodes: &[NodeId]) -> HashMap<NodeId, bool>;

    /// Stops the management daemon on each node.
    async fn stop_service(&self, nodes: &[NodeId]) -> HashMap<NodeId, bool>;

    /// Restarts the management daemon on each node.
    async fn restart_service(&self, nodes: &[NodeId]) -> HashMap<NodeId, bool>;

    /// Reports whether the management daemon is running on each node.
    async fn is_service_running(&self, nodes: &[NodeId]) -> HashMap<NodeId, bool>;

    /// Returns the peer list as observed locally by `node`.
    async fn list_observed_peers(&self, node: &NodeId) -> Vec<(NodeId, PeerState)>;
}

/// Dispatches one action over a node set.
pub(crate) async fn dispatch(
    control: &dyn ClusterControl,
    action: LifecycleAction,
    nodes: &[NodeId],
) -> HashMap<NodeId, bool> {
    match action {
        LifecycleAction::Start => control.start_service(nodes).await,
        LifecycleAction::Stop => control.stop_service(nodes).await,
        LifecycleAction::Restart => control.restart_service(nodes).await,
    }
}
