//! Cluster membership reconciliation and node-lifecycle supervision
//! for Basalt.
//!
//! This crate drives the per-node management daemon (`basaltd`) across
//! a configured set of servers:
//! - Bounded health probing per node
//! - A peer registry with atomic per-node edge updates and consistent
//!   snapshot reads
//! - A reconciliation loop that polls observed peer lists under
//!   exponential backoff until the cluster converges
//! - A lifecycle supervisor that issues stop/start/restart campaigns
//!   with per-node verification and a one-shot recovery restart
//!
//! The crate contains no transport: callers supply a
//! [`ClusterControl`] implementation that knows how to reach the
//! daemons, and receive structured [`CampaignResult`]s back.

pub mod config;
pub mod control;
pub mod error;
pub mod probe;
pub mod reconcile;
pub mod registry;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use basalt_types::{ClusterView, HealthState, NodeHealth, NodeId, PeerEdge, PeerState};
pub use config::{CampaignConfig, ClusterConfig, ProbeConfig, ReconcileConfig};
pub use control::{ClusterControl, LifecycleAction};
pub use error::{Error, Result};
pub use probe::HealthProbe;
pub use reconcile::{ReconcileOutcome, ReconcileStatus, Reconciler};
pub use registry::PeerRegistry;
pub use supervisor::{CampaignPhase, CampaignResult, CampaignStatus, LifecycleSupervisor};

use std::path::Path;
use std::sync::Arc;

/// Writes a cluster description for the given node set.
pub fn init_cluster(dir: &Path, nodes: Vec<NodeId>) -> Result<ClusterConfig> {
    let config = ClusterConfig::new(nodes);
    config.save(dir)?;
    Ok(config)
}

/// Runs one lifecycle campaign over every configured node.
pub async fn run_campaign(
    config: ClusterConfig,
    control: Arc<dyn ClusterControl>,
    action: LifecycleAction,
) -> Result<CampaignResult> {
    config.validate()?;
    let supervisor = LifecycleSupervisor::new(config, control);
    let nodes = supervisor.config().nodes.clone();
    supervisor.run_lifecycle_campaign(&nodes, action).await
}
