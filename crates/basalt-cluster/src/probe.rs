//! Node health probing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use basalt_types::{HealthState, NodeId};
use tokio::time::timeout;

use crate::control::ClusterControl;
use crate::registry::PeerRegistry;

/// Bounded liveness check for the per-node management daemon.
///
/// Probing is total over its input: a node that cannot be reached, or a
/// probe round that exceeds its budget, reports `Down` rather than an
/// error. Every result is recorded into the registry along with the
/// probe timestamp.
pub struct HealthProbe {
    control: Arc<dyn ClusterControl>,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(control: Arc<dyn ClusterControl>, timeout: Duration) -> Self {
        Self { control, timeout }
    }

    /// Probes each node once and records the results in `registry`.
    ///
    /// One bounded collaborator call covers the whole set; a node
    /// missing from the reply, or an elapsed budget, maps to `Down`.
    pub async fn probe(
        &self,
        registry: &PeerRegistry,
        nodes: &[NodeId],
    ) -> BTreeMap<NodeId, HealthState> {
        let running = match timeout(self.timeout, self.control.is_service_running(nodes)).await {
            Ok(running) => running,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "probe round timed out, treating all queried nodes as down"
                );
                std::collections::HashMap::new()
            }
        };

        let mut results = BTreeMap::new();
        for node in nodes {
            let state = if running.get(node).copied().unwrap_or(false) {
                HealthState::Up
            } else {
                HealthState::Down
            };
            registry.record_health(node, state);
            results.insert(node.clone(), state);
        }

        tracing::trace!(
            up = results.values().filter(|s| s.is_up()).count(),
            total = results.len(),
            "probe round complete"
        );

        results
    }
}
