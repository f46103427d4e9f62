//! Membership reconciliation loop.
//!
//! After a topology-changing event the per-node daemons re-establish
//! their peer sessions on their own schedule. The reconciliation loop
//! polls each live node's locally observed peer list into the registry
//! and re-checks the convergence invariant under bounded exponential
//! backoff. Ordinary non-convergence is an expected transient, so the
//! loop never fails — it reports `Converged` or `TimedOut`, carrying
//! the last snapshot for diagnostics either way.

use std::sync::Arc;
use std::time::Duration;

use basalt_types::{ClusterView, NodeId};
use tokio::time::{Instant, sleep};

use crate::config::ReconcileConfig;
use crate::control::ClusterControl;
use crate::probe::HealthProbe;
use crate::registry::PeerRegistry;

/// Terminal state of one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStatus {
    /// Every ordered pair of UP nodes reported each other connected.
    Converged,

    /// The deadline elapsed before the cluster converged.
    TimedOut,
}

/// Result of one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Whether convergence was reached.
    pub status: ReconcileStatus,

    /// Registry snapshot taken after the final pass.
    pub snapshot: ClusterView,

    /// Number of discovery passes performed.
    pub passes: u32,
}

/// Drives peer discovery until convergence or a deadline.
pub struct Reconciler {
    control: Arc<dyn ClusterControl>,
    registry: Arc<PeerRegistry>,
    probe: HealthProbe,
    backoff_initial: Duration,
    backoff_cap: Duration,
    deadline: Duration,
}

impl Reconciler {
    pub fn new(
        control: Arc<dyn ClusterControl>,
        registry: Arc<PeerRegistry>,
        probe_timeout: Duration,
        config: &ReconcileConfig,
    ) -> Self {
        let probe = HealthProbe::new(Arc::clone(&control), probe_timeout);
        Self {
            control,
            registry,
            probe,
            backoff_initial: config.backoff_initial(),
            backoff_cap: config.backoff_cap(),
            deadline: config.deadline(),
        }
    }

    /// Runs reconciliation over `nodes` with the configured deadline.
    pub async fn run(&self, nodes: &[NodeId]) -> ReconcileOutcome {
        self.run_until(Instant::now() + self.deadline, nodes).await
    }

    /// Runs reconciliation over `nodes` until convergence or `deadline`.
    ///
    /// Each pass probes the node set, pulls the observed peer list from
    /// every UP node into the registry (DOWN nodes are skipped and
    /// excluded from the completeness check until they report UP), and
    /// re-evaluates the invariant. Between passes the loop sleeps a
    /// doubling backoff, capped and clipped to the remaining budget.
    pub(crate) async fn run_until(&self, deadline: Instant, nodes: &[NodeId]) -> ReconcileOutcome {
        let mut backoff = self.backoff_initial;
        let mut passes = 0u32;

        loop {
            passes += 1;
            let health = self.probe.probe(&self.registry, nodes).await;

            for (node, state) in &health {
                if !state.is_up() {
                    continue;
                }
                let peers = self.control.list_observed_peers(node).await;
                self.registry.record_observation(node, peers);
            }

            let snapshot = self.registry.snapshot();
            if snapshot.is_fully_converged() {
                tracing::info!(passes, "cluster membership converged");
                return ReconcileOutcome {
                    status: ReconcileStatus::Converged,
                    snapshot,
                    passes,
                };
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(passes, "reconciliation deadline elapsed before convergence");
                return ReconcileOutcome {
                    status: ReconcileStatus::TimedOut,
                    snapshot,
                    passes,
                };
            }

            let wait = backoff.min(deadline - now);
            tracing::debug!(
                passes,
                wait_ms = wait.as_millis() as u64,
                "not converged yet, backing off"
            );
            sleep(wait).await;
            backoff = (backoff * 2).min(self.backoff_cap);
        }
    }
}
