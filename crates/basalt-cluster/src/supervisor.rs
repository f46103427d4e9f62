//! Lifecycle supervisor: campaigns across the node set.
//!
//! A campaign applies one lifecycle action (stop/start/restart) to a
//! set of nodes and walks a fixed sequence of phases:
//!
//! ```text
//! PENDING -> ISSUING -> VERIFYING -> RECONCILING -> DONE | FAILED
//! ```
//!
//! Phases are strictly sequential — verification needs a quiesced
//! target state — while the work inside ISSUING and VERIFYING covers
//! all nodes at once, each bounded by its own timeout. Per-node
//! failures are isolated and aggregated: a node that rejects its
//! command or never reaches the expected state is recorded and the
//! campaign moves on, so one unreachable node cannot block the rest.
//!
//! A campaign that ends FAILED triggers exactly one recovery `restart`
//! campaign over the full configured cluster before the failure is
//! surfaced. The recovery campaign's own failure is fatal and is never
//! retried, so a broken cluster cannot trap the supervisor in a
//! restart loop.

use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::sync::Arc;

use basalt_types::{ClusterView, NodeId};
use tokio::time::{Instant, sleep, timeout_at};

use crate::config::ClusterConfig;
use crate::control::{ClusterControl, LifecycleAction, dispatch};
use crate::probe::HealthProbe;
use crate::reconcile::{ReconcileStatus, Reconciler};
use crate::registry::PeerRegistry;
use crate::{Error, Result};

/// Phase of a running campaign. Transitions are logged, never skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignPhase {
    Pending,
    Issuing,
    Verifying,
    Reconciling,
    Done,
    Failed,
}

impl Display for CampaignPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CampaignPhase::Pending => "pending",
            CampaignPhase::Issuing => "issuing",
            CampaignPhase::Verifying => "verifying",
            CampaignPhase::Reconciling => "reconciling",
            CampaignPhase::Done => "done",
            CampaignPhase::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Terminal status of a lifecycle campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignStatus {
    /// Every node verified and the cluster converged.
    Done,

    /// The campaign failed; the recovery restart brought the cluster
    /// back. `failed_nodes` lists the original offenders.
    Failed,

    /// The campaign failed and so did the one-shot recovery restart.
    /// No further automatic action is taken.
    RecoveryFailed,
}

/// Structured outcome of a lifecycle campaign.
///
/// Callers always receive per-node detail — never a bare error for an
/// operational failure — so a downstream retry can target exactly the
/// failed subset.
#[derive(Debug, Clone)]
pub struct CampaignResult {
    /// Terminal status.
    pub status: CampaignStatus,

    /// Nodes that rejected their command, never reached the expected
    /// state, or were unresolved when the campaign deadline expired.
    pub failed_nodes: Vec<NodeId>,

    /// Membership snapshot taken after the final reconciliation pass.
    pub final_snapshot: ClusterView,
}

impl CampaignResult {
    pub fn is_done(&self) -> bool {
        self.status == CampaignStatus::Done
    }
}

/// Orchestrates lifecycle campaigns over a configured cluster.
pub struct LifecycleSupervisor {
    config: ClusterConfig,
    control: Arc<dyn ClusterControl>,
    registry: Arc<PeerRegistry>,
    probe: HealthProbe,
    reconciler: Reconciler,
}

impl LifecycleSupervisor {
    /// Creates a supervisor over the configured node set.
    pub fn new(config: ClusterConfig, control: Arc<dyn ClusterControl>) -> Self {
        let registry = Arc::new(PeerRegistry::new(config.nodes.iter().cloned()));
        let probe = HealthProbe::new(Arc::clone(&control), config.probe.timeout());
        let reconciler = Reconciler::new(
            Arc::clone(&control),
            Arc::clone(&registry),
            config.probe.timeout(),
            &config.reconcile,
        );

        Self {
            config,
            control,
            registry,
            probe,
            reconciler,
        }
    }

    /// The registry backing this supervisor. Snapshots taken from it
    /// are consistent with campaign results.
    pub fn registry(&self) -> Arc<PeerRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Runs one lifecycle campaign over `nodes`, with the one-shot
    /// recovery contract.
    ///
    /// Errors are reserved for malformed requests (empty target set,
    /// node outside the configured cluster). Operational failures come
    /// back inside the [`CampaignResult`].
    pub async fn run_lifecycle_campaign(
        &self,
        nodes: &[NodeId],
        action: LifecycleAction,
    ) -> Result<CampaignResult> {
        if nodes.is_empty() {
            return Err(Error::NoNodes);
        }
        for node in nodes {
            if !self.config.contains(node) {
                return Err(Error::UnknownNode(node.clone()));
            }
        }

        let result = self.run_campaign(nodes, action).await;
        if result.is_done() {
            return Ok(result);
        }

        tracing::warn!(
            %action,
            failed = ?result.failed_nodes,
            "campaign failed, attempting one recovery restart over the full cluster"
        );
        let recovery = self
            .run_campaign(&self.config.nodes, LifecycleAction::Restart)
            .await;

        if recovery.is_done() {
            tracing::info!("recovery restart brought the cluster back");
            return Ok(CampaignResult {
                status: CampaignStatus::Failed,
                failed_nodes: result.failed_nodes,
                final_snapshot: recovery.final_snapshot,
            });
        }

        tracing::error!(
            failed = ?recovery.failed_nodes,
            "recovery restart failed, surfacing without further retries"
        );
        let mut failed: BTreeSet<NodeId> = result.failed_nodes.into_iter().collect();
        failed.extend(recovery.failed_nodes);

        Ok(CampaignResult {
            status: CampaignStatus::RecoveryFailed,
            failed_nodes: failed.into_iter().collect(),
            final_snapshot: recovery.final_snapshot,
        })
    }

    /// One campaign, no recovery. The recovery path reuses this.
    async fn run_campaign(&self, nodes: &[NodeId], action: LifecycleAction) -> CampaignResult {
        let deadline = Instant::now() + self.config.campaign.deadline();
        let mut phase = CampaignPhase::Pending;

        // ISSUING: one dispatch over the whole target set, bounded by
        // the campaign deadline. A node missing from the reply counts
        // as rejected.
        self.advance(&mut phase, CampaignPhase::Issuing, action);
        let acks = match timeout_at(deadline, dispatch(self.control.as_ref(), action, nodes)).await
        {
            Ok(acks) => acks,
            Err(_) => {
                tracing::warn!(%action, "campaign deadline elapsed while issuing commands");
                std::collections::HashMap::new()
            }
        };

        let mut failed: BTreeSet<NodeId> = BTreeSet::new();
        for node in nodes {
            if !acks.get(node).copied().unwrap_or(false) {
                tracing::warn!(%node, %action, "node rejected lifecycle command");
                failed.insert(node.clone());
            }
        }

        // VERIFYING: poll accepted nodes until each reaches the
        // expected post-transition state or its budget lapses. The
        // verify budget is shared because all commands were issued
        // together; stragglers are recorded, not waited out.
        self.advance(&mut phase, CampaignPhase::Verifying, action);
        let expected = action.expected_health();
        let verify_deadline = Instant::now() + self.config.campaign.verify_timeout();
        let mut pending: BTreeSet<NodeId> = nodes
            .iter()
            .filter(|node| !failed.contains(*node))
            .cloned()
            .collect();

        while !pending.is_empty() {
            let targets: Vec<NodeId> = pending.iter().cloned().collect();
            let health = self.probe.probe(&self.registry, &targets).await;
            pending.retain(|node| health.get(node) != Some(&expected));
            if pending.is_empty() {
                break;
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    unresolved = ?pending,
                    "campaign deadline elapsed during verification"
                );
                failed.append(&mut pending);
                break;
            }
            if now >= verify_deadline {
                tracing::warn!(
                    %expected,
                    nodes = ?pending,
                    "nodes never reached the expected state within the verify budget"
                );
                failed.append(&mut pending);
                break;
            }

            let wait = self
                .config
                .campaign
                .verify_poll()
                .min(deadline - now)
                .min(verify_deadline - now);
            sleep(wait).await;
        }

        // RECONCILING: always over the full configured set, bounded by
        // both the reconcile budget and what is left of the campaign.
        self.advance(&mut phase, CampaignPhase::Reconciling, action);
        let reconcile_deadline =
            deadline.min(Instant::now() + self.config.reconcile.deadline());
        let outcome = self
            .reconciler
            .run_until(reconcile_deadline, &self.config.nodes)
            .await;

        let converged = outcome.status == ReconcileStatus::Converged;
        let terminal = if failed.is_empty() && converged {
            CampaignPhase::Done
        } else {
            CampaignPhase::Failed
        };
        self.advance(&mut phase, terminal, action);

        CampaignResult {
            status: if terminal == CampaignPhase::Done {
                CampaignStatus::Done
            } else {
                CampaignStatus::Failed
            },
            failed_nodes: failed.into_iter().collect(),
            final_snapshot: outcome.snapshot,
        }
    }

    fn advance(&self, phase: &mut CampaignPhase, next: CampaignPhase, action: LifecycleAction) {
        tracing::info!(%action, from = %phase, to = %next, "campaign phase transition");
        *phase = next;
    }
}
