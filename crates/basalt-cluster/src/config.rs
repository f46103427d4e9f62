//! Cluster configuration management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use basalt_types::NodeId;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configuration for a Basalt cluster under lifecycle management.
///
/// The node set is fixed at configuration time; campaigns may target a
/// subset but never introduce new nodes. All timing knobs are stored as
/// integer milliseconds so a `cluster.toml` stays hand-editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Addresses of the servers running the management daemon.
    pub nodes: Vec<NodeId>,

    /// Health probe settings.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Reconciliation loop settings.
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Lifecycle campaign settings.
    #[serde(default)]
    pub campaign: CampaignConfig,
}

/// Health probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Upper bound on a probe round, in milliseconds. A probe that does
    /// not answer within this budget reports the node as down.
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Reconciliation loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Delay before the second reconciliation pass, in milliseconds.
    pub backoff_initial_ms: u64,

    /// Ceiling for the doubling backoff, in milliseconds.
    pub backoff_cap_ms: u64,

    /// Total budget for one reconciliation run, in milliseconds.
    pub deadline_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            backoff_initial_ms: 2_000,
            backoff_cap_ms: 30_000,
            deadline_ms: 120_000,
        }
    }
}

impl ReconcileConfig {
    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Lifecycle campaign settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    /// Per-node budget for reaching the expected post-transition state,
    /// in milliseconds.
    pub verify_timeout_ms: u64,

    /// Interval between verification probe rounds, in milliseconds.
    pub verify_poll_ms: u64,

    /// Overall campaign deadline, in milliseconds. Exceeding it fails
    /// the campaign without waiting for stragglers.
    pub deadline_ms: u64,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            verify_timeout_ms: 30_000,
            verify_poll_ms: 1_000,
            deadline_ms: 300_000,
        }
    }
}

impl CampaignConfig {
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    pub fn verify_poll(&self) -> Duration {
        Duration::from_millis(self.verify_poll_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

impl ClusterConfig {
    /// Creates a configuration over the given node set with default timing.
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self {
            nodes,
            probe: ProbeConfig::default(),
            reconcile: ReconcileConfig::default(),
            campaign: CampaignConfig::default(),
        }
    }

    /// Loads cluster configuration from a cluster directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join("cluster.toml");

        if !config_path.exists() {
            return Err(Error::NotInitialized(dir.to_path_buf()));
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Saves cluster configuration into a cluster directory.
    pub fn save(&self, dir: &Path) -> Result<()> {
        self.validate()?;
        fs::create_dir_all(dir)?;

        let content = toml::to_string_pretty(self)?;
        fs::write(dir.join("cluster.toml"), content)?;

        Ok(())
    }

    /// Rejects configurations that cannot drive a campaign.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::NoNodes);
        }
        Ok(())
    }

    /// Whether `node` belongs to the configured cluster.
    pub fn contains(&self, node: &NodeId) -> bool {
        self.nodes.contains(node)
    }

    /// Returns the path a saved configuration would occupy.
    pub fn config_path(dir: &Path) -> PathBuf {
        dir.join("cluster.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn three_nodes() -> Vec<NodeId> {
        vec![
            NodeId::from("gfs1"),
            NodeId::from("gfs2"),
            NodeId::from("gfs3"),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = ClusterConfig::new(three_nodes());

        assert_eq!(config.probe.timeout(), Duration::from_secs(5));
        assert_eq!(config.reconcile.backoff_initial(), Duration::from_secs(2));
        assert_eq!(config.reconcile.backoff_cap(), Duration::from_secs(30));
        assert_eq!(config.reconcile.deadline(), Duration::from_secs(120));
        assert_eq!(config.campaign.deadline(), Duration::from_secs(300));
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let mut config = ClusterConfig::new(three_nodes());
        config.reconcile.deadline_ms = 60_000;

        config.save(temp.path()).unwrap();
        assert!(ClusterConfig::config_path(temp.path()).exists());

        let loaded = ClusterConfig::load(temp.path()).unwrap();
        assert_eq!(loaded.nodes, config.nodes);
        assert_eq!(loaded.reconcile.deadline_ms, 60_000);
    }

    #[test]
    fn test_load_not_initialized() {
        let temp = TempDir::new().unwrap();
        let result = ClusterConfig::load(temp.path());

        assert!(matches!(result, Err(Error::NotInitialized(_))));
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: ClusterConfig = toml::from_str("nodes = [\"gfs1\", \"gfs2\"]").unwrap();

        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.probe.timeout_ms, 5_000);
        assert_eq!(config.campaign.verify_poll_ms, 1_000);
    }

    #[test]
    fn test_empty_node_set_rejected() {
        let config = ClusterConfig::new(Vec::new());
        assert!(matches!(config.validate(), Err(Error::NoNodes)));

        let temp = TempDir::new().unwrap();
        assert!(config.save(temp.path()).is_err());
    }

    #[test]
    fn test_contains() {
        let config = ClusterConfig::new(three_nodes());

        assert!(config.contains(&NodeId::from("gfs2")));
        assert!(!config.contains(&NodeId::from("gfs9")));
    }
}
