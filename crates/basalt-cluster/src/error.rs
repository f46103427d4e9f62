//! Error types for cluster management.
//!
//! Only configuration plumbing and malformed campaign requests surface
//! as errors. Campaign outcomes — per-node transition rejections,
//! verification timeouts, non-convergence, even a failed recovery —
//! travel inside [`CampaignResult`](crate::CampaignResult) so callers
//! always get structured per-node detail rather than a bare error.

use std::path::PathBuf;

use basalt_types::NodeId;
use thiserror::Error;

/// Cluster management errors.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cluster not initialized.
    #[error("Cluster not initialized at {0}")]
    NotInitialized(PathBuf),

    /// A campaign was requested over an empty node set.
    #[error("Campaign requires at least one target node")]
    NoNodes,

    /// A campaign targeted a node outside the configured cluster.
    #[error("Node {0} is not part of the configured cluster")]
    UnknownNode(NodeId),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;
