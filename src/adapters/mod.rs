//! Adapter interfaces for external systems.
//!
//! Adapters hide the two collaborators the engine talks to: the local
//! fetch daemon that materializes content, and the remote catalog that
//! lists what is available.

pub mod catalog;
pub mod daemon;

use std::path::PathBuf;

use async_trait::async_trait;

pub use catalog::{CatalogSource, HttpCatalog};
pub use daemon::{DaemonClient, DaemonError};

/// Transfer status as reported by the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStatus {
    Running,
    Stopped,
    /// `completed` or `finished`
    Completed,
    Other(String),
}

impl TransferStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            "completed" | "finished" => Self::Completed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Completed => write!(f, "completed"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Reply to an initiate-fetch request
#[derive(Debug, Clone)]
pub struct InitiateReply {
    pub status: TransferStatus,

    /// Claim name used to poll progress
    pub claim_name: Option<String>,

    pub download_path: Option<PathBuf>,
}

/// Reply to a status poll
#[derive(Debug, Clone)]
pub struct PollReply {
    pub status: TransferStatus,
    pub written_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub download_path: Option<PathBuf>,
}

/// Request/response contract of the fetch daemon
#[async_trait]
pub trait FetchDaemon: Send + Sync {
    /// Human-readable daemon name
    fn name(&self) -> &str;

    /// Lightweight liveness check
    async fn ping(&self) -> Result<(), DaemonError>;

    /// Start (or look up) the fetch of a locator
    async fn initiate(&self, locator: &str) -> Result<InitiateReply, DaemonError>;

    /// Current status of a claim; `Ok(None)` when the daemon knows nothing about it yet
    async fn poll(&self, claim_name: &str) -> Result<Option<PollReply>, DaemonError>;
}
