//! Timing and retry policy for acquisitions.
//!
//! Controls how long the engine waits on the fetch daemon:
//! - Number of initiate attempts and the backoff between them
//! - Poll cadence while a transfer runs
//! - Stall and no-status thresholds that end a poll loop

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Policy for a single `acquire` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionPolicy {
    /// Initiate attempts before giving up (default: 3; at least one is made)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait before each attempt after the first (default: 5s)
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_seconds: u64,

    /// Interval between status polls (default: 2s)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    /// Unchanged byte count for this long means stalled (default: 30s)
    #[serde(default = "default_stall_threshold")]
    pub stall_threshold_seconds: u64,

    /// Cumulative time without any status before giving up (default: 60s)
    #[serde(default = "default_no_status_timeout")]
    pub no_status_timeout_seconds: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_retry_backoff() -> u64 {
    5
}
fn default_poll_interval() -> u64 {
    2
}
fn default_stall_threshold() -> u64 {
    30
}
fn default_no_status_timeout() -> u64 {
    60
}

impl Default for AcquisitionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_seconds: default_retry_backoff(),
            poll_interval_seconds: default_poll_interval(),
            stall_threshold_seconds: default_stall_threshold(),
            no_status_timeout_seconds: default_no_status_timeout(),
        }
    }
}

impl AcquisitionPolicy {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_secs(self.stall_threshold_seconds)
    }

    pub fn no_status_timeout(&self) -> Duration {
        Duration::from_secs(self.no_status_timeout_seconds)
    }

    /// Whether another initiate attempt is allowed after `attempt` (1-based)
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
