//! Acquisition state machine.
//!
//! Drives one locator to a materialized local file through the fetch
//! daemon:
//!
//! ```text
//! INITIATED ──completed/stopped + file──▶ SUCCEEDED
//!     │  └──no result / other status──▶ (backoff, next attempt) ──▶ FAILED
//!     └──running──▶ POLL LOOP ──completed + file──▶ SUCCEEDED
//!                       ├──stopped──▶ final file check
//!                       ├──stalled──▶ final file check
//!                       └──no status too long──▶ FAILED
//! ```
//!
//! An `Acquirer` owns no persistent state; build one per item.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, instrument, warn};

use crate::adapters::{FetchDaemon, TransferStatus};

use super::policy::AcquisitionPolicy;

/// Terminal failure of an acquisition. The display form is the ledger reason.
///
/// When initiate attempts run out, the failure is `NoDaemonResponse` if no
/// attempt got a reply at all, and `AttemptsExhausted` carrying the status of
/// the last reply otherwise (e.g. `stopped` with nothing on disk).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("no daemon response")]
    NoDaemonResponse,

    #[error("no status")]
    NoStatus,

    #[error("stalled")]
    Stalled,

    #[error("stopped")]
    Stopped,

    #[error("attempts exhausted (last status: {last_status})")]
    AttemptsExhausted { last_status: String },
}

/// A file the daemon finished writing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquired {
    pub path: PathBuf,
    pub bytes: u64,
}

/// States an acquisition passes through (for tracing)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Initiated,
    Running,
    Stopped,
    Completed,
    Succeeded,
    Failed,
}

/// Transient coordinator for a single acquisition
pub struct Acquirer<'a, D: FetchDaemon + ?Sized> {
    daemon: &'a D,
    policy: &'a AcquisitionPolicy,
}

impl<'a, D: FetchDaemon + ?Sized> Acquirer<'a, D> {
    pub fn new(daemon: &'a D, policy: &'a AcquisitionPolicy) -> Self {
        Self { daemon, policy }
    }

    /// Fetch `locator` to completion or give up
    #[instrument(skip(self), fields(daemon = self.daemon.name()))]
    pub async fn acquire(&self, locator: &str) -> Result<Acquired, FetchFailure> {
        let mut last_status: Option<TransferStatus> = None;
        let mut attempt: u32 = 1;

        loop {
            match self.daemon.initiate(locator).await {
                Ok(reply) => {
                    debug!(
                        attempt,
                        state = ?AcquisitionState::Initiated,
                        status = %reply.status,
                        "Initiated"
                    );

                    match (&reply.status, reply.claim_name.as_deref()) {
                        (TransferStatus::Completed | TransferStatus::Stopped, _) => {
                            if let Some(acquired) =
                                materialized(reply.download_path.as_deref()).await
                            {
                                debug!(state = ?AcquisitionState::Succeeded, path = %acquired.path.display(), "File already materialized");
                                return Ok(acquired);
                            }
                        }
                        (TransferStatus::Running, Some(claim_name)) => {
                            debug!(state = ?AcquisitionState::Running, claim_name, "Entering poll loop");
                            return self
                                .poll_until_done(claim_name, reply.download_path.clone())
                                .await;
                        }
                        _ => {}
                    }

                    last_status = Some(reply.status);
                }
                Err(e) => debug!(attempt, error = %e, "No result from initiate"),
            }

            if !self.policy.should_retry(attempt) {
                break;
            }
            attempt += 1;
            warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                "Retrying initiate"
            );
            sleep(self.policy.retry_backoff()).await;
        }

        debug!(state = ?AcquisitionState::Failed, "Attempts exhausted");
        Err(match last_status {
            None => FetchFailure::NoDaemonResponse,
            Some(status) => FetchFailure::AttemptsExhausted {
                last_status: status.to_string(),
            },
        })
    }

    /// Poll a running transfer until it completes, stops, stalls or goes silent
    async fn poll_until_done(
        &self,
        claim_name: &str,
        initial_path: Option<PathBuf>,
    ) -> Result<Acquired, FetchFailure> {
        let interval = self.policy.poll_interval();
        let stall_threshold = self.policy.stall_threshold();
        let no_status_timeout = self.policy.no_status_timeout();

        let started = Instant::now();
        let mut last_path = initial_path;
        let mut last_written: u64 = 0;
        let mut last_progress_at = started;
        let mut silent = Duration::ZERO;
        let mut previous_poll: Option<Instant> = None;

        loop {
            let now = Instant::now();
            let since_previous = previous_poll
                .map(|p| now.duration_since(p))
                .unwrap_or_default();
            previous_poll = Some(now);

            let reply = match self.daemon.poll(claim_name).await {
                Ok(Some(reply)) => reply,
                outcome => {
                    if let Err(e) = outcome {
                        debug!(error = %e, "No result from poll");
                    }
                    silent += since_previous;
                    if silent > no_status_timeout {
                        warn!(
                            silent_secs = silent.as_secs(),
                            "No status from daemon, giving up"
                        );
                        return Err(FetchFailure::NoStatus);
                    }
                    sleep(interval).await;
                    continue;
                }
            };

            if let Some(path) = reply.download_path {
                last_path = Some(path);
            }

            // a missing byte count is no progress
            let written = reply.written_bytes.unwrap_or(last_written);
            if written > last_written {
                last_written = written;
                last_progress_at = now;
            } else if now.duration_since(last_progress_at) >= stall_threshold {
                warn!(
                    written,
                    total = ?reply.total_bytes,
                    stalled_secs = now.duration_since(last_progress_at).as_secs(),
                    "Transfer stalled"
                );
                return materialized(last_path.as_deref())
                    .await
                    .ok_or(FetchFailure::Stalled);
            }

            if let Some(total) = reply.total_bytes.filter(|total| *total > 0) {
                debug!(
                    written,
                    total,
                    percent = written.saturating_mul(100) / total,
                    elapsed_secs = now.duration_since(started).as_secs(),
                    "Progress"
                );
            }

            match reply.status {
                TransferStatus::Completed => {
                    if let Some(acquired) = materialized(last_path.as_deref()).await {
                        debug!(
                            state = ?AcquisitionState::Completed,
                            elapsed_secs = now.duration_since(started).as_secs(),
                            "Transfer completed"
                        );
                        return Ok(acquired);
                    }
                    // status can run ahead of the file write
                }
                TransferStatus::Stopped => {
                    debug!(state = ?AcquisitionState::Stopped, "Transfer stopped");
                    return materialized(last_path.as_deref())
                        .await
                        .ok_or(FetchFailure::Stopped);
                }
                _ => {}
            }

            sleep(interval).await;
        }
    }
}

/// The file at `path`, if it exists and is non-empty
pub async fn materialized(path: Option<&Path>) -> Option<Acquired> {
    let path = path?;
    let metadata = tokio::fs::metadata(path).await.ok()?;

    if metadata.is_file() && metadata.len() > 0 {
        Some(Acquired {
            path: path.to_path_buf(),
            bytes: metadata.len(),
        })
    } else {
        None
    }
}
