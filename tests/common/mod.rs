//! Shared test doubles: a scripted fetch daemon and an in-memory catalog.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use claimfetch::adapters::{
    CatalogSource, DaemonError, FetchDaemon, InitiateReply, PollReply, TransferStatus,
};
use claimfetch::CatalogRecord;

#[derive(Default)]
struct Script {
    initiate: VecDeque<Option<InitiateReply>>,
    polls: VecDeque<Option<PollReply>>,
    last_initiate: Option<Option<InitiateReply>>,
    last_poll: Option<Option<PollReply>>,
}

/// Daemon replaying scripted replies; the last reply of each kind repeats
#[derive(Clone, Default)]
pub struct ScriptedDaemon {
    script: Arc<Mutex<Script>>,
    pub ping_calls: Arc<AtomicUsize>,
    pub initiate_calls: Arc<AtomicUsize>,
    pub poll_calls: Arc<AtomicUsize>,
}

impl ScriptedDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_initiate(self, reply: InitiateReply) -> Self {
        self.lock().initiate.push_back(Some(reply));
        self
    }

    /// Initiate yields no result (daemon error)
    pub fn on_initiate_error(self) -> Self {
        self.lock().initiate.push_back(None);
        self
    }

    pub fn then_poll(self, reply: PollReply) -> Self {
        self.lock().polls.push_back(Some(reply));
        self
    }

    /// Poll yields no status
    pub fn then_no_status(self) -> Self {
        self.lock().polls.push_back(None);
        self
    }

    pub fn initiates(&self) -> usize {
        self.initiate_calls.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    /// Initiate and poll calls together
    pub fn transfer_calls(&self) -> usize {
        self.initiates() + self.polls()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }
}

#[async_trait]
impl FetchDaemon for ScriptedDaemon {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn ping(&self) -> Result<(), DaemonError> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn initiate(&self, _locator: &str) -> Result<InitiateReply, DaemonError> {
        self.initiate_calls.fetch_add(1, Ordering::SeqCst);

        let mut script = self.lock();
        let next = match script.initiate.pop_front() {
            Some(next) => {
                script.last_initiate = Some(next.clone());
                next
            }
            None => script.last_initiate.clone().flatten(),
        };
        next.ok_or_else(|| DaemonError::Malformed("scripted: no result".to_string()))
    }

    async fn poll(&self, _claim_name: &str) -> Result<Option<PollReply>, DaemonError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);

        let mut script = self.lock();
        let next = match script.polls.pop_front() {
            Some(next) => {
                script.last_poll = Some(next.clone());
                next
            }
            None => script.last_poll.clone().flatten(),
        };
        Ok(next)
    }
}

/// Daemon whose liveness check always fails
pub struct OfflineDaemon;

#[async_trait]
impl FetchDaemon for OfflineDaemon {
    fn name(&self) -> &str {
        "offline"
    }

    async fn ping(&self) -> Result<(), DaemonError> {
        Err(DaemonError::Malformed("connection refused".to_string()))
    }

    async fn initiate(&self, _locator: &str) -> Result<InitiateReply, DaemonError> {
        Err(DaemonError::Malformed("connection refused".to_string()))
    }

    async fn poll(&self, _claim_name: &str) -> Result<Option<PollReply>, DaemonError> {
        Err(DaemonError::Malformed("connection refused".to_string()))
    }
}

pub fn running(claim_name: &str, path: &Path) -> InitiateReply {
    InitiateReply {
        status: TransferStatus::Running,
        claim_name: Some(claim_name.to_string()),
        download_path: Some(path.to_path_buf()),
    }
}

pub fn initiated(status: TransferStatus, path: &Path) -> InitiateReply {
    InitiateReply {
        status,
        claim_name: Some("claim".to_string()),
        download_path: Some(path.to_path_buf()),
    }
}

pub fn progress(status: TransferStatus, written: u64, total: u64, path: &Path) -> PollReply {
    PollReply {
        status,
        written_bytes: Some(written),
        total_bytes: Some(total),
        download_path: Some(path.to_path_buf()),
    }
}

/// Catalog serving fixed pages (page numbers start at 1)
#[derive(Clone, Default)]
pub struct MemoryCatalog {
    pages: Vec<Vec<CatalogRecord>>,
    pub page_calls: Arc<AtomicUsize>,
}

impl MemoryCatalog {
    pub fn new(pages: Vec<Vec<CatalogRecord>>) -> Self {
        Self {
            pages,
            page_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl CatalogSource for MemoryCatalog {
    async fn page(&self, page: u32) -> Result<Vec<CatalogRecord>> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default())
    }
}

/// Write `size` bytes at `path`, creating parents
pub fn write_file(path: &Path, size: usize) -> PathBuf {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, vec![b'x'; size]).unwrap();
    path.to_path_buf()
}

/// Count regular files under `root`, ignoring ledger/index artifacts
pub fn count_content_files(root: &Path) -> usize {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            !claimfetch::library::tree::RESERVED_FILES.contains(&name.as_ref())
                && !name.ends_with(".tmp")
        })
        .count()
}
