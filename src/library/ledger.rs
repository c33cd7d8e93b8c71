//! Persistent acquisition ledger.
//!
//! One entry per catalog record, keyed by a hash of its detail reference.
//! The whole map is rewritten on every mutation (temp file + rename), so a
//! crash leaves either the previous or the new ledger on disk. Readers get
//! an immutable snapshot that later writes never disturb.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use thiserror::Error;
use tokio::fs;

use crate::domain::{EntryId, LedgerEntry};

use super::tree::ManagedTree;

/// Errors from ledger persistence
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize ledger: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Ledger is locked by another process: {}", .0.display())]
    Locked(PathBuf),
}

/// Immutable view of the ledger at one point in time
pub type LedgerSnapshot = Arc<BTreeMap<EntryId, LedgerEntry>>;

/// Entry counts by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub total: usize,
    pub successful: usize,
    pub verified: usize,
    pub failed: usize,
}

/// The ledger file plus the lock that makes this process its only writer
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: LedgerSnapshot,
    _lock: File,
}

impl Ledger {
    /// Open (or start) the ledger of a managed tree
    ///
    /// Fails with [`LedgerError::Locked`] if another process holds it.
    /// An unreadable ledger file is treated as empty.
    pub async fn open(tree: &ManagedTree) -> Result<Self, LedgerError> {
        fs::create_dir_all(tree.root()).await?;

        let lock_path = tree.lock_path();
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| LedgerError::Locked(lock_path.clone()))?;

        let path = tree.ledger_path();
        let entries = load_entries(&path).await;
        tracing::debug!(path = %path.display(), entries = entries.len(), "Ledger opened");

        Ok(Self {
            path,
            entries: Arc::new(entries),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &EntryId) -> Option<&LedgerEntry> {
        self.entries.get(id)
    }

    pub fn get_by_detail_reference(&self, detail_reference: &str) -> Option<&LedgerEntry> {
        self.get(&EntryId::from_detail_reference(detail_reference))
    }

    /// Current snapshot; unaffected by later writes
    pub fn snapshot(&self) -> LedgerSnapshot {
        Arc::clone(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace the entry for its id, then persist
    ///
    /// The in-memory view only changes once the new ledger is on disk.
    pub async fn upsert(&mut self, entry: LedgerEntry) -> Result<(), LedgerError> {
        let mut next = (*self.entries).clone();
        next.insert(entry.entry_id.clone(), entry);

        self.persist(&next).await?;
        self.entries = Arc::new(next);
        Ok(())
    }

    async fn persist(&self, entries: &BTreeMap<EntryId, LedgerEntry>) -> Result<(), LedgerError> {
        let content = serde_json::to_string_pretty(entries)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    pub fn stats(&self) -> LedgerStats {
        self.entries
            .values()
            .fold(LedgerStats::default(), |mut stats, entry| {
                stats.total += 1;
                if entry.is_success() {
                    stats.successful += 1;
                    if entry.verified {
                        stats.verified += 1;
                    }
                } else {
                    stats.failed += 1;
                }
                stats
            })
    }
}

async fn load_entries(path: &Path) -> BTreeMap<EntryId, LedgerEntry> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read ledger, starting empty");
            return BTreeMap::new();
        }
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Could not parse ledger, starting empty");
        BTreeMap::new()
    })
}
