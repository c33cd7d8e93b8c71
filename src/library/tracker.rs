//! Identity and dedup checks.
//!
//! Combines the ledger, the filesystem index and the human-facing index to
//! answer "has this catalog entry already been acquired?".

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::LedgerEntry;

use super::fs_index::FilesystemIndex;
use super::index::IndexedRecord;
use super::ledger::{Ledger, LedgerError, LedgerStats};
use super::tree::ManagedTree;

/// Why an item counts as already acquired
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlreadyAcquired {
    /// A row of the archive index points at an existing file in the tree
    Indexed(PathBuf),
    /// A successful ledger entry points at an existing file in the tree
    Ledger(PathBuf),
}

impl AlreadyAcquired {
    pub fn path(&self) -> &Path {
        match self {
            AlreadyAcquired::Indexed(path) | AlreadyAcquired::Ledger(path) => path,
        }
    }
}

/// Owner of every dedup data source for one managed tree
#[derive(Debug)]
pub struct DedupTracker {
    tree: ManagedTree,
    ledger: Ledger,
    fs_index: FilesystemIndex,
}

impl DedupTracker {
    /// Open the ledger of `tree`; the filesystem index is built on first use
    pub async fn open(mut tree: ManagedTree) -> Result<Self, LedgerError> {
        tree.ensure_root().await?;
        let ledger = Ledger::open(&tree).await?;
        Ok(Self {
            tree,
            ledger,
            fs_index: FilesystemIndex::new(),
        })
    }

    pub fn tree(&self) -> &ManagedTree {
        &self.tree
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn stats(&self) -> LedgerStats {
        self.ledger.stats()
    }

    /// Split borrow for the reconciler
    pub fn tree_and_fs_index(&mut self) -> (&ManagedTree, &mut FilesystemIndex) {
        (&self.tree, &mut self.fs_index)
    }

    /// Existing acquisition of this entry, index rows first, then the ledger
    ///
    /// A row matching the locator decides on its own: its file must exist
    /// inside the managed tree, and the ledger is not consulted. Failed
    /// ledger entries never count. `expected_size` is informational only.
    pub fn find_acquired(
        &self,
        records: &[IndexedRecord],
        detail_reference: &str,
        locator: &str,
        expected_size: u64,
    ) -> Option<AlreadyAcquired> {
        if !locator.is_empty() {
            if let Some(record) = records.iter().find(|r| r.locator == locator) {
                let location = Path::new(&record.location);
                if !record.location.is_empty()
                    && location.exists()
                    && self.tree.contains(location)
                {
                    return Some(AlreadyAcquired::Indexed(location.to_path_buf()));
                }
                debug!(
                    location = %record.location,
                    expected_size,
                    "Indexed file is missing or outside the managed tree, will fetch again"
                );
                return None;
            }
        }

        let entry = self.ledger.get_by_detail_reference(detail_reference)?;
        if !entry.is_success() {
            return None;
        }

        let path = entry.file_path.as_deref()?;
        if path.exists() && self.tree.contains(path) {
            Some(AlreadyAcquired::Ledger(path.to_path_buf()))
        } else {
            None
        }
    }

    pub fn is_already_acquired(
        &self,
        records: &[IndexedRecord],
        detail_reference: &str,
        locator: &str,
        expected_size: u64,
    ) -> bool {
        self.find_acquired(records, detail_reference, locator, expected_size)
            .is_some()
    }

    /// Existing file for a bare name (see [`FilesystemIndex::find_by_filename`])
    pub fn find_by_filename(&mut self, name: &str, expected_size: u64) -> Option<PathBuf> {
        self.fs_index
            .find_by_filename(&self.tree, name, expected_size)
    }

    /// Persist a success and make the file visible to later lookups
    pub async fn record_success(&mut self, entry: LedgerEntry) -> Result<(), LedgerError> {
        let file = entry.file_path.clone().map(|path| (path, entry.file_size));
        self.ledger.upsert(entry).await?;

        if let Some((path, size)) = file {
            self.fs_index.record(&path, size);
        }
        Ok(())
    }

    pub async fn record_failure(&mut self, entry: LedgerEntry) -> Result<(), LedgerError> {
        self.ledger.upsert(entry).await
    }
}
