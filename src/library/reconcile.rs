//! Startup repair of index locations after files were moved by hand.

use std::path::Path;

use tracing::{debug, info, warn};

use super::fs_index::FilesystemIndex;
use super::index::IndexedRecord;
use super::tree::ManagedTree;

/// What reconciliation found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Rows pointed at a file found elsewhere in the tree
    pub updated: usize,
    /// Rows whose file exists inside the tree already
    pub current: usize,
    /// Rows whose file only exists outside the tree
    pub outside: usize,
    /// Rows whose file was not found anywhere
    pub missing: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.updated == 0 && self.outside == 0 && self.missing == 0
    }
}

/// Point stale rows at same-named files inside the tree
///
/// Never deletes a row or clears a location it cannot resolve.
pub fn reconcile(
    records: &mut [IndexedRecord],
    tree: &ManagedTree,
    fs_index: &mut FilesystemIndex,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for record in records.iter_mut() {
        if record.location.is_empty() {
            continue;
        }

        let location = Path::new(&record.location);
        let exists = location.exists();
        if exists && tree.contains(location) {
            report.current += 1;
            continue;
        }

        let Some(file_name) = location.file_name().and_then(|n| n.to_str()) else {
            report.missing += 1;
            continue;
        };

        let recorded_size = record.recorded_size();
        let found = fs_index
            .candidates(tree, file_name)
            .iter()
            .find(|candidate| match &recorded_size {
                Ok(size) => size.matches(candidate.size),
                // a name match is enough when the size is unreadable
                Err(_) => true,
            })
            .map(|candidate| candidate.path.clone());

        match found {
            Some(path) => {
                debug!(from = %record.location, to = %path.display(), "File moved");
                record.location = path.to_string_lossy().into_owned();
                report.updated += 1;
            }
            None if exists => report.outside += 1,
            None => report.missing += 1,
        }
    }

    if report.updated > 0 {
        info!(updated = report.updated, "Updated moved file paths");
    }
    if report.outside > 0 {
        info!(outside = report.outside, root = %tree.root().display(), "Indexed files exist outside the output tree");
    }
    if report.missing > 0 {
        warn!(missing = report.missing, root = %tree.root().display(), "Indexed files not found");
    }

    report
}
