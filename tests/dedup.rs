//! Dedup Integration Tests
//!
//! Lookups the orchestrator relies on to avoid fetching twice.

mod common;

use claimfetch::library::IndexedRecord;
use claimfetch::{DedupTracker, EntryId, LedgerEntry, ManagedTree};
use tempfile::TempDir;

use common::write_file;

fn indexed(locator: &str, location: &std::path::Path) -> IndexedRecord {
    IndexedRecord {
        file_name: location
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        location: location.to_string_lossy().into_owned(),
        locator: locator.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_size_match_preferred_among_same_names() {
    let temp = TempDir::new().unwrap();
    write_file(&temp.path().join("one/part.stl"), 500);
    write_file(&temp.path().join("two/part.stl"), 1000);

    let mut tracker = DedupTracker::open(ManagedTree::new(temp.path()))
        .await
        .unwrap();

    let by_size = tracker.find_by_filename("part.stl", 1005).unwrap();
    assert!(by_size.ends_with("two/part.stl"));

    // unknown size: first match in scan order
    let first = tracker.find_by_filename("part.stl", 0).unwrap();
    assert!(first.ends_with("one/part.stl"));

    // no candidate within 1%: still the first match
    let fallback = tracker.find_by_filename("part.stl", 9999).unwrap();
    assert!(fallback.ends_with("one/part.stl"));
}

#[tokio::test]
async fn test_remote_name_matches_stored_file() {
    let temp = TempDir::new().unwrap();
    write_file(&temp.path().join("Parts/Part_Name.stl"), 10);

    let mut tracker = DedupTracker::open(ManagedTree::new(temp.path()))
        .await
        .unwrap();

    let found = tracker.find_by_filename("part-name:3", 0).unwrap();
    assert!(found.ends_with("Parts/Part_Name.stl"));
    assert!(tracker.find_by_filename("other-name", 0).is_none());
}

#[tokio::test]
async fn test_reserved_files_are_not_candidates() {
    let temp = TempDir::new().unwrap();
    write_file(&temp.path().join("README.md"), 10);
    write_file(&temp.path().join("partial.zip.tmp"), 10);

    let mut tracker = DedupTracker::open(ManagedTree::new(temp.path()))
        .await
        .unwrap();

    assert!(tracker.find_by_filename("README.md", 0).is_none());
    assert!(tracker.find_by_filename("partial.zip.tmp", 0).is_none());
    assert!(tracker.find_by_filename("download_history.json", 0).is_none());
}

#[tokio::test]
async fn test_index_row_outside_tree_does_not_count() {
    let temp = TempDir::new().unwrap();
    let outside = write_file(&temp.path().join("elsewhere/foo.zip"), 100);
    let inside = write_file(&temp.path().join("archive/Parts/bar.zip"), 100);

    let tracker = DedupTracker::open(ManagedTree::new(temp.path().join("archive")))
        .await
        .unwrap();
    let rows = vec![
        indexed("lbry://foo#1", &outside),
        indexed("lbry://bar#1", &inside),
    ];

    assert!(!tracker.is_already_acquired(&rows, "https://catalog.example/foo", "lbry://foo#1", 100));
    assert!(tracker.is_already_acquired(&rows, "https://catalog.example/bar", "lbry://bar#1", 100));
}

#[tokio::test]
async fn test_ledger_success_requires_file_in_tree() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("archive");
    let kept = write_file(&root.join("Parts/kept.zip"), 100);
    let gone = root.join("Parts/gone.zip");

    let mut tracker = DedupTracker::open(ManagedTree::new(&root)).await.unwrap();
    tracker
        .record_success(LedgerEntry::success("ref://kept", "Kept", "lbry://kept#1", kept, 100))
        .await
        .unwrap();
    tracker
        .record_success(LedgerEntry::success("ref://gone", "Gone", "lbry://gone#1", gone, 100))
        .await
        .unwrap();
    tracker
        .record_failure(LedgerEntry::failure("ref://failed", "Failed", "lbry://failed#1", "stalled"))
        .await
        .unwrap();

    assert!(tracker.is_already_acquired(&[], "ref://kept", "lbry://kept#1", 0));
    assert!(!tracker.is_already_acquired(&[], "ref://gone", "lbry://gone#1", 0));
    assert!(!tracker.is_already_acquired(&[], "ref://failed", "lbry://failed#1", 0));
    assert!(!tracker.is_already_acquired(&[], "ref://unknown", "", 0));
}

#[tokio::test]
async fn test_entry_identity_and_upsert() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("archive");
    let file = write_file(&root.join("a.zip"), 10);

    let mut tracker = DedupTracker::open(ManagedTree::new(&root)).await.unwrap();
    tracker
        .record_failure(LedgerEntry::failure("ref://a", "A", "lbry://a#1", "no status"))
        .await
        .unwrap();
    tracker
        .record_success(LedgerEntry::success("ref://a", "A", "lbry://a#1", file.clone(), 10))
        .await
        .unwrap();

    let id = EntryId::from_detail_reference("ref://a");
    assert_eq!(id, EntryId::from_detail_reference("ref://a"));
    assert_ne!(id, EntryId::from_detail_reference("ref://b"));
    assert_eq!(id.as_str().len(), 32);

    assert_eq!(tracker.ledger().len(), 1);
    let entry = tracker.ledger().get(&id).unwrap();
    assert!(entry.is_success());
    assert_eq!(entry.file_path.as_deref(), Some(file.as_path()));
    assert!(entry.failure_reason.is_none());
}

#[tokio::test]
async fn test_recorded_file_visible_without_rescan() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("archive");

    let mut tracker = DedupTracker::open(ManagedTree::new(&root)).await.unwrap();
    assert!(tracker.find_by_filename("fresh", 0).is_none());

    let file = write_file(&root.join("Parts/fresh.zip"), 42);
    tracker
        .record_success(LedgerEntry::success("ref://fresh", "Fresh", "lbry://fresh#1", file.clone(), 42))
        .await
        .unwrap();

    assert_eq!(tracker.find_by_filename("fresh", 42), Some(file));
}
