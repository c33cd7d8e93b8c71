//! Reconcile Integration Tests
//!
//! Index repair when an archive is opened after files were moved by hand.

mod common;

use claimfetch::core::open_archive;
use claimfetch::library::{write_reports, IndexStore, IndexedRecord};
use claimfetch::ManagedTree;
use tempfile::TempDir;

use common::write_file;

fn row(location: &std::path::Path, size_bytes: Option<u64>, size_mb: &str) -> IndexedRecord {
    IndexedRecord {
        file_name: location
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        location: location.to_string_lossy().into_owned(),
        size_bytes,
        size_mb: size_mb.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_open_archive_repairs_moved_rows() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("archive");
    std::fs::create_dir_all(&root).unwrap();

    let current = write_file(&root.join("Parts/current.zip"), 100);
    write_file(&root.join("Sorted/moved.zip"), 1000);
    let outside = write_file(&temp.path().join("elsewhere/outside.zip"), 100);

    let tree = ManagedTree::new(&root);
    let mut index = IndexStore::load(&tree).await;
    index.upsert(row(&current, Some(100), "0.00"));
    index.upsert(row(&root.join("Parts/moved.zip"), Some(1000), "0.00"));
    index.upsert(row(&root.join("Parts/missing.zip"), Some(5), "0.00"));
    index.upsert(row(&outside, Some(100), "0.00"));
    index.save().await.unwrap();

    let (tracker, index, report) = open_archive(ManagedTree::new(&root)).await.unwrap();

    assert_eq!(report.current, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.missing, 1);
    assert_eq!(report.outside, 1);
    assert!(!report.is_clean());

    // rows are repaired or kept, never dropped
    assert_eq!(index.len(), 4);
    let moved = index
        .records()
        .iter()
        .find(|r| r.file_name == "moved.zip")
        .unwrap();
    assert_eq!(
        moved.location,
        tracker
            .tree()
            .root()
            .join("Sorted/moved.zip")
            .to_string_lossy()
    );

    let missing = index
        .records()
        .iter()
        .find(|r| r.file_name == "missing.zip")
        .unwrap();
    assert!(missing.location.ends_with("Parts/missing.zip"));

    let kept_outside = index
        .records()
        .iter()
        .find(|r| r.file_name == "outside.zip")
        .unwrap();
    assert_eq!(kept_outside.location, outside.to_string_lossy());
}

#[tokio::test]
async fn test_reports_follow_repaired_rows() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("archive");
    std::fs::create_dir_all(&root).unwrap();
    write_file(&root.join("Sorted/moved.zip"), 1000);

    let tree = ManagedTree::new(&root);
    let mut index = IndexStore::load(&tree).await;
    index.upsert(row(&root.join("Parts/moved.zip"), Some(1000), "0.00"));
    index.save().await.unwrap();

    let (tracker, index, _report) = open_archive(ManagedTree::new(&root)).await.unwrap();
    let summary = write_reports(tracker.tree(), index.records()).await.unwrap();

    assert_eq!(summary.readmes, 1);
    assert_eq!(summary.total_files, 1);
    let readme = std::fs::read_to_string(root.join("Sorted/README.md")).unwrap();
    assert!(readme.contains("- `moved.zip`"));
    assert!(!root.join("Parts").exists());
    let quick_find = std::fs::read_to_string(root.join("QUICK_FIND.txt")).unwrap();
    assert!(quick_find.contains("-> /Sorted/  (1 files)"));
}

#[tokio::test]
async fn test_size_mismatch_is_not_a_move() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("archive");
    write_file(&root.join("Sorted/model.stl"), 10_000);

    let tree = ManagedTree::new(&root);
    let mut index = IndexStore::load(&tree).await;
    index.upsert(row(&root.join("Parts/model.stl"), Some(100), "0.00"));
    index.save().await.unwrap();

    let (_tracker, index, report) = open_archive(ManagedTree::new(&root)).await.unwrap();

    assert_eq!(report.updated, 0);
    assert_eq!(report.missing, 1);
    assert!(index.records()[0].location.ends_with("Parts/model.stl"));
}

#[tokio::test]
async fn test_megabyte_column_used_without_bytes() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("archive");
    write_file(&root.join("Sorted/big.zip"), 2 * 1024 * 1024);

    let tree = ManagedTree::new(&root);
    let mut index = IndexStore::load(&tree).await;
    index.upsert(row(&root.join("Parts/big.zip"), None, "2.00"));
    index.save().await.unwrap();

    let (_tracker, index, report) = open_archive(ManagedTree::new(&root)).await.unwrap();

    assert_eq!(report.updated, 1);
    assert!(index.records()[0].location.ends_with("Sorted/big.zip"));
}

#[tokio::test]
async fn test_empty_archive_is_clean() {
    let temp = TempDir::new().unwrap();

    let (tracker, index, report) = open_archive(ManagedTree::new(temp.path()))
        .await
        .unwrap();

    assert!(report.is_clean());
    assert!(index.is_empty());
    assert!(tracker.ledger().is_empty());
}
