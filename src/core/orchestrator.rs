//! Run orchestration.
//!
//! Sequences catalog pages through the engine one item at a time:
//! filter, dedup, acquire, verify, classify, organize, record. Item
//! failures are recorded in the ledger and never abort the run; only an
//! unavailable daemon or an unwritable ledger does.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::fs;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{CatalogSource, FetchDaemon};
use crate::config::ResolvedConfig;
use crate::domain::{CatalogRecord, LedgerEntry};
use crate::library::taxonomy::sanitize_component;
use crate::library::{
    reconcile, verify, write_reports, DedupTracker, IndexStore, IndexedRecord, LedgerError,
    ManagedTree, ReconcileReport, Taxonomy, Verification,
};

use super::acquisition::{Acquirer, FetchFailure};
use super::policy::AcquisitionPolicy;

/// Why a single item was abandoned. The display form is the ledger reason.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("no locator")]
    NoLocator,

    #[error("{0}")]
    Fetch(#[from] FetchFailure),

    #[error("verification: {0}")]
    EmptyOrMissingFile(String),

    #[error("organize error: {0}")]
    Organize(#[source] io::Error),
}

impl ItemError {
    /// Reason stored in the ledger
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// What happened to one catalog record
#[derive(Debug)]
pub enum ItemOutcome {
    /// Fetched and placed at this path
    Acquired(PathBuf),
    /// An existing file was recognized; no daemon call was made
    AlreadyPresent(PathBuf),
    /// Skipped because it carries this excluded tag
    Filtered(String),
    Failed(ItemError),
}

/// Knobs for one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub max_pages: u32,
    pub check_new_only: bool,
    pub item_delay: Duration,
    pub index_batch_interval: usize,
    pub excluded_tags: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_pages: 999,
            check_new_only: true,
            item_delay: Duration::from_secs(3),
            index_batch_interval: 10,
            excluded_tags: Vec::new(),
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            max_pages: config.catalog.max_pages,
            check_new_only: config.run.check_new_only,
            item_delay: Duration::from_secs(config.run.item_delay_seconds),
            index_batch_interval: config.run.index_batch_interval,
            excluded_tags: config.run.excluded_tags.clone(),
        }
    }
}

/// Counters and identity of one run, passed explicitly
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Items queued for processing after the dedup filter
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped_by_filter: usize,
    /// Items dropped before processing because they were already acquired
    pub already_present: usize,
    started: Instant,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            total: 0,
            successful: 0,
            failed: 0,
            skipped_by_filter: 0,
            already_present: 0,
            started: Instant::now(),
        }
    }

    pub fn processed(&self) -> usize {
        self.successful + self.failed + self.skipped_by_filter
    }

    /// Remaining time at the average pace so far
    pub fn eta(&self) -> Option<Duration> {
        let processed = self.processed();
        if processed == 0 || processed >= self.total {
            return None;
        }
        let per_item = self.started.elapsed() / processed as u32;
        Some(per_item * (self.total - processed) as u32)
    }
}

/// Open the ledger and index of `tree`, then repair moved index rows
pub async fn open_archive(tree: ManagedTree) -> Result<(DedupTracker, IndexStore, ReconcileReport)> {
    let mut tracker = DedupTracker::open(tree)
        .await
        .context("Failed to open ledger")?;
    let mut index = IndexStore::load(tracker.tree()).await;

    let (tree, fs_index) = tracker.tree_and_fs_index();
    let report = reconcile(index.records_mut(), tree, fs_index);

    Ok((tracker, index, report))
}

/// Drives catalog records through the acquisition engine
pub struct Orchestrator<D, C> {
    daemon: D,
    catalog: C,
    tracker: DedupTracker,
    index: IndexStore,
    policy: AcquisitionPolicy,
    taxonomy: Taxonomy,
    options: RunOptions,
    reconcile_report: ReconcileReport,
}

impl<D: FetchDaemon, C: CatalogSource> Orchestrator<D, C> {
    /// Open the managed tree; reconciliation runs here
    pub async fn open(daemon: D, catalog: C, tree: ManagedTree) -> Result<Self> {
        let (tracker, index, reconcile_report) = open_archive(tree).await?;

        Ok(Self {
            daemon,
            catalog,
            tracker,
            index,
            policy: AcquisitionPolicy::default(),
            taxonomy: Taxonomy::default(),
            options: RunOptions::default(),
            reconcile_report,
        })
    }

    pub fn with_policy(mut self, policy: AcquisitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_taxonomy(mut self, taxonomy: Taxonomy) -> Self {
        self.taxonomy = taxonomy;
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn tracker(&self) -> &DedupTracker {
        &self.tracker
    }

    pub fn index(&self) -> &IndexStore {
        &self.index
    }

    pub fn reconcile_report(&self) -> ReconcileReport {
        self.reconcile_report
    }

    /// Process the catalog once
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&mut self) -> Result<RunContext> {
        let mut ctx = RunContext::new();
        tracing::Span::current().record("run_id", tracing::field::display(ctx.run_id));

        self.daemon
            .ping()
            .await
            .with_context(|| format!("Fetch daemon '{}' is not available", self.daemon.name()))?;

        let stats = self.tracker.stats();
        info!(
            total = stats.total,
            successful = stats.successful,
            failed = stats.failed,
            "Ledger statistics"
        );

        let mut records = self.fetch_catalog().await;
        info!(entries = records.len(), "Catalog entries");

        if self.options.check_new_only {
            let before = records.len();
            let tracker = &self.tracker;
            let indexed = self.index.records();
            records.retain(|r| {
                !tracker.is_already_acquired(indexed, &r.detail_reference, &r.locator, r.size)
            });
            ctx.already_present = before - records.len();
            info!(
                new = records.len(),
                already_present = ctx.already_present,
                "Filtered already acquired entries"
            );
        }

        ctx.total = records.len();
        if records.is_empty() {
            info!("Nothing to acquire");
            self.save_index().await;
            self.write_reports().await;
            return Ok(ctx);
        }

        let batch = self.options.index_batch_interval.max(1);
        for (i, record) in records.iter().enumerate() {
            let position = i + 1;
            info!(position, total = ctx.total, "Processing item");

            self.process_entry(&mut ctx, record).await?;

            info!(
                successful = ctx.successful,
                failed = ctx.failed,
                filtered = ctx.skipped_by_filter,
                eta_secs = ctx.eta().map(|d| d.as_secs()),
                "Run progress"
            );

            if position % batch == 0 || position == ctx.total {
                self.save_index().await;
            }
            if position < ctx.total {
                sleep(self.options.item_delay).await;
            }
        }

        self.write_reports().await;

        info!(
            successful = ctx.successful,
            failed = ctx.failed,
            filtered = ctx.skipped_by_filter,
            root = %self.tracker.tree().root().display(),
            "Run complete"
        );
        Ok(ctx)
    }

    /// Pages until an empty page, an error or `max_pages`
    async fn fetch_catalog(&self) -> Vec<CatalogRecord> {
        let mut records = Vec::new();

        for page in 1..=self.options.max_pages {
            match self.catalog.page(page).await {
                Ok(batch) if batch.is_empty() => {
                    debug!(page, "No more entries");
                    break;
                }
                Ok(batch) => {
                    debug!(page, count = batch.len(), "Fetched catalog page");
                    records.extend(batch);
                }
                Err(e) => {
                    warn!(page, error = %e, "Catalog page failed, stopping pagination");
                    break;
                }
            }
        }

        records
    }

    /// Take one record to a terminal outcome
    ///
    /// Only a ledger write failure is returned as an error.
    #[instrument(skip(self, ctx, record), fields(title = %record.title))]
    pub async fn process_entry(
        &mut self,
        ctx: &mut RunContext,
        record: &CatalogRecord,
    ) -> Result<ItemOutcome, LedgerError> {
        let title = sanitize_component(&record.title);

        if let Some(tag) = self
            .options
            .excluded_tags
            .iter()
            .find(|tag| record.has_tag(tag))
        {
            info!(tag = %tag, "Skipped by tag filter");
            ctx.skipped_by_filter += 1;
            return Ok(ItemOutcome::Filtered(tag.clone()));
        }

        if record.locator.is_empty() {
            return self.fail(ctx, record, &title, ItemError::NoLocator).await;
        }

        if let Some(name) = record.expected_filename() {
            if let Some(existing) = self.tracker.find_by_filename(&name, record.size) {
                info!(path = %existing.display(), "File already exists, updating records");
                self.record_placed(record, &title, &existing, true).await?;
                ctx.successful += 1;
                return Ok(ItemOutcome::AlreadyPresent(existing));
            }
        }

        let result = Acquirer::new(&self.daemon, &self.policy)
            .acquire(&record.locator)
            .await;
        let acquired = match result {
            Ok(acquired) => acquired,
            Err(failure) => return self.fail(ctx, record, &title, failure.into()).await,
        };

        let verification = verify_in_background(acquired.path.clone()).await;
        if !verification.ok {
            return self
                .fail(ctx, record, &title, ItemError::EmptyOrMissingFile(verification.message))
                .await;
        }
        if verification.degraded {
            warn!(message = %verification.message, "Verification degraded");
        } else {
            debug!(message = %verification.message, "Verified");
        }

        let dest_dir = self
            .tracker
            .tree()
            .root()
            .join(self.taxonomy.classify(record).relative_dir());
        let final_path = match organize(&acquired.path, &dest_dir).await {
            Ok(path) => path,
            Err(e) => return self.fail(ctx, record, &title, ItemError::Organize(e)).await,
        };

        self.record_placed(record, &title, &final_path, !verification.degraded)
            .await?;
        info!(path = %final_path.display(), "Acquired");
        ctx.successful += 1;
        Ok(ItemOutcome::Acquired(final_path))
    }

    /// Index row plus ledger success for a file now at `path`
    async fn record_placed(
        &mut self,
        record: &CatalogRecord,
        title: &str,
        path: &Path,
        verified: bool,
    ) -> Result<(), LedgerError> {
        let size = fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
        let classification = self.taxonomy.classify(record);

        self.index.upsert(IndexedRecord::from_catalog(
            record,
            path,
            &classification,
            size,
        ));

        let mut fields = classification.fields;
        fields.insert("category".to_string(), classification.category);

        let entry = LedgerEntry::success(
            &record.detail_reference,
            title,
            &record.locator,
            path.to_path_buf(),
            size,
        )
        .with_verified(verified)
        .with_category_fields(fields)
        .with_tags(record.tags.iter().cloned());

        self.tracker.record_success(entry).await
    }

    async fn fail(
        &mut self,
        ctx: &mut RunContext,
        record: &CatalogRecord,
        title: &str,
        error: ItemError,
    ) -> Result<ItemOutcome, LedgerError> {
        warn!(reason = %error.reason(), "Item failed");

        let entry = LedgerEntry::failure(
            &record.detail_reference,
            title,
            &record.locator,
            error.reason(),
        )
        .with_tags(record.tags.iter().cloned());
        self.tracker.record_failure(entry).await?;

        ctx.failed += 1;
        Ok(ItemOutcome::Failed(error))
    }

    /// The index is a derived view; a failed save is logged, not fatal
    async fn save_index(&self) {
        if let Err(e) = self.index.save().await {
            warn!(error = %e, "Failed to save archive index");
        }
    }

    /// Folder READMEs and the quick-find overview, rebuilt from the index
    async fn write_reports(&self) {
        match write_reports(self.tracker.tree(), self.index.records()).await {
            Ok(summary) => debug!(readmes = summary.readmes, "Reports updated"),
            Err(e) => warn!(error = %e, "Failed to write archive reports"),
        }
    }
}

async fn verify_in_background(path: PathBuf) -> Verification {
    tokio::task::spawn_blocking(move || verify(&path))
        .await
        .unwrap_or_else(|e| Verification {
            ok: true,
            degraded: true,
            message: format!("Verification did not complete: {e}"),
        })
}

/// Move `source` into `dest_dir`, copying when a rename is not possible
///
/// On failure the source file is left where it was.
async fn organize(source: &Path, dest_dir: &Path) -> io::Result<PathBuf> {
    let file_name = source.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "downloaded path has no file name")
    })?;

    fs::create_dir_all(dest_dir).await?;
    let dest = dest_dir.join(file_name);

    if let (Ok(a), Ok(b)) = (fs::canonicalize(source).await, fs::canonicalize(&dest).await) {
        if a == b {
            return Ok(dest);
        }
    }

    if let Err(e) = fs::rename(source, &dest).await {
        debug!(error = %e, "Rename failed, copying instead");
        fs::copy(source, &dest).await?;
        if let Err(e) = fs::remove_file(source).await {
            warn!(path = %source.display(), error = %e, "Could not remove source after copy");
        }
    }

    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_item_error_reasons() {
        assert_eq!(ItemError::NoLocator.reason(), "no locator");
        assert_eq!(ItemError::Fetch(FetchFailure::Stalled).reason(), "stalled");
        assert_eq!(
            ItemError::EmptyOrMissingFile("File is empty".to_string()).reason(),
            "verification: File is empty"
        );
    }

    #[test]
    fn test_eta() {
        let mut ctx = RunContext::new();
        assert_eq!(ctx.eta(), None);

        ctx.total = 4;
        ctx.successful = 4;
        assert_eq!(ctx.eta(), None);
    }

    #[tokio::test]
    async fn test_organize_moves_into_category() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("incoming/part.zip");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, b"zip").unwrap();

        let dest_dir = temp.path().join("out/Parts");
        let placed = organize(&source, &dest_dir).await.unwrap();

        assert_eq!(placed, dest_dir.join("part.zip"));
        assert!(placed.exists());
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn test_organize_in_place_is_noop() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("part.zip");
        std::fs::write(&source, b"zip").unwrap();

        let placed = organize(&source, temp.path()).await.unwrap();
        assert_eq!(placed, source);
        assert!(source.exists());
    }
}
