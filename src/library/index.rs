//! Human-facing archive index.
//!
//! A flat table with one row per acquired file, kept as JSON (primary) and
//! CSV (spreadsheet view). Users may edit it by hand, so the dedup check
//! treats a matching row as stronger evidence than the ledger.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

use crate::domain::CatalogRecord;

use super::taxonomy::Classification;
use super::tree::ManagedTree;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Errors from index persistence
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode index JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to encode index CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// One row of the archive index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    #[serde(rename = "File Name", default)]
    pub file_name: String,

    #[serde(rename = "Location", default)]
    pub location: String,

    #[serde(rename = "Locator", default)]
    pub locator: String,

    #[serde(rename = "Detail URL", default)]
    pub detail_reference: String,

    #[serde(rename = "Category", default)]
    pub category: String,

    #[serde(rename = "Tags", default)]
    pub tags: String,

    /// Two-decimal megabytes, as shown to users
    #[serde(rename = "File Size (MB)", default)]
    pub size_mb: String,

    #[serde(rename = "File Size (bytes)", default)]
    pub size_bytes: Option<u64>,

    #[serde(rename = "Release Date", default)]
    pub release_date: String,

    #[serde(rename = "Last Updated", default)]
    pub last_updated: String,

    #[serde(rename = "Author", default)]
    pub author: String,

    #[serde(rename = "Version", default)]
    pub version: String,

    #[serde(rename = "Date Downloaded", default)]
    pub date_downloaded: String,

    #[serde(rename = "Views", default)]
    pub views: Option<u64>,

    #[serde(rename = "Likes", default)]
    pub likes: Option<u64>,

    #[serde(rename = "Dislikes", default)]
    pub dislikes: Option<u64>,

    #[serde(rename = "Description", default)]
    pub description: String,

    #[serde(rename = "Notes", default)]
    pub notes: String,

    #[serde(rename = "Readme", default)]
    pub readme: String,
}

/// Size recorded in a row, as far as it can be recovered
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordedSize {
    Bytes(u64),
    Megabytes(f64),
}

impl RecordedSize {
    /// Whether a file of `actual` bytes plausibly is the recorded one
    pub fn matches(&self, actual: u64) -> bool {
        match *self {
            RecordedSize::Bytes(expected) => super::fs_index::within_tolerance(actual, expected),
            RecordedSize::Megabytes(mb) => {
                let expected = mb * BYTES_PER_MB;
                // the column is rounded to 0.01 MB
                let allowance = (expected * 0.01).max(0.005 * BYTES_PER_MB);
                (actual as f64 - expected).abs() < allowance
            }
        }
    }
}

impl IndexedRecord {
    /// Row for a file placed at `location`
    pub fn from_catalog(
        record: &CatalogRecord,
        location: &Path,
        classification: &Classification,
        file_size: u64,
    ) -> Self {
        let file_name = location
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            file_name,
            location: location.to_string_lossy().into_owned(),
            locator: record.locator.clone(),
            detail_reference: record.detail_reference.clone(),
            category: classification.category.clone(),
            tags: record.tags.join(", "),
            size_mb: format!("{:.2}", file_size as f64 / BYTES_PER_MB),
            size_bytes: Some(file_size),
            release_date: record.release_date.clone(),
            last_updated: record.last_updated.clone(),
            author: record.author.clone(),
            version: record.version.clone(),
            date_downloaded: Local::now().format("%Y-%m-%d %H:%M").to_string(),
            views: Some(record.views),
            likes: Some(record.likes),
            dislikes: Some(record.dislikes),
            description: clean_text(&record.description),
            notes: clean_text(&record.notes),
            readme: clean_text(&record.readme),
        }
    }

    /// Recorded size: exact bytes when present, else the MB column
    pub fn recorded_size(&self) -> Result<RecordedSize, std::num::ParseFloatError> {
        match self.size_bytes {
            Some(bytes) => Ok(RecordedSize::Bytes(bytes)),
            None => self.size_mb.trim().parse().map(RecordedSize::Megabytes),
        }
    }

    fn same_item(&self, other: &IndexedRecord) -> bool {
        (!other.locator.is_empty() && self.locator == other.locator)
            || self.file_name == other.file_name
            || self.location == other.location
    }
}

/// Where the loaded rows came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Json,
    Csv,
    Empty,
}

/// The archive index of one managed tree
#[derive(Debug)]
pub struct IndexStore {
    json_path: PathBuf,
    csv_path: PathBuf,
    records: Vec<IndexedRecord>,
    source: IndexSource,
}

impl IndexStore {
    /// Load from JSON, else from CSV, else start empty
    pub async fn load(tree: &ManagedTree) -> Self {
        let json_path = tree.index_json_path();
        let csv_path = tree.index_csv_path();

        let (records, source) = if let Some(records) = load_json(&json_path).await {
            (records, IndexSource::Json)
        } else if let Some(records) = load_csv(&csv_path).await {
            (records, IndexSource::Csv)
        } else {
            tracing::info!("No existing index found, starting fresh");
            (Vec::new(), IndexSource::Empty)
        };

        if source != IndexSource::Empty {
            tracing::info!(records = records.len(), source = ?source, "Loaded existing index");
        }

        Self {
            json_path,
            csv_path,
            records,
            source,
        }
    }

    pub fn source(&self) -> IndexSource {
        self.source
    }

    pub fn records(&self) -> &[IndexedRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [IndexedRecord] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replace the first row describing the same item, or append
    pub fn upsert(&mut self, record: IndexedRecord) {
        match self.records.iter_mut().find(|r| r.same_item(&record)) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// Write both the JSON and CSV views; an empty index writes nothing
    pub async fn save(&self) -> Result<(), IndexError> {
        if self.records.is_empty() {
            return Ok(());
        }

        let json = serde_json::to_string_pretty(&self.records)?;
        write_replacing(&self.json_path, json.as_bytes()).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in &self.records {
            writer.serialize(record)?;
        }
        let csv = writer
            .into_inner()
            .map_err(|e| IndexError::Io(e.into_error()))?;
        write_replacing(&self.csv_path, &csv).await?;

        tracing::debug!(records = self.records.len(), "Index saved");
        Ok(())
    }
}

/// Strip control characters and collapse whitespace runs
pub fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Write `content` next to `path`, then rename it into place
pub(crate) async fn write_replacing(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await
}

async fn load_json(path: &Path) -> Option<Vec<IndexedRecord>> {
    let content = fs::read_to_string(path).await.ok()?;
    serde_json::from_str(&content)
        .map_err(|e| tracing::warn!(path = %path.display(), error = %e, "Could not parse JSON index"))
        .ok()
}

async fn load_csv(path: &Path) -> Option<Vec<IndexedRecord>> {
    let content = fs::read(path).await.ok()?;
    csv::Reader::from_reader(content.as_slice())
        .deserialize()
        .collect::<Result<Vec<IndexedRecord>, _>>()
        .map_err(|e| tracing::warn!(path = %path.display(), error = %e, "Could not parse CSV index"))
        .ok()
}
