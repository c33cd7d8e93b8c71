//! Ledger entries.
//!
//! One entry per detail reference, identified by a digest of the URL.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Ledger key (SHA256(detail_reference)[0:16] as hex)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Derive the ledger key for a detail reference
    pub fn from_detail_reference(detail_reference: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(detail_reference.as_bytes());
        let result = hasher.finalize();

        // 16 bytes = 32 hex chars
        Self(hex::encode(&result[..16]))
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal outcome recorded for an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Success,
    Failed,
}

/// Last known acquisition outcome for one catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,

    /// Human-readable title
    pub title: String,

    /// Stable URL of the catalog entry
    pub detail_reference: String,

    /// Remote locator, empty when the catalog had none
    #[serde(default)]
    pub locator: String,

    pub status: EntryStatus,

    /// Final location of the file (success only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub file_size: u64,

    #[serde(default)]
    pub verified: bool,

    /// Category path and any labels assigned by the taxonomy
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub category_fields: BTreeMap<String, String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// When this outcome was recorded
    pub recorded_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl LedgerEntry {
    /// Create a success entry for a file that now lives at `file_path`
    pub fn success(
        detail_reference: impl Into<String>,
        title: impl Into<String>,
        locator: impl Into<String>,
        file_path: PathBuf,
        file_size: u64,
    ) -> Self {
        let detail_reference = detail_reference.into();
        Self {
            entry_id: EntryId::from_detail_reference(&detail_reference),
            title: title.into(),
            detail_reference,
            locator: locator.into(),
            status: EntryStatus::Success,
            file_path: Some(file_path),
            file_size,
            verified: false,
            category_fields: BTreeMap::new(),
            tags: Vec::new(),
            recorded_at: Utc::now(),
            failure_reason: None,
        }
    }

    /// Create a failure entry with the reason it was abandoned
    pub fn failure(
        detail_reference: impl Into<String>,
        title: impl Into<String>,
        locator: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let detail_reference = detail_reference.into();
        Self {
            entry_id: EntryId::from_detail_reference(&detail_reference),
            title: title.into(),
            detail_reference,
            locator: locator.into(),
            status: EntryStatus::Failed,
            file_path: None,
            file_size: 0,
            verified: false,
            category_fields: BTreeMap::new(),
            tags: Vec::new(),
            recorded_at: Utc::now(),
            failure_reason: Some(reason.into()),
        }
    }

    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    pub fn with_category_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.category_fields = fields;
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == EntryStatus::Success
    }
}
