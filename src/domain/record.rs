//! Catalog metadata records.

use serde::{Deserialize, Serialize};

/// One catalog entry as consumed by the engine.
///
/// Only `locator`, `title`, `detail_reference` and `size` drive acquisition;
/// the rest is carried through to the human-facing index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub title: String,

    /// Stable URL of the catalog entry (ledger identity)
    pub detail_reference: String,

    /// Remote locator handed to the fetch daemon, empty if none
    pub locator: String,

    /// Web URL of the content, if any
    #[serde(default)]
    pub web_url: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub description: String,

    /// Size hint in bytes (0 when unknown)
    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub release_date: String,

    #[serde(default)]
    pub last_updated: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub notes: String,

    #[serde(default)]
    pub readme: String,

    #[serde(default)]
    pub views: u64,

    #[serde(default)]
    pub likes: u64,

    #[serde(default)]
    pub dislikes: u64,
}

impl CatalogRecord {
    pub fn new(
        title: impl Into<String>,
        detail_reference: impl Into<String>,
        locator: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            detail_reference: detail_reference.into(),
            locator: locator.into(),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Filename the daemon is expected to produce for this locator.
    ///
    /// `lbry://name#claim` and `lbry://@channel#c/name#claim` both give `name`.
    pub fn expected_filename(&self) -> Option<String> {
        expected_filename(&self.locator)
    }
}

/// Derive the bare content name from a locator
pub fn expected_filename(locator: &str) -> Option<String> {
    let rest = locator
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(locator);

    let last = rest.rsplit('/').find(|segment| !segment.is_empty())?;
    let name = last.split('#').next().unwrap_or_default().trim();

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
