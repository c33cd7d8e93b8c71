//! Catalog client for listing available releases.
//!
//! The catalog is a paginated JSON API: `GET {api_base}/releases/?limit=&offset=`
//! with records under `results`.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::CatalogRecord;

/// Source of catalog pages (1-based)
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch one page; an empty page means the catalog is exhausted
    async fn page(&self, page: u32) -> Result<Vec<CatalogRecord>>;
}

#[derive(Debug, Deserialize)]
struct ReleasePage {
    #[serde(default)]
    results: Vec<RawRelease>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRelease {
    id: Option<serde_json::Value>,
    shortlink: Option<String>,
    name: Option<String>,
    url_lbry: Option<String>,
    url: Option<String>,
    tags: Vec<RawTag>,
    description: Option<String>,
    size: Option<u64>,
    release_date: Option<String>,
    last_updated: Option<String>,
    author: Option<String>,
    version: Option<String>,
    notes: Option<String>,
    readme: Option<String>,
    odysee_views: Option<u64>,
    odysee_likes: Option<u64>,
    odysee_dislikes: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTag {
    name: Option<String>,
}

/// HTTP catalog client
pub struct HttpCatalog {
    api_base: String,
    detail_base: String,
    page_size: u32,
    client: reqwest::Client,
}

impl HttpCatalog {
    pub fn new(
        api_base: impl Into<String>,
        detail_base: impl Into<String>,
        page_size: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("claimfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build catalog HTTP client")?;

        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            detail_base: detail_base.into().trim_end_matches('/').to_string(),
            page_size: page_size.max(1),
            client,
        })
    }

    fn page_url(&self, page: u32) -> String {
        let offset = page.saturating_sub(1) * self.page_size;
        format!(
            "{}/releases/?limit={}&offset={}",
            self.api_base, self.page_size, offset
        )
    }

    /// Scan the first `pages` pages and collect every tag name
    pub async fn list_tags(&self, pages: u32) -> Result<Vec<String>> {
        let mut tags = BTreeSet::new();

        for page in 1..=pages {
            let records = self.page(page).await?;
            if records.is_empty() {
                break;
            }
            tags.extend(records.into_iter().flat_map(|r| r.tags));
        }

        Ok(tags.into_iter().collect())
    }

    fn to_record(&self, raw: RawRelease) -> CatalogRecord {
        let web_url = raw.url.unwrap_or_default();

        let id = match raw.id {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        let detail_reference = match (raw.shortlink.filter(|s| !s.is_empty()), id) {
            (Some(shortlink), _) => format!("{}/{}", self.detail_base, shortlink),
            (None, Some(id)) => format!("{}/{}", self.detail_base, id),
            (None, None) => web_url.clone(),
        };

        CatalogRecord {
            title: raw.name.unwrap_or_else(|| "Unknown".to_string()),
            detail_reference,
            locator: raw.url_lbry.unwrap_or_default(),
            web_url,
            tags: raw.tags.into_iter().filter_map(|t| t.name).collect(),
            description: raw.description.unwrap_or_default(),
            size: raw.size.unwrap_or(0),
            release_date: raw.release_date.unwrap_or_default(),
            last_updated: raw.last_updated.unwrap_or_default(),
            author: raw.author.unwrap_or_default(),
            version: raw.version.unwrap_or_default(),
            notes: raw.notes.unwrap_or_default(),
            readme: raw.readme.unwrap_or_default(),
            views: raw.odysee_views.unwrap_or(0),
            likes: raw.odysee_likes.unwrap_or(0),
            dislikes: raw.odysee_dislikes.unwrap_or(0),
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn page(&self, page: u32) -> Result<Vec<CatalogRecord>> {
        let url = self.page_url(page);
        tracing::debug!(%url, "Fetching catalog page");

        let body: ReleasePage = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to fetch catalog page {}", page))?
            .error_for_status()
            .with_context(|| format!("Catalog rejected page {}", page))?
            .json()
            .await
            .with_context(|| format!("Failed to parse catalog page {}", page))?;

        Ok(body
            .results
            .into_iter()
            .map(|raw| self.to_record(raw))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> HttpCatalog {
        HttpCatalog::new("https://index.example/api/", "https://index.example/detail", 25).unwrap()
    }

    #[test]
    fn test_page_url_offsets() {
        let catalog = catalog();
        assert_eq!(
            catalog.page_url(1),
            "https://index.example/api/releases/?limit=25&offset=0"
        );
        assert_eq!(
            catalog.page_url(3),
            "https://index.example/api/releases/?limit=25&offset=50"
        );
    }

    #[test]
    fn test_detail_reference_prefers_shortlink() {
        let catalog = catalog();
        let raw: RawRelease = serde_json::from_value(serde_json::json!({
            "id": 42,
            "shortlink": "abc",
            "name": "Widget",
            "url_lbry": "lbry://widget#1",
            "tags": [{"name": "Tool"}, {"other": 1}],
            "size": 1000
        }))
        .unwrap();

        let record = catalog.to_record(raw);
        assert_eq!(record.detail_reference, "https://index.example/detail/abc");
        assert_eq!(record.locator, "lbry://widget#1");
        assert_eq!(record.tags, vec!["Tool".to_string()]);
        assert_eq!(record.size, 1000);
    }

    #[test]
    fn test_detail_reference_falls_back_to_id_then_url() {
        let catalog = catalog();

        let by_id: RawRelease = serde_json::from_value(serde_json::json!({"id": 7})).unwrap();
        assert_eq!(
            catalog.to_record(by_id).detail_reference,
            "https://index.example/detail/7"
        );

        let by_url: RawRelease =
            serde_json::from_value(serde_json::json!({"url": "https://video.example/w"})).unwrap();
        let record = catalog.to_record(by_url);
        assert_eq!(record.detail_reference, "https://video.example/w");
        assert_eq!(record.title, "Unknown");
    }
}
