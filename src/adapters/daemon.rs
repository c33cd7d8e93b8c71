//! JSON-RPC client for the local fetch daemon.
//!
//! Every call is a `POST {"method", "params"}` to the daemon URL with a
//! bounded per-call timeout. Replies carry either `result` or `error`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use super::{FetchDaemon, InitiateReply, PollReply, TransferStatus};

/// Default daemon endpoint
pub const DEFAULT_DAEMON_URL: &str = "http://localhost:5279";

/// Errors talking to the daemon
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Fetch daemon not available at {url}: {reason}")]
    Unavailable { url: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Daemon returned an error for '{method}': {message}")]
    Rpc { method: String, message: String },

    #[error("Malformed daemon response: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct GetResult {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    claim_name: Option<String>,
    #[serde(default)]
    download_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileListResult {
    #[serde(default)]
    items: Vec<FileItem>,
}

#[derive(Debug, Deserialize)]
struct FileItem {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    written_bytes: Option<u64>,
    #[serde(default)]
    total_bytes: Option<u64>,
    #[serde(default)]
    download_path: Option<String>,
}

/// HTTP JSON-RPC daemon client
pub struct DaemonClient {
    url: String,
    client: reqwest::Client,
}

impl DaemonClient {
    /// Build a client without contacting the daemon
    pub fn new(url: impl Into<String>, call_timeout: Duration) -> Result<Self, DaemonError> {
        let client = reqwest::Client::builder().timeout(call_timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Build a client and require the daemon to answer the liveness check
    pub async fn connect(url: impl Into<String>, call_timeout: Duration) -> Result<Self, DaemonError> {
        let client = Self::new(url, call_timeout)?;

        if let Err(e) = client.ping().await {
            return Err(DaemonError::Unavailable {
                url: client.url.clone(),
                reason: e.to_string(),
            });
        }

        tracing::info!(url = %client.url, "Fetch daemon connected");
        Ok(client)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one request and unwrap the `result` member
    async fn call(&self, method: &str, params: Value) -> Result<Value, DaemonError> {
        let payload = json!({ "method": method, "params": params });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let mut body: Value = response.json().await?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(DaemonError::Rpc {
                method: method.to_string(),
                message,
            });
        }

        match body.get_mut("result").map(Value::take) {
            Some(Value::Null) | None => Err(DaemonError::Malformed(format!(
                "no result for '{}'",
                method
            ))),
            Some(result) => Ok(result),
        }
    }
}

#[async_trait]
impl FetchDaemon for DaemonClient {
    fn name(&self) -> &str {
        "lbrynet"
    }

    async fn ping(&self) -> Result<(), DaemonError> {
        self.call("status", json!({})).await.map(|_| ())
    }

    async fn initiate(&self, locator: &str) -> Result<InitiateReply, DaemonError> {
        let result = self
            .call("get", json!({ "uri": locator, "save_file": true }))
            .await?;
        let parsed: GetResult =
            serde_json::from_value(result).map_err(|e| DaemonError::Malformed(e.to_string()))?;

        Ok(InitiateReply {
            status: TransferStatus::parse(parsed.status.as_deref().unwrap_or("unknown")),
            claim_name: parsed.claim_name,
            download_path: parsed.download_path.map(PathBuf::from),
        })
    }

    async fn poll(&self, claim_name: &str) -> Result<Option<PollReply>, DaemonError> {
        let result = self
            .call("file_list", json!({ "claim_name": claim_name }))
            .await?;
        let parsed: FileListResult =
            serde_json::from_value(result).map_err(|e| DaemonError::Malformed(e.to_string()))?;

        Ok(parsed.items.into_iter().next().map(|item| PollReply {
            status: TransferStatus::parse(item.status.as_deref().unwrap_or("unknown")),
            written_bytes: item.written_bytes,
            total_bytes: item.total_bytes,
            download_path: item.download_path.map(PathBuf::from),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_status_parse() {
        assert_eq!(TransferStatus::parse("running"), TransferStatus::Running);
        assert_eq!(TransferStatus::parse("finished"), TransferStatus::Completed);
        assert_eq!(TransferStatus::parse("completed"), TransferStatus::Completed);
        assert_eq!(TransferStatus::parse("stopped"), TransferStatus::Stopped);
        assert_eq!(
            TransferStatus::parse("pending"),
            TransferStatus::Other("pending".to_string())
        );
    }

    #[test]
    fn test_client_creation() {
        let client = DaemonClient::new(DEFAULT_DAEMON_URL, Duration::from_secs(30)).unwrap();
        assert_eq!(client.name(), "lbrynet");
        assert_eq!(client.url(), DEFAULT_DAEMON_URL);
    }

    // Wire-level tests against a mock daemon live in tests/daemon_client.rs
}
