//! Configuration for claimfetch.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (applied per command by the CLI)
//! 2. Environment variables (CLAIMFETCH_OUTPUT, CLAIMFETCH_DAEMON_URL,
//!    CLAIMFETCH_CATALOG_URL)
//! 3. Config file (.claimfetch/config.yaml)
//! 4. Defaults
//!
//! Config file discovery:
//! - `--config <FILE>` if given
//! - Otherwise searches the current directory and parents for
//!   .claimfetch/config.yaml, then ~/.claimfetch/config.yaml
//! - Relative paths in the file resolve against the project root (the
//!   parent of .claimfetch/)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::daemon::DEFAULT_DAEMON_URL;
use crate::core::policy::AcquisitionPolicy;
use crate::library::Taxonomy;

pub const ENV_OUTPUT: &str = "CLAIMFETCH_OUTPUT";
pub const ENV_DAEMON_URL: &str = "CLAIMFETCH_DAEMON_URL";
pub const ENV_CATALOG_URL: &str = "CLAIMFETCH_CATALOG_URL";

const CONFIG_DIR: &str = ".claimfetch";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub acquisition: AcquisitionPolicy,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub taxonomy: Taxonomy,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Managed output tree (relative to the project root)
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_daemon_url")]
    pub url: String,

    /// Bound on every single daemon call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base of the catalog API (`{api_base}/releases/`)
    #[serde(default)]
    pub api_base: String,

    /// Base for detail references; defaults to the API base without `/api`
    #[serde(default)]
    pub detail_base: Option<String>,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Skip catalog entries that are already acquired
    #[serde(default = "default_true")]
    pub check_new_only: bool,

    #[serde(default = "default_item_delay")]
    pub item_delay_seconds: u64,

    /// Save the archive index every N processed items
    #[serde(default = "default_batch_interval")]
    pub index_batch_interval: usize,

    #[serde(default)]
    pub excluded_tags: Vec<String>,

    /// Extra file-name globs ignored when scanning the output tree
    #[serde(default)]
    pub scan_exclude: Vec<String>,
}

fn default_daemon_url() -> String {
    DEFAULT_DAEMON_URL.to_string()
}
fn default_call_timeout() -> u64 {
    30
}
fn default_page_size() -> u32 {
    25
}
fn default_max_pages() -> u32 {
    999
}
fn default_true() -> bool {
    true
}
fn default_item_delay() -> u64 {
    3
}
fn default_batch_interval() -> usize {
    10
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            url: default_daemon_url(),
            call_timeout_seconds: default_call_timeout(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            detail_base: None,
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            check_new_only: true,
            item_delay_seconds: default_item_delay(),
            index_batch_interval: default_batch_interval(),
            excluded_tags: Vec::new(),
            scan_exclude: Vec::new(),
        }
    }
}

impl CatalogConfig {
    pub fn detail_base(&self) -> String {
        match &self.detail_base {
            Some(base) => base.clone(),
            None => self
                .api_base
                .trim_end_matches('/')
                .trim_end_matches("/api")
                .to_string(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Root of the managed output tree
    pub output: PathBuf,
    pub daemon: DaemonConfig,
    pub acquisition: AcquisitionPolicy,
    pub catalog: CatalogConfig,
    pub run: RunConfig,
    pub taxonomy: Taxonomy,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// User-level config file, if present
fn user_config_file() -> Option<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
        .filter(|path| path.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Project root for a config file at `<root>/.claimfetch/config.yaml`
fn project_root(config_path: &Path) -> PathBuf {
    config_path
        .parent() // .claimfetch/
        .and_then(|p| p.parent()) // project root
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Merge file values, environment overrides and defaults
fn resolve(
    file: ConfigFile,
    config_file: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let output = if let Some(env_output) = env(ENV_OUTPUT) {
        PathBuf::from(env_output)
    } else {
        let output = file.paths.output.as_deref().unwrap_or("downloads");
        match &config_file {
            Some(path) => resolve_path(&project_root(path), output),
            None => PathBuf::from(output),
        }
    };

    let mut daemon = file.daemon;
    if let Some(url) = env(ENV_DAEMON_URL) {
        daemon.url = url;
    }

    let mut catalog = file.catalog;
    if let Some(url) = env(ENV_CATALOG_URL) {
        catalog.api_base = url;
    }

    ResolvedConfig {
        output,
        daemon,
        acquisition: file.acquisition,
        catalog,
        run: file.run,
        taxonomy: file.taxonomy,
        config_file,
    }
}

/// Load configuration from all sources
pub fn load(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let config_file = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let cwd = std::env::current_dir().context("Failed to determine current directory")?;
            find_config_file(&cwd).or_else(user_config_file)
        }
    };

    let file = match &config_file {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    if let Some(path) = &config_file {
        tracing::debug!(path = %path.display(), "Loaded config file");
    }

    Ok(resolve(file, config_file, |key| std::env::var(key).ok()))
}
