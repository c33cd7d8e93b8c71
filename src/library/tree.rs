//! The managed output tree.
//!
//! Everything the engine writes lives under one root. Reserved files
//! (ledger, index, generated reports) are never treated as content.

use std::path::{Component, Path, PathBuf};

use glob::Pattern;

/// Persisted ledger
pub const LEDGER_FILE: &str = "download_history.json";

/// Advisory lock held while a ledger is open
pub const LEDGER_LOCK_FILE: &str = "download_history.lock";

/// Primary human-facing index
pub const INDEX_JSON_FILE: &str = "archive_index.json";

/// Fallback (and spreadsheet-friendly) human-facing index
pub const INDEX_CSV_FILE: &str = "archive_index.csv";

/// Names never indexed as content
pub const RESERVED_FILES: &[&str] = &[
    LEDGER_FILE,
    LEDGER_LOCK_FILE,
    INDEX_JSON_FILE,
    INDEX_CSV_FILE,
    "QUICK_FIND.txt",
    "README.md",
];

/// Root directory the engine may read, write and reconcile within
#[derive(Debug, Clone)]
pub struct ManagedTree {
    root: PathBuf,
    exclude: Vec<Pattern>,
}

impl ManagedTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: resolve(&root.into()),
            exclude: Vec::new(),
        }
    }

    /// Create the root directory and re-resolve it to its canonical form
    ///
    /// A root that did not exist yet was only normalized lexically, which
    /// misses symlinks in its parents.
    pub async fn ensure_root(&mut self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        self.root = tokio::fs::canonicalize(&self.root).await?;
        Ok(())
    }

    /// Add glob patterns (matched against bare file names) to skip during scans
    pub fn with_exclude_patterns(mut self, patterns: &[String]) -> Self {
        for pattern_str in patterns {
            match Pattern::new(pattern_str) {
                Ok(pattern) => self.exclude.push(pattern),
                Err(e) => tracing::warn!(pattern = %pattern_str, error = %e, "Ignoring invalid scan pattern"),
            }
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join(LEDGER_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LEDGER_LOCK_FILE)
    }

    pub fn index_json_path(&self) -> PathBuf {
        self.root.join(INDEX_JSON_FILE)
    }

    pub fn index_csv_path(&self) -> PathBuf {
        self.root.join(INDEX_CSV_FILE)
    }

    /// Whether a bare file name is reserved or excluded from content scans
    pub fn is_reserved(&self, file_name: &str) -> bool {
        RESERVED_FILES.contains(&file_name)
            || file_name.ends_with(".tmp")
            || self.exclude.iter().any(|p| p.matches(file_name))
    }

    /// Whether `path` resolves to a location inside the tree
    pub fn contains(&self, path: &Path) -> bool {
        resolve(path).starts_with(&self.root)
    }
}

/// Canonical form of `path`; lexical normalization when it does not exist
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
