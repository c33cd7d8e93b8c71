//! Filename index of the managed tree.
//!
//! Built lazily by one recursive scan, then only appended to for the rest
//! of the process. Used to recognize files that already exist under the
//! expected name, possibly in a different folder.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::tree::ManagedTree;

/// A file found in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Bare file name -> every place it occurs
#[derive(Debug, Default)]
pub struct FilesystemIndex {
    files: Option<BTreeMap<String, Vec<IndexedFile>>>,
}

impl FilesystemIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_built(&self) -> bool {
        self.files.is_some()
    }

    /// Number of indexed files (0 before the first scan)
    pub fn len(&self) -> usize {
        self.files
            .as_ref()
            .map(|files| files.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_built(&mut self, tree: &ManagedTree) -> &BTreeMap<String, Vec<IndexedFile>> {
        self.files.get_or_insert_with(|| scan(tree))
    }

    /// Every indexed occurrence of `file_name`
    pub fn candidates(&mut self, tree: &ManagedTree, file_name: &str) -> &[IndexedFile] {
        self.ensure_built(tree)
            .get(file_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Find an existing file for `name`, exact name first, then a normalized match
    pub fn find_by_filename(
        &mut self,
        tree: &ManagedTree,
        name: &str,
        expected_size: u64,
    ) -> Option<PathBuf> {
        let files = self.ensure_built(tree);

        if let Some(matches) = files.get(name) {
            if let Some(found) = pick(matches, expected_size) {
                return Some(found);
            }
        }

        let wanted = normalize_search_name(name);
        files
            .iter()
            .find(|(cached, _)| normalize_cached_name(cached) == wanted)
            .and_then(|(_, matches)| pick(matches, expected_size))
    }

    /// Add a newly produced file; a no-op until the index has been built
    pub fn record(&mut self, path: &Path, size: u64) {
        let Some(files) = self.files.as_mut() else {
            return;
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return;
        };

        files.entry(name.to_string()).or_default().push(IndexedFile {
            path: path.to_path_buf(),
            size,
        });
    }
}

/// Whether `actual` is within 1% of `expected`
pub fn within_tolerance(actual: u64, expected: u64) -> bool {
    (actual as f64 - expected as f64).abs() < expected as f64 * 0.01
}

/// Prefer a size match when a size hint exists, else the first candidate
fn pick(matches: &[IndexedFile], expected_size: u64) -> Option<PathBuf> {
    if expected_size > 0 {
        if let Some(found) = matches
            .iter()
            .find(|m| within_tolerance(m.size, expected_size))
        {
            return Some(found.path.clone());
        }
    }
    matches.first().map(|m| m.path.clone())
}

fn normalize(name: &str) -> String {
    name.to_lowercase().replace(['-', '_'], " ")
}

/// Remote-assigned names may carry a `:suffix`
fn normalize_search_name(name: &str) -> String {
    normalize(name.split(':').next().unwrap_or(name))
}

/// Stored names carry an extension the remote name lacks
fn normalize_cached_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    normalize(stem)
}

fn scan(tree: &ManagedTree) -> BTreeMap<String, Vec<IndexedFile>> {
    tracing::info!(root = %tree.root().display(), "Scanning for existing files");

    let mut files: BTreeMap<String, Vec<IndexedFile>> = BTreeMap::new();
    let mut count = 0usize;

    for entry in WalkDir::new(tree.root())
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if tree.is_reserved(name) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };

        files.entry(name.to_string()).or_default().push(IndexedFile {
            path: entry.path().to_path_buf(),
            size: metadata.len(),
        });
        count += 1;
    }

    tracing::info!(count, "Found existing files");
    files
}
