//! Browsing aids generated from the archive index.
//!
//! Every folder holding indexed files gets a `README.md` listing them, and
//! the root gets a `QUICK_FIND.txt` overview. Both are rebuilt wholesale
//! from the index rows; nothing else feeds them.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::fs;

use super::index::{write_replacing, IndexedRecord};
use super::tree::{ManagedTree, INDEX_CSV_FILE};

pub const README_FILE: &str = "README.md";
pub const QUICK_FIND_FILE: &str = "QUICK_FIND.txt";

const RULE: &str = "===================================================================";

/// What was written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub readmes: usize,
    pub total_files: usize,
}

/// Rewrite the folder READMEs and the quick-find overview of `tree`
///
/// An empty index writes nothing.
pub async fn write_reports(
    tree: &ManagedTree,
    records: &[IndexedRecord],
) -> io::Result<ReportSummary> {
    if records.is_empty() {
        return Ok(ReportSummary::default());
    }

    let stamp = Local::now().format("%Y-%m-%d %H:%M").to_string();
    let folders = group_by_folder(tree, records);

    let mut readmes = 0;
    for (folder, rows) in &folders {
        let is_dir = fs::metadata(folder).await.map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        let readme = render_readme(tree, folder, rows, &stamp);
        write_replacing(&folder.join(README_FILE), readme.as_bytes()).await?;
        readmes += 1;
    }

    let quick_find = render_quick_find(tree, &folders, records.len(), &stamp);
    write_replacing(&tree.root().join(QUICK_FIND_FILE), quick_find.as_bytes()).await?;

    tracing::debug!(readmes, files = records.len(), "Reports written");
    Ok(ReportSummary {
        readmes,
        total_files: records.len(),
    })
}

/// Rows by containing folder, for folders below the root inside the tree
fn group_by_folder<'a>(
    tree: &ManagedTree,
    records: &'a [IndexedRecord],
) -> BTreeMap<PathBuf, Vec<&'a IndexedRecord>> {
    let mut folders: BTreeMap<PathBuf, Vec<&IndexedRecord>> = BTreeMap::new();

    for record in records {
        if record.location.is_empty() {
            continue;
        }
        let Some(folder) = Path::new(&record.location).parent() else {
            continue;
        };
        if folder == tree.root() || !tree.contains(folder) {
            continue;
        }
        folders.entry(folder.to_path_buf()).or_default().push(record);
    }

    folders
}

fn relative_display(tree: &ManagedTree, folder: &Path) -> String {
    folder
        .strip_prefix(tree.root())
        .unwrap_or(folder)
        .to_string_lossy()
        .replace('\\', "/")
}

fn split_tags(tags: &str) -> impl Iterator<Item = &str> {
    tags.split(',').map(str::trim).filter(|t| !t.is_empty())
}

fn render_readme(
    tree: &ManagedTree,
    folder: &Path,
    rows: &[&IndexedRecord],
    stamp: &str,
) -> String {
    let name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let categories: BTreeSet<&str> = rows
        .iter()
        .map(|r| r.category.as_str())
        .filter(|c| !c.is_empty())
        .collect();
    let tags: BTreeSet<&str> = rows.iter().flat_map(|r| split_tags(&r.tags)).collect();

    let mut out = format!("# {name}\n\n");
    out.push_str(&format!("**Location:** `{}/`\n\n", relative_display(tree, folder)));
    out.push_str(&format!("**Files in this folder:** {}\n\n", rows.len()));
    if !categories.is_empty() {
        let joined: Vec<&str> = categories.into_iter().collect();
        out.push_str(&format!("**Categories:** {}\n\n", joined.join(", ")));
    }
    if !tags.is_empty() {
        let joined: Vec<&str> = tags.into_iter().collect();
        out.push_str(&format!("**Tags:** {}\n\n", joined.join(", ")));
    }

    out.push_str("---\n\n## Files\n\n");
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    for row in sorted {
        out.push_str(&format!("- `{}`", row.file_name));
        let details: Vec<&str> = split_tags(&row.tags).collect();
        if !details.is_empty() {
            out.push_str(&format!(" ({})", details.join(", ")));
        }
        out.push('\n');
    }

    out.push_str(&format!("\n---\n*Last updated: {stamp}*\n"));
    out
}

fn render_quick_find(
    tree: &ManagedTree,
    folders: &BTreeMap<PathBuf, Vec<&IndexedRecord>>,
    total: usize,
    stamp: &str,
) -> String {
    let mut out = format!("{RULE}\n{:^67}\n{RULE}\n\n", "ARCHIVE QUICK REFERENCE");

    if !folders.is_empty() {
        out.push_str("BROWSE BY FOLDER:\n");
        for (folder, rows) in folders {
            out.push_str(&format!(
                "   -> /{}/  ({} files)\n",
                relative_display(tree, folder),
                rows.len()
            ));
        }
        out.push('\n');
    }

    out.push_str("CAN'T FIND SOMETHING?\n");
    out.push_str(&format!("   1. Open {INDEX_CSV_FILE}\n"));
    out.push_str("   2. Search for the title or a tag\n");
    out.push_str("   3. Check the 'Location' column for the path\n\n");

    out.push_str(&format!(
        "{RULE}\nTotal Files: {total}\nLast Updated: {stamp}\n{RULE}\n"
    ));
    out
}
