//! The managed output tree and everything persisted in it.
//!
//! # Layout
//!
//! ```text
//! <output>/
//! ├── download_history.json     # Ledger: entry id -> last outcome
//! ├── download_history.lock     # Held while a run owns the tree
//! ├── archive_index.json        # Human-facing index (primary)
//! ├── archive_index.csv         # Same rows, spreadsheet view
//! ├── QUICK_FIND.txt            # Folder overview
//! └── <category>/
//!     ├── README.md             # Files in this folder
//!     └── <file>                # Acquired content
//! ```

pub mod fs_index;
pub mod index;
pub mod ledger;
pub mod reconcile;
pub mod report;
pub mod taxonomy;
pub mod tracker;
pub mod tree;
pub mod verify;

pub use fs_index::{FilesystemIndex, IndexedFile};
pub use index::{IndexError, IndexSource, IndexStore, IndexedRecord};
pub use ledger::{Ledger, LedgerError, LedgerSnapshot, LedgerStats};
pub use reconcile::{reconcile, ReconcileReport};
pub use report::{write_reports, ReportSummary};
pub use taxonomy::{Classification, Taxonomy, TaxonomyRule};
pub use tracker::{AlreadyAcquired, DedupTracker};
pub use tree::ManagedTree;
pub use verify::{verify, Verification};
