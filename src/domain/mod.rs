//! Domain types for claimfetch.
//!
//! This module contains the core data structures:
//! - Entry: ledger records keyed by a digest of the detail reference
//! - Record: catalog metadata as handed to the engine

pub mod entry;
pub mod record;

// Re-export commonly used types
pub use entry::{EntryId, EntryStatus, LedgerEntry};
pub use record::CatalogRecord;
