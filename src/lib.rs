//! claimfetch - idempotent acquisition of peer-to-peer content claims
//!
//! Fetches catalog entries through a local fetch daemon, verifies and
//! classifies the results into a managed output tree, and guarantees that
//! each entry is acquired at most once across repeated runs.
//!
//! # Architecture
//!
//! - The acquisition state machine drives one locator to completion,
//!   detecting stalls and deciding between retry and abandonment
//! - The ledger records the last outcome of every catalog entry and is
//!   rewritten on every change
//! - A filesystem index and the human-facing archive index let the engine
//!   recognize files that were moved or renamed by hand
//!
//! # Modules
//!
//! - `adapters`: Fetch daemon client and catalog client
//! - `core`: Acquisition state machine and run orchestration
//! - `domain`: Data structures (CatalogRecord, LedgerEntry)
//! - `library`: Managed tree, ledger, indexes, reconciliation, verification
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Acquire new entries from the first two catalog pages
//! claimfetch run --pages 2
//!
//! # Repair index paths after moving files around
//! claimfetch reconcile
//!
//! # Show what the ledger knows
//! claimfetch stats
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{CatalogSource, DaemonClient, DaemonError, FetchDaemon, HttpCatalog};
pub use core::{Acquired, Acquirer, AcquisitionPolicy, FetchFailure, Orchestrator, RunContext};
pub use domain::{CatalogRecord, EntryId, EntryStatus, LedgerEntry};
pub use library::{DedupTracker, Ledger, ManagedTree, Verification};
