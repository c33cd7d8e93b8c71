//! Core acquisition logic.
//!
//! This module contains:
//! - AcquisitionPolicy: Attempt, poll and stall thresholds
//! - Acquirer: State machine driving one locator to a local file
//! - Orchestrator: Sequences catalog records through the engine

pub mod acquisition;
pub mod orchestrator;
pub mod policy;

// Re-export commonly used types
pub use acquisition::{materialized, Acquired, Acquirer, AcquisitionState, FetchFailure};
pub use orchestrator::{
    open_archive, ItemError, ItemOutcome, Orchestrator, RunContext, RunOptions,
};
pub use policy::AcquisitionPolicy;
