//! Background jobs.

pub mod refresh;

pub use refresh::{
    RefreshError, RefreshFailure, RefreshJob, RefreshOutcome, RunSummary, spawn_scheduler,
};
