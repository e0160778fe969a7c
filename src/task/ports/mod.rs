//! Port contracts for task persistence.
//!
//! Ports define infrastructure-agnostic interfaces used by task services.

pub mod repository;

pub use repository::{
    DeferredOutcome, ScheduledWrite, TaskRepository, TaskRepositoryError, TaskRepositoryResult,
    WriteOutcome,
};
