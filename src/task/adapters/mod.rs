//! Adapters for task persistence and time.
//!
//! - [`memory::InMemoryTaskRepository`]: process-local storage used by tests
//!   and the `in_memory` storage mode
//! - [`postgres::PostgresTaskRepository`]: `PostgreSQL` persistence through
//!   Diesel
//! - [`clock::ManualClock`]: settable clock for deterministic scheduling

pub mod clock;
pub mod memory;
pub mod postgres;
