//! Task management with timestamp-ordered and deferred writes.
//!
//! Clients stamp every write with a logical timestamp. A task accepts a write
//! only when that timestamp is strictly newer than the last one it accepted;
//! writes stamped in the future are queued and applied once due, after being
//! re-validated against the task's state at that moment. The module follows
//! hexagonal architecture:
//!
//! - Domain types and admission rules in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
