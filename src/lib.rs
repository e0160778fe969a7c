//! Taskdeck: a task API with timestamp-ordered and deferred writes.
//!
//! Every write carries a client-supplied logical timestamp. A task only
//! accepts writes whose timestamp is strictly newer than the last one it
//! accepted, and writes stamped in the future are queued until due, then
//! re-validated and applied by a background processor.
//!
//! # Architecture
//!
//! Taskdeck follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for persistence
//! - **Adapters**: `PostgreSQL` and in-memory implementations of the ports
//!
//! # Modules
//!
//! - [`task`]: Task model, admission rules, storage, and services
//! - [`http`]: Axum router, handlers, and error mapping
//! - [`app`]: Application context owning the deferred processor
//! - [`config`]: Environment-driven configuration
//! - [`telemetry`]: Tracing subscriber setup

pub mod app;
pub mod config;
pub mod http;
pub mod task;
pub mod telemetry;
