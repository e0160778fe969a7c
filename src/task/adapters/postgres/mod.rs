//! `PostgreSQL` adapters for task persistence.

mod bootstrap;
mod models;
mod repository;
mod schema;

pub use bootstrap::{SCHEMA_SQL, connect, initialise_schema};
pub use repository::{PostgresTaskRepository, TaskPgPool};
