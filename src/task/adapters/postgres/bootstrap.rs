//! Connection pool construction and idempotent schema initialisation.

use super::repository::TaskPgPool;
use crate::task::ports::{TaskRepositoryError, TaskRepositoryResult};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use tracing::info;

/// DDL for the `tasks`, `deferred_ops`, and `users` tables and their indexes.
///
/// Every statement uses `IF NOT EXISTS`, so applying it repeatedly is safe.
pub const SCHEMA_SQL: &str =
    include_str!("../../../../migrations/2025-09-25-000000_create_tasks/up.sql");

/// Builds a connection pool of at most `max_size` connections.
///
/// # Errors
///
/// Returns [`TaskRepositoryError::Persistence`] when the pool cannot open its
/// initial connections.
pub fn connect(database_url: &str, max_size: u32) -> TaskRepositoryResult<TaskPgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(TaskRepositoryError::persistence)
}

/// Creates any missing tables and indexes.
///
/// # Errors
///
/// Returns [`TaskRepositoryError::Persistence`] when no connection is
/// available or the DDL fails.
pub fn initialise_schema(pool: &TaskPgPool) -> TaskRepositoryResult<()> {
    let mut connection = pool.get().map_err(TaskRepositoryError::persistence)?;
    connection.batch_execute(SCHEMA_SQL)?;
    info!("task schema initialised");
    Ok(())
}
