//! Shared test helpers for `PostgreSQL` integration tests.

use std::sync::Arc;

use rstest::fixture;
use taskdeck::task::{
    adapters::{
        clock::ManualClock,
        postgres::{PostgresTaskRepository, TaskPgPool, connect},
    },
    domain::Timestamp,
    services::{DeferredOperationProcessor, TaskService},
};

pub use super::cluster::BoxError;
use super::cluster::{DatabaseServer, TemporaryDatabase};

/// Instant the test clock starts at.
pub const START: &str = "2025-09-25T20:00:00Z";

/// Repository, service, processor, and clock over a fresh database.
pub struct PostgresContext {
    pub pool: TaskPgPool,
    pub repository: Arc<PostgresTaskRepository>,
    pub clock: ManualClock,
    pub service: TaskService<PostgresTaskRepository, ManualClock>,
    pub processor: DeferredOperationProcessor<PostgresTaskRepository, ManualClock>,
    _database: TemporaryDatabase,
}

fn setup_context(server: DatabaseServer) -> Result<PostgresContext, BoxError> {
    let database = server.temporary_database()?;
    let pool = connect(database.url(), 4)?;

    let repository = Arc::new(PostgresTaskRepository::new(pool.clone()));
    let clock = ManualClock::new(timestamp(START)?.as_datetime());
    let shared_clock = Arc::new(clock.clone());
    Ok(PostgresContext {
        pool,
        service: TaskService::new(Arc::clone(&repository), Arc::clone(&shared_clock)),
        processor: DeferredOperationProcessor::new(Arc::clone(&repository), shared_clock),
        repository,
        clock,
        _database: database,
    })
}

/// Prepares a context over a fresh database on the test server.
///
/// # Errors
///
/// Returns an error if the server, the database, or the pool cannot be set
/// up.
#[fixture]
pub fn context() -> Result<PostgresContext, BoxError> {
    setup_context(DatabaseServer::resolve())
}

/// Parses a test timestamp.
///
/// # Errors
///
/// Returns an error for an unparsable value.
pub fn timestamp(raw: &str) -> Result<Timestamp, BoxError> {
    Ok(Timestamp::parse(raw)?)
}
