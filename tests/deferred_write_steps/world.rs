//! Shared world state for deferred write BDD scenarios.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rstest::fixture;
use taskdeck::task::{
    adapters::{clock::ManualClock, memory::InMemoryTaskRepository},
    domain::{TaskId, Timestamp},
    ports::WriteOutcome,
    services::{DeferredOperationProcessor, TaskService, TaskServiceError},
};

/// Service type used by the BDD world.
pub type TestTaskService = TaskService<InMemoryTaskRepository, ManualClock>;

/// Processor type used by the BDD world.
pub type TestProcessor = DeferredOperationProcessor<InMemoryTaskRepository, ManualClock>;

/// Scenario world for deferred write behaviour tests.
pub struct WriteWorld {
    pub repository: Arc<InMemoryTaskRepository>,
    pub clock: ManualClock,
    pub service: TestTaskService,
    pub processor: TestProcessor,
    pub task_id: Option<TaskId>,
    pub last_write: Option<Result<WriteOutcome, TaskServiceError>>,
}

impl WriteWorld {
    /// Creates a world whose clock starts at the Unix epoch.
    #[must_use]
    pub fn new() -> Self {
        let repository = Arc::new(InMemoryTaskRepository::new());
        let clock = ManualClock::new(DateTime::<Utc>::UNIX_EPOCH);
        let shared_clock = Arc::new(clock.clone());
        Self {
            service: TaskService::new(Arc::clone(&repository), Arc::clone(&shared_clock)),
            processor: DeferredOperationProcessor::new(Arc::clone(&repository), shared_clock),
            repository,
            clock,
            task_id: None,
            last_write: None,
        }
    }

    /// Returns the task the scenario operates on.
    pub fn task_id(&self) -> Result<TaskId, eyre::Report> {
        self.task_id
            .ok_or_else(|| eyre::eyre!("no task created in scenario world"))
    }
}

impl Default for WriteWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> WriteWorld {
    WriteWorld::default()
}

/// Parses a step timestamp into an instant.
pub fn instant(raw: &str) -> Result<DateTime<Utc>, eyre::Report> {
    Timestamp::parse(raw)
        .map(Timestamp::as_datetime)
        .map_err(|err| eyre::eyre!("invalid step timestamp: {err}"))
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
