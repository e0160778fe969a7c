//! Service layer for timestamp-ordered task reads and writes.

use crate::task::{
    domain::{
        Task, TaskContent, TaskDomainError, TaskDraft, TaskId, TaskPatch, TaskTitle, Timestamp,
        WriteIntent, WriteRequest,
    },
    ports::{TaskRepository, TaskRepositoryError, WriteOutcome},
};
use chrono::{DateTime, NaiveDate, Utc};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Request payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    title: String,
    content: Option<String>,
    due_date: Option<NaiveDate>,
    request_timestamp: String,
}

impl CreateTaskRequest {
    /// Creates a request with the required fields.
    #[must_use]
    pub fn new(title: impl Into<String>, request_timestamp: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: None,
            due_date: None,
            request_timestamp: request_timestamp.into(),
        }
    }

    /// Sets task content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets the due date.
    #[must_use]
    pub const fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// Request payload for a partial task update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTaskRequest {
    task_id: TaskId,
    title: Option<String>,
    content: Option<String>,
    due_date: Option<NaiveDate>,
    done: Option<bool>,
    request_timestamp: String,
}

impl UpdateTaskRequest {
    /// Creates an update that changes nothing but the watermark.
    #[must_use]
    pub fn new(task_id: TaskId, request_timestamp: impl Into<String>) -> Self {
        Self {
            task_id,
            title: None,
            content: None,
            due_date: None,
            done: None,
            request_timestamp: request_timestamp.into(),
        }
    }

    /// Sets a replacement title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets replacement content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets a replacement due date.
    #[must_use]
    pub const fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Sets the completion flag.
    #[must_use]
    pub const fn with_done(mut self, done: bool) -> Self {
        self.done = Some(done);
        self
    }
}

/// Request payload for deleting a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTaskRequest {
    task_id: TaskId,
    request_timestamp: String,
}

impl DeleteTaskRequest {
    /// Creates a delete request.
    #[must_use]
    pub fn new(task_id: TaskId, request_timestamp: impl Into<String>) -> Self {
        Self {
            task_id,
            request_timestamp: request_timestamp.into(),
        }
    }
}

/// Coarse classification used to map errors onto transport statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskErrorKind {
    /// The request was invalid.
    Malformed,
    /// The target task does not exist.
    NotFound,
    /// The write lost the ordering race or broke uniqueness.
    Conflict,
    /// Infrastructure failure.
    Internal,
}

/// Service-level errors for task operations.
#[derive(Debug, Error)]
pub enum TaskServiceError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
}

impl TaskServiceError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> TaskErrorKind {
        match self {
            Self::Domain(_) => TaskErrorKind::Malformed,
            Self::Repository(TaskRepositoryError::NotFound(_)) => TaskErrorKind::NotFound,
            Self::Repository(
                TaskRepositoryError::StaleWrite { .. }
                | TaskRepositoryError::DuplicateTitleDueDate { .. },
            ) => TaskErrorKind::Conflict,
            Self::Repository(TaskRepositoryError::Persistence(_)) => TaskErrorKind::Internal,
        }
    }
}

/// Result type for task service operations.
pub type TaskServiceResult<T> = Result<T, TaskServiceError>;

/// Orchestrates task reads and timestamp-ordered writes.
///
/// Every write is normalised, stamped with the current clock reading, and
/// handed to [`TaskRepository::admit`], which decides between applying,
/// deferring, and rejecting it.
pub struct TaskService<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> Clone for TaskService<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R, C> TaskService<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new task service.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    /// Creates a task, or schedules the creation when the request timestamp
    /// lies in the future.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::Domain`] for invalid input and
    /// [`TaskServiceError::Repository`] for duplicate `(title, due_date)`
    /// pairs or persistence failures.
    pub async fn create(&self, request: CreateTaskRequest) -> TaskServiceResult<WriteOutcome> {
        let draft = TaskDraft {
            title: TaskTitle::new(request.title)?,
            content: request.content.map(TaskContent::new).transpose()?,
            due_date: request.due_date,
        };
        let requested_at = Timestamp::parse_instant(&request.request_timestamp)?;
        self.submit(WriteIntent::Create(draft), requested_at).await
    }

    /// Merges the supplied fields over an existing task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::Repository`] with
    /// [`TaskRepositoryError::NotFound`] for a missing task and
    /// [`TaskRepositoryError::StaleWrite`] when the request timestamp does not
    /// advance the task's watermark.
    pub async fn update(&self, request: UpdateTaskRequest) -> TaskServiceResult<WriteOutcome> {
        let patch = TaskPatch {
            title: request.title.map(TaskTitle::new).transpose()?,
            content: request.content.map(TaskContent::new).transpose()?,
            due_date: request.due_date,
            done: request.done,
        };
        let requested_at = Timestamp::parse_instant(&request.request_timestamp)?;
        let intent = WriteIntent::Update {
            task_id: request.task_id,
            patch,
        };
        self.submit(intent, requested_at).await
    }

    /// Deletes a task.
    ///
    /// # Errors
    ///
    /// Same as [`TaskService::update`].
    pub async fn delete(&self, request: DeleteTaskRequest) -> TaskServiceResult<WriteOutcome> {
        let requested_at = Timestamp::parse_instant(&request.request_timestamp)?;
        let intent = WriteIntent::Delete {
            task_id: request.task_id,
        };
        self.submit(intent, requested_at).await
    }

    /// Retrieves a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] wrapped in
    /// [`TaskServiceError::Repository`] when the task does not exist.
    pub async fn get(&self, task_id: TaskId) -> TaskServiceResult<Task> {
        self.repository
            .find_by_id(task_id)
            .await?
            .ok_or(TaskServiceError::Repository(TaskRepositoryError::NotFound(
                task_id,
            )))
    }

    /// Lists every task in ascending identifier order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServiceError::Repository`] when persistence lookup fails.
    pub async fn list(&self) -> TaskServiceResult<Vec<Task>> {
        Ok(self.repository.list().await?)
    }

    async fn submit(
        &self,
        intent: WriteIntent,
        requested_at: DateTime<Utc>,
    ) -> TaskServiceResult<WriteOutcome> {
        let now = Timestamp::now(&*self.clock);
        let target = intent.target();
        let request = WriteRequest::new(intent, requested_at);
        let request_ts = request.request_ts();
        let outcome = self
            .repository
            .admit(request, now)
            .await
            .inspect_err(|err| {
                debug!(task_id = ?target.map(TaskId::value), error = %err, "write rejected");
            })?;
        log_outcome(&outcome, request_ts);
        Ok(outcome)
    }
}

fn log_outcome(outcome: &WriteOutcome, request_ts: Timestamp) {
    match outcome {
        WriteOutcome::Created(task) => {
            info!(task_id = task.id().value(), %request_ts, "task created");
        }
        WriteOutcome::Updated(task) => {
            info!(task_id = task.id().value(), %request_ts, "task updated");
        }
        WriteOutcome::Deleted(task_id) => {
            info!(task_id = task_id.value(), %request_ts, "task deleted");
        }
        WriteOutcome::Scheduled(ack) => {
            info!(
                op_id = ack.op_id.value(),
                task_id = ?ack.task_id.map(TaskId::value),
                execute_at = %ack.execute_at,
                "write deferred"
            );
        }
    }
}
