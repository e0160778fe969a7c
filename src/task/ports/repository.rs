//! Repository port for task persistence and the deferred-operation queue.

use crate::task::domain::{
    AdmissionRejection, DeferredOperation, DeferredOperationId, DiscardReason, OperationType,
    Task, TaskId, Timestamp, WriteRequest,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Acknowledgment returned when a write is queued instead of applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledWrite {
    /// Identifier of the queued operation.
    pub op_id: DeferredOperationId,
    /// Target task, absent for creates.
    pub task_id: Option<TaskId>,
    /// Instant from which the operation is due.
    pub execute_at: Timestamp,
}

/// Result of an admitted write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A task was inserted.
    Created(Task),
    /// A task was updated; carries the refreshed row.
    Updated(Task),
    /// A task was removed.
    Deleted(TaskId),
    /// The write was queued for later execution.
    Scheduled(ScheduledWrite),
}

/// Result of executing one due deferred operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredOutcome {
    /// The operation's effect was applied and the operation removed.
    Applied(OperationType),
    /// The operation was removed without effect.
    Discarded(DiscardReason),
    /// The operation was no longer queued, typically claimed by another
    /// processor sharing the store.
    Vanished,
}

/// Task persistence contract.
///
/// Implementations must run [`TaskRepository::admit`] and
/// [`TaskRepository::execute_deferred`] as single atomic units: the read of
/// the target row, the ordering decision, and the resulting writes either all
/// happen or none do.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Finds a task by identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Returns all tasks ordered by ascending identifier.
    async fn list(&self) -> TaskRepositoryResult<Vec<Task>>;

    /// Admits a write request against the current row state.
    ///
    /// The target row is read and locked, the request is planned with
    /// [`crate::task::domain::plan_write`], and the plan is persisted.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] for a missing target,
    /// [`TaskRepositoryError::StaleWrite`] when the timestamp does not advance
    /// the watermark, and [`TaskRepositoryError::DuplicateTitleDueDate`] when
    /// the write would break `(title, due_date)` uniqueness.
    async fn admit(
        &self,
        request: WriteRequest,
        now: Timestamp,
    ) -> TaskRepositoryResult<WriteOutcome>;

    /// Returns queued operations due at `now`, earliest `execute_at` first
    /// and ties broken by identifier.
    async fn due_operations(&self, now: Timestamp)
    -> TaskRepositoryResult<Vec<DeferredOperation>>;

    /// Returns every queued operation in execution order.
    async fn pending_operations(&self) -> TaskRepositoryResult<Vec<DeferredOperation>>;

    /// Claims, re-validates, and applies one queued operation.
    ///
    /// On success the operation has been removed from the queue. On error no
    /// change is persisted and the operation stays queued.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError`] when the stored operation cannot be
    /// decoded or applied.
    async fn execute_deferred(
        &self,
        op_id: DeferredOperationId,
        now: Timestamp,
    ) -> TaskRepositoryResult<DeferredOutcome>;

    /// Removes a queued operation without applying it.
    ///
    /// Returns `false` when the operation was already gone.
    async fn discard_deferred(&self, op_id: DeferredOperationId) -> TaskRepositoryResult<bool>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The write timestamp does not advance the task's watermark.
    #[error("request timestamp {requested} is not newer than {watermark} on task {task_id}")]
    StaleWrite {
        /// Target task.
        task_id: TaskId,
        /// Normalised request timestamp.
        requested: Timestamp,
        /// Stored watermark.
        watermark: Timestamp,
    },

    /// Another task already uses the `(title, due_date)` pair.
    #[error("a task titled '{title}' with due date {} already exists", due_date.map_or_else(|| "none".to_owned(), |date| date.to_string()))]
    DuplicateTitleDueDate {
        /// Conflicting title.
        title: String,
        /// Conflicting due date.
        due_date: Option<NaiveDate>,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

impl From<AdmissionRejection> for TaskRepositoryError {
    fn from(rejection: AdmissionRejection) -> Self {
        match rejection {
            AdmissionRejection::NotFound(task_id) => Self::NotFound(task_id),
            AdmissionRejection::Stale {
                task_id,
                requested,
                watermark,
            } => Self::StaleWrite {
                task_id,
                requested,
                watermark,
            },
        }
    }
}
