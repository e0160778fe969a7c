//! In-memory repository for tasks and deferred operations.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::task::{
    domain::{
        DeferredOperation, DeferredOperationId, DeferredVerdict, PersistedTaskData, Task,
        TaskFields, TaskId, TaskMutation, Timestamp, WritePlan, WriteRequest, plan_deferred,
        plan_write,
    },
    ports::{
        DeferredOutcome, ScheduledWrite, TaskRepository, TaskRepositoryError,
        TaskRepositoryResult, WriteOutcome,
    },
};

/// Thread-safe in-memory task repository.
///
/// A single write lock serialises admission and deferred execution, which
/// gives the same atomicity the `PostgreSQL` adapter gets from transactions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: BTreeMap<TaskId, Task>,
    deferred: BTreeMap<DeferredOperationId, DeferredOperation>,
    last_task_id: i64,
    last_op_id: i64,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> TaskRepositoryResult<RwLockReadGuard<'_, InMemoryTaskState>> {
        self.state.read().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write_state(&self) -> TaskRepositoryResult<RwLockWriteGuard<'_, InMemoryTaskState>> {
        self.state.write().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

impl InMemoryTaskState {
    fn ensure_unique(
        &self,
        fields: &TaskFields,
        exclude: Option<TaskId>,
    ) -> TaskRepositoryResult<()> {
        let clash = self
            .tasks
            .values()
            .filter(|task| Some(task.id()) != exclude)
            .any(|task| task.fields().shares_unique_key_with(fields));
        if clash {
            return Err(TaskRepositoryError::DuplicateTitleDueDate {
                title: fields.title.to_string(),
                due_date: fields.due_date,
            });
        }
        Ok(())
    }

    /// Applies a mutation, validating every constraint before touching state.
    fn apply(&mut self, mutation: TaskMutation) -> TaskRepositoryResult<WriteOutcome> {
        match mutation {
            TaskMutation::Insert {
                fields,
                created_at,
                watermark,
            } => {
                self.ensure_unique(&fields, None)?;
                self.last_task_id += 1;
                let task = Task::from_persisted(PersistedTaskData {
                    id: TaskId::new(self.last_task_id),
                    fields,
                    created_at,
                    updated_at: created_at,
                    last_request_ts: watermark,
                });
                self.tasks.insert(task.id(), task.clone());
                Ok(WriteOutcome::Created(task))
            }
            TaskMutation::Replace {
                task_id,
                fields,
                updated_at,
                watermark,
            } => {
                let created_at = self
                    .tasks
                    .get(&task_id)
                    .ok_or(TaskRepositoryError::NotFound(task_id))?
                    .created_at();
                self.ensure_unique(&fields, Some(task_id))?;
                let task = Task::from_persisted(PersistedTaskData {
                    id: task_id,
                    fields,
                    created_at,
                    updated_at,
                    last_request_ts: watermark,
                });
                self.tasks.insert(task_id, task.clone());
                Ok(WriteOutcome::Updated(task))
            }
            TaskMutation::Remove { task_id } => self
                .tasks
                .remove(&task_id)
                .map(|_| WriteOutcome::Deleted(task_id))
                .ok_or(TaskRepositoryError::NotFound(task_id)),
        }
    }
}

fn in_execution_order<'a>(
    ops: impl Iterator<Item = &'a DeferredOperation>,
) -> Vec<DeferredOperation> {
    let mut selected: Vec<DeferredOperation> = ops.cloned().collect();
    selected.sort_by_key(|op| (op.execute_at(), op.id()));
    selected
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let state = self.read_state()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn list(&self) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.read_state()?;
        Ok(state.tasks.values().cloned().collect())
    }

    async fn admit(
        &self,
        request: WriteRequest,
        now: Timestamp,
    ) -> TaskRepositoryResult<WriteOutcome> {
        let mut state = self.write_state()?;
        let current = request
            .intent()
            .target()
            .and_then(|task_id| state.tasks.get(&task_id));

        match plan_write(&request, current, now)? {
            WritePlan::Apply(mutation) => state.apply(mutation),
            WritePlan::Defer(operation) => {
                state.last_op_id += 1;
                let queued = operation.with_id(DeferredOperationId::new(state.last_op_id));
                let ack = ScheduledWrite {
                    op_id: queued.id(),
                    task_id: queued.task_id(),
                    execute_at: queued.execute_at(),
                };
                state.deferred.insert(queued.id(), queued);
                Ok(WriteOutcome::Scheduled(ack))
            }
        }
    }

    async fn due_operations(
        &self,
        now: Timestamp,
    ) -> TaskRepositoryResult<Vec<DeferredOperation>> {
        let state = self.read_state()?;
        Ok(in_execution_order(state.deferred.values().filter(|op| op.is_due(now))))
    }

    async fn pending_operations(&self) -> TaskRepositoryResult<Vec<DeferredOperation>> {
        let state = self.read_state()?;
        Ok(in_execution_order(state.deferred.values()))
    }

    async fn execute_deferred(
        &self,
        op_id: DeferredOperationId,
        now: Timestamp,
    ) -> TaskRepositoryResult<DeferredOutcome> {
        let mut state = self.write_state()?;
        let Some(operation) = state.deferred.get(&op_id).cloned() else {
            return Ok(DeferredOutcome::Vanished);
        };
        let current = operation
            .task_id()
            .and_then(|task_id| state.tasks.get(&task_id));

        let outcome = match plan_deferred(&operation, current, now) {
            DeferredVerdict::Discard(reason) => DeferredOutcome::Discarded(reason),
            DeferredVerdict::Apply(mutation) => {
                state.apply(mutation)?;
                DeferredOutcome::Applied(operation.operation_type())
            }
        };
        state.deferred.remove(&op_id);
        Ok(outcome)
    }

    async fn discard_deferred(&self, op_id: DeferredOperationId) -> TaskRepositoryResult<bool> {
        let mut state = self.write_state()?;
        Ok(state.deferred.remove(&op_id).is_some())
    }
}
