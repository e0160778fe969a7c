//! `PostgreSQL` repository implementation for tasks and deferred operations.

use super::{
    models::{
        DeferredOpRow, DeletePayload, FieldsPayload, NewDeferredOpRow, NewTaskRow, TaskChangeset,
        TaskRow,
    },
    schema::{deferred_ops, tasks},
};
use crate::task::{
    domain::{
        DeferredAction, DeferredOperation, DeferredOperationId, DeferredVerdict,
        NewDeferredOperation, OperationType, PersistedTaskData, Task, TaskContent, TaskFields,
        TaskId, TaskMutation, TaskTitle, Timestamp, WritePlan, WriteRequest, plan_deferred,
        plan_write,
    },
    ports::{
        DeferredOutcome, ScheduledWrite, TaskRepository, TaskRepositoryError,
        TaskRepositoryResult, WriteOutcome,
    },
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use tracing::warn;

/// `PostgreSQL` connection pool type used by task adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

const TITLE_DUE_UNIQUE_CONSTRAINT: &str = "ux_tasks_title_due";

/// `PostgreSQL`-backed task repository.
///
/// Admission and deferred execution each run in one transaction holding a
/// `FOR UPDATE` lock on the target row.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: TaskPgPool,
}

impl PostgresTaskRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }
}

impl From<DieselError> for TaskRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .find(id.value())
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn list(&self) -> TaskRepositoryResult<Vec<Task>> {
        self.run_blocking(|connection| {
            tasks::table
                .order(tasks::id.asc())
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)?
                .into_iter()
                .map(row_to_task)
                .collect()
        })
        .await
    }

    async fn admit(
        &self,
        request: WriteRequest,
        now: Timestamp,
    ) -> TaskRepositoryResult<WriteOutcome> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, TaskRepositoryError, _>(|tx| {
                let current = match request.intent().target() {
                    Some(task_id) => lock_task(tx, task_id)?,
                    None => None,
                };
                match plan_write(&request, current.as_ref(), now)? {
                    WritePlan::Apply(mutation) => apply_mutation(tx, mutation),
                    WritePlan::Defer(operation) => {
                        enqueue(tx, &operation).map(WriteOutcome::Scheduled)
                    }
                }
            })
        })
        .await
    }

    async fn due_operations(
        &self,
        now: Timestamp,
    ) -> TaskRepositoryResult<Vec<DeferredOperation>> {
        self.run_blocking(move |connection| {
            let rows = deferred_ops::table
                .filter(deferred_ops::execute_at.le(now.as_datetime()))
                .order((deferred_ops::execute_at.asc(), deferred_ops::id.asc()))
                .select(DeferredOpRow::as_select())
                .load::<DeferredOpRow>(connection)?;

            let mut due = Vec::with_capacity(rows.len());
            for row in rows {
                let op_id = row.id;
                match row_to_operation(row) {
                    Ok(operation) => due.push(operation),
                    Err(err) => {
                        warn!(op_id, error = %err, "purging undecodable deferred operation");
                        diesel::delete(deferred_ops::table.find(op_id)).execute(connection)?;
                    }
                }
            }
            Ok(due)
        })
        .await
    }

    async fn pending_operations(&self) -> TaskRepositoryResult<Vec<DeferredOperation>> {
        self.run_blocking(|connection| {
            deferred_ops::table
                .order((deferred_ops::execute_at.asc(), deferred_ops::id.asc()))
                .select(DeferredOpRow::as_select())
                .load::<DeferredOpRow>(connection)?
                .into_iter()
                .map(row_to_operation)
                .collect()
        })
        .await
    }

    async fn execute_deferred(
        &self,
        op_id: DeferredOperationId,
        now: Timestamp,
    ) -> TaskRepositoryResult<DeferredOutcome> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, TaskRepositoryError, _>(|tx| {
                // Claiming by delete makes a concurrent claimant see zero rows.
                let claimed = diesel::delete(deferred_ops::table.find(op_id.value()))
                    .returning(DeferredOpRow::as_returning())
                    .get_result::<DeferredOpRow>(tx)
                    .optional()?;
                let Some(row) = claimed else {
                    return Ok(DeferredOutcome::Vanished);
                };
                let operation = row_to_operation(row)?;
                let current = match operation.task_id() {
                    Some(task_id) => lock_task(tx, task_id)?,
                    None => None,
                };

                match plan_deferred(&operation, current.as_ref(), now) {
                    DeferredVerdict::Discard(reason) => Ok(DeferredOutcome::Discarded(reason)),
                    DeferredVerdict::Apply(mutation) => {
                        apply_mutation(tx, mutation)?;
                        Ok(DeferredOutcome::Applied(operation.operation_type()))
                    }
                }
            })
        })
        .await
    }

    async fn discard_deferred(&self, op_id: DeferredOperationId) -> TaskRepositoryResult<bool> {
        self.run_blocking(move |connection| {
            let removed =
                diesel::delete(deferred_ops::table.find(op_id.value())).execute(connection)?;
            Ok(removed > 0)
        })
        .await
    }
}

fn lock_task(
    connection: &mut PgConnection,
    task_id: TaskId,
) -> TaskRepositoryResult<Option<Task>> {
    let row = tasks::table
        .find(task_id.value())
        .select(TaskRow::as_select())
        .for_update()
        .first::<TaskRow>(connection)
        .optional()?;
    row.map(row_to_task).transpose()
}

fn apply_mutation(
    connection: &mut PgConnection,
    mutation: TaskMutation,
) -> TaskRepositoryResult<WriteOutcome> {
    match mutation {
        TaskMutation::Insert {
            fields,
            created_at,
            watermark,
        } => {
            let new_row = NewTaskRow {
                title: fields.title.to_string(),
                content: fields.content.clone().map(String::from),
                due_date: fields.due_date,
                done: fields.done,
                created_at: created_at.as_datetime(),
                updated_at: created_at.as_datetime(),
                last_request_ts: watermark.as_datetime(),
            };
            let row = diesel::insert_into(tasks::table)
                .values(&new_row)
                .returning(TaskRow::as_returning())
                .get_result::<TaskRow>(connection)
                .map_err(|err| map_unique_violation(err, &fields))?;
            row_to_task(row).map(WriteOutcome::Created)
        }
        TaskMutation::Replace {
            task_id,
            fields,
            updated_at,
            watermark,
        } => {
            let changeset = TaskChangeset {
                title: fields.title.to_string(),
                content: fields.content.clone().map(String::from),
                due_date: fields.due_date,
                done: fields.done,
                updated_at: updated_at.as_datetime(),
                last_request_ts: watermark.as_datetime(),
            };
            let row = diesel::update(tasks::table.find(task_id.value()))
                .set(&changeset)
                .returning(TaskRow::as_returning())
                .get_result::<TaskRow>(connection)
                .optional()
                .map_err(|err| map_unique_violation(err, &fields))?
                .ok_or(TaskRepositoryError::NotFound(task_id))?;
            row_to_task(row).map(WriteOutcome::Updated)
        }
        TaskMutation::Remove { task_id } => {
            let removed =
                diesel::delete(tasks::table.find(task_id.value())).execute(connection)?;
            if removed == 0 {
                return Err(TaskRepositoryError::NotFound(task_id));
            }
            Ok(WriteOutcome::Deleted(task_id))
        }
    }
}

fn enqueue(
    connection: &mut PgConnection,
    operation: &NewDeferredOperation,
) -> TaskRepositoryResult<ScheduledWrite> {
    let payload = encode_payload(&operation.action, operation.request_ts)?;
    let new_row = NewDeferredOpRow {
        task_id: operation.action.task_id().map(TaskId::value),
        op_type: operation.action.operation_type().as_str().to_owned(),
        payload,
        execute_at: operation.execute_at.as_datetime(),
        request_ts: operation.request_ts.as_datetime(),
        created_at: operation.created_at.as_datetime(),
    };
    let op_id = diesel::insert_into(deferred_ops::table)
        .values(&new_row)
        .returning(deferred_ops::id)
        .get_result::<i64>(connection)?;

    Ok(ScheduledWrite {
        op_id: DeferredOperationId::new(op_id),
        task_id: operation.action.task_id(),
        execute_at: operation.execute_at,
    })
}

fn encode_payload(
    action: &DeferredAction,
    request_timestamp: Timestamp,
) -> TaskRepositoryResult<serde_json::Value> {
    let encoded = match action.fields() {
        Some(fields) => serde_json::to_value(FieldsPayload {
            fields: fields.clone(),
            request_timestamp,
        }),
        None => serde_json::to_value(DeletePayload { request_timestamp }),
    };
    encoded.map_err(TaskRepositoryError::persistence)
}

fn row_to_operation(row: DeferredOpRow) -> TaskRepositoryResult<DeferredOperation> {
    let DeferredOpRow {
        id,
        task_id,
        op_type,
        payload,
        execute_at,
        request_ts,
        created_at,
    } = row;

    let op_type =
        OperationType::try_from(op_type.as_str()).map_err(TaskRepositoryError::persistence)?;
    let target = || {
        task_id.map(TaskId::new).ok_or_else(|| {
            TaskRepositoryError::persistence(std::io::Error::other(format!(
                "deferred {} operation {id} has no target task",
                op_type.as_str()
            )))
        })
    };
    let action = match op_type {
        OperationType::Create => DeferredAction::Create(decode_fields(payload)?),
        OperationType::Update => DeferredAction::Update {
            task_id: target()?,
            fields: decode_fields(payload)?,
        },
        OperationType::Delete => DeferredAction::Delete { task_id: target()? },
    };

    let planned = NewDeferredOperation {
        action,
        execute_at: Timestamp::from_instant(execute_at),
        request_ts: Timestamp::from_instant(request_ts),
        created_at: Timestamp::from_instant(created_at),
    };
    Ok(planned.with_id(DeferredOperationId::new(id)))
}

fn decode_fields(payload: serde_json::Value) -> TaskRepositoryResult<TaskFields> {
    serde_json::from_value::<FieldsPayload>(payload)
        .map(|decoded| decoded.fields)
        .map_err(TaskRepositoryError::persistence)
}

fn row_to_task(row: TaskRow) -> TaskRepositoryResult<Task> {
    let TaskRow {
        id,
        title,
        content,
        due_date,
        done,
        created_at,
        updated_at,
        last_request_ts,
    } = row;

    let fields = TaskFields {
        title: TaskTitle::new(title).map_err(TaskRepositoryError::persistence)?,
        content: content
            .map(TaskContent::new)
            .transpose()
            .map_err(TaskRepositoryError::persistence)?,
        due_date,
        done,
    };
    Ok(Task::from_persisted(PersistedTaskData {
        id: TaskId::new(id),
        fields,
        created_at: Timestamp::from_instant(created_at),
        updated_at: Timestamp::from_instant(updated_at),
        last_request_ts: Timestamp::from_instant(last_request_ts),
    }))
}

fn map_unique_violation(err: DieselError, fields: &TaskFields) -> TaskRepositoryError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
            if is_title_due_unique_violation(info.as_ref()) =>
        {
            TaskRepositoryError::DuplicateTitleDueDate {
                title: fields.title.to_string(),
                due_date: fields.due_date,
            }
        }
        _ => TaskRepositoryError::persistence(err),
    }
}

fn is_title_due_unique_violation(info: &dyn DatabaseErrorInformation) -> bool {
    info.constraint_name()
        .is_some_and(|name| name == TITLE_DUE_UNIQUE_CONSTRAINT)
}
