//! Request and response bodies for the task endpoints.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::task::{
    domain::{Task, TaskId, Timestamp},
    ports::ScheduledWrite,
    services::{CreateTaskRequest, DeleteTaskRequest, UpdateTaskRequest},
};

/// Body of `POST /tasks`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskBody {
    /// Task title.
    pub title: String,
    /// Optional notes.
    #[serde(default)]
    pub content: Option<String>,
    /// Optional due date as `YYYY-MM-DD`.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Logical timestamp of the write.
    pub request_timestamp: String,
}

impl From<CreateTaskBody> for CreateTaskRequest {
    fn from(body: CreateTaskBody) -> Self {
        let mut request = Self::new(body.title, body.request_timestamp);
        if let Some(content) = body.content {
            request = request.with_content(content);
        }
        if let Some(due_date) = body.due_date {
            request = request.with_due_date(due_date);
        }
        request
    }
}

/// Body of `PUT /tasks/{id}`. Absent or null fields keep their value.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTaskBody {
    /// Replacement title.
    #[serde(default)]
    pub title: Option<String>,
    /// Replacement notes.
    #[serde(default)]
    pub content: Option<String>,
    /// Replacement due date.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Replacement completion flag.
    #[serde(default)]
    pub done: Option<bool>,
    /// Logical timestamp of the write.
    pub request_timestamp: String,
}

impl UpdateTaskBody {
    /// Converts the body into a service request for `task_id`.
    #[must_use]
    pub fn into_request(self, task_id: TaskId) -> UpdateTaskRequest {
        let mut request = UpdateTaskRequest::new(task_id, self.request_timestamp);
        if let Some(title) = self.title {
            request = request.with_title(title);
        }
        if let Some(content) = self.content {
            request = request.with_content(content);
        }
        if let Some(due_date) = self.due_date {
            request = request.with_due_date(due_date);
        }
        if let Some(done) = self.done {
            request = request.with_done(done);
        }
        request
    }
}

/// Body of `DELETE /tasks/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteTaskBody {
    /// Logical timestamp of the write.
    pub request_timestamp: String,
}

impl DeleteTaskBody {
    /// Converts the body into a service request for `task_id`.
    #[must_use]
    pub fn into_request(self, task_id: TaskId) -> DeleteTaskRequest {
        DeleteTaskRequest::new(task_id, self.request_timestamp)
    }
}

/// Task representation returned by the API. The watermark stays internal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResponse {
    /// Task identifier.
    pub id: i64,
    /// Task title.
    pub title: String,
    /// Optional notes.
    pub content: Option<String>,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Completion flag.
    pub done: bool,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last mutation timestamp.
    pub updated_at: Timestamp,
}

impl From<&Task> for TaskResponse {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id().value(),
            title: task.title().to_string(),
            content: task.content().map(|content| content.as_str().to_owned()),
            due_date: task.due_date(),
            done: task.done(),
            created_at: task.created_at(),
            updated_at: task.updated_at(),
        }
    }
}

/// Acknowledgment for a write queued until its timestamp comes due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledResponse {
    /// Target task, omitted for creates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Always `true`.
    pub scheduled: bool,
    /// Instant from which the write is due.
    pub execute_at: Timestamp,
    /// Queued operation identifier.
    pub op_id: i64,
}

impl From<ScheduledWrite> for ScheduledResponse {
    fn from(ack: ScheduledWrite) -> Self {
        Self {
            id: ack.task_id.map(TaskId::value),
            scheduled: true,
            execute_at: ack.execute_at,
            op_id: ack.op_id.value(),
        }
    }
}

/// Confirmation of an immediate delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedResponse {
    /// Removed task identifier.
    pub id: i64,
    /// Always `true`.
    pub deleted: bool,
}
