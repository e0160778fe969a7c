//! Diesel row models and JSON payloads for task persistence.

use super::schema::{deferred_ops, tasks};
use crate::task::domain::{TaskFields, Timestamp};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Server-assigned task identifier.
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
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Logical timestamp of the latest accepted write.
    pub last_request_ts: DateTime<Utc>,
}

/// Insert model for task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTaskRow {
    /// Task title.
    pub title: String,
    /// Optional notes.
    pub content: Option<String>,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Completion flag.
    pub done: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Initial mutation timestamp, equal to `created_at`.
    pub updated_at: DateTime<Utc>,
    /// Initial watermark.
    pub last_request_ts: DateTime<Utc>,
}

/// Full overwrite of a task's mutable columns.
///
/// `None` writes SQL `NULL`; merged field sets are always complete.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = tasks)]
#[diesel(treat_none_as_null = true)]
pub struct TaskChangeset {
    /// Replacement title.
    pub title: String,
    /// Replacement notes.
    pub content: Option<String>,
    /// Replacement due date.
    pub due_date: Option<NaiveDate>,
    /// Replacement completion flag.
    pub done: bool,
    /// Mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Advanced watermark.
    pub last_request_ts: DateTime<Utc>,
}

/// Query result row for queued deferred operations.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = deferred_ops)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DeferredOpRow {
    /// Server-assigned operation identifier.
    pub id: i64,
    /// Target task, null for creates.
    pub task_id: Option<i64>,
    /// Operation kind label.
    pub op_type: String,
    /// Encoded [`FieldsPayload`] or [`DeletePayload`].
    pub payload: Value,
    /// Earliest execution instant.
    pub execute_at: DateTime<Utc>,
    /// Logical timestamp of the originating request.
    pub request_ts: DateTime<Utc>,
    /// Enqueue timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert model for deferred operations.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = deferred_ops)]
pub struct NewDeferredOpRow {
    /// Target task, null for creates.
    pub task_id: Option<i64>,
    /// Operation kind label.
    pub op_type: String,
    /// Encoded operation payload.
    pub payload: Value,
    /// Earliest execution instant.
    pub execute_at: DateTime<Utc>,
    /// Logical timestamp of the originating request.
    pub request_ts: DateTime<Utc>,
    /// Enqueue timestamp.
    pub created_at: DateTime<Utc>,
}

/// Stored payload for create and update operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsPayload {
    /// Effective field set to write.
    #[serde(flatten)]
    pub fields: TaskFields,
    /// Logical timestamp of the originating request.
    pub request_timestamp: Timestamp,
}

/// Stored payload for delete operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePayload {
    /// Logical timestamp of the originating request.
    pub request_timestamp: Timestamp,
}
