//! Task aggregate and the validated field set it carries.

use super::{TaskDomainError, TaskId, Timestamp};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated task title: non-empty, at most [`TaskTitle::MAX_CHARS`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskTitle(String);

impl TaskTitle {
    /// Maximum number of characters accepted in a title.
    pub const MAX_CHARS: usize = 255;

    /// Creates a validated title.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] for an empty value or
    /// [`TaskDomainError::TitleTooLong`] when the limit is exceeded.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        if raw.is_empty() {
            return Err(TaskDomainError::EmptyTitle);
        }
        let length = raw.chars().count();
        if length > Self::MAX_CHARS {
            return Err(TaskDomainError::TitleTooLong {
                length,
                limit: Self::MAX_CHARS,
            });
        }
        Ok(Self(raw))
    }

    /// Returns the title as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TaskTitle {
    type Error = TaskDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaskTitle> for String {
    fn from(title: TaskTitle) -> Self {
        title.0
    }
}

impl fmt::Display for TaskTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated task content of at most [`TaskContent::MAX_CHARS`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskContent(String);

impl TaskContent {
    /// Maximum number of characters accepted in task content.
    pub const MAX_CHARS: usize = 10_000;

    /// Creates validated content.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::ContentTooLong`] when the limit is exceeded.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        let length = raw.chars().count();
        if length > Self::MAX_CHARS {
            return Err(TaskDomainError::ContentTooLong {
                length,
                limit: Self::MAX_CHARS,
            });
        }
        Ok(Self(raw))
    }

    /// Returns the content as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TaskContent {
    type Error = TaskDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaskContent> for String {
    fn from(content: TaskContent) -> Self {
        content.0
    }
}

/// The user-editable field set of a task.
///
/// Deferred create and update operations snapshot exactly this structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFields {
    /// Task title.
    pub title: TaskTitle,
    /// Optional free-form notes.
    pub content: Option<TaskContent>,
    /// Optional calendar due date.
    pub due_date: Option<NaiveDate>,
    /// Completion flag.
    pub done: bool,
}

impl TaskFields {
    /// Returns `true` when both fields share the `(title, due_date)` key.
    ///
    /// Rows without a due date never collide, matching SQL `UNIQUE`
    /// semantics where nulls are distinct.
    #[must_use]
    pub fn shares_unique_key_with(&self, other: &Self) -> bool {
        self.due_date.is_some() && self.due_date == other.due_date && self.title == other.title
    }
}

/// Field set supplied when creating a task. New tasks always start undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    /// Task title.
    pub title: TaskTitle,
    /// Optional free-form notes.
    pub content: Option<TaskContent>,
    /// Optional calendar due date.
    pub due_date: Option<NaiveDate>,
}

impl TaskDraft {
    /// Expands the draft into the initial field set.
    #[must_use]
    pub fn into_fields(self) -> TaskFields {
        TaskFields {
            title: self.title,
            content: self.content,
            due_date: self.due_date,
            done: false,
        }
    }
}

/// Partial field set supplied with an update; absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// Replacement title.
    pub title: Option<TaskTitle>,
    /// Replacement content.
    pub content: Option<TaskContent>,
    /// Replacement due date.
    pub due_date: Option<NaiveDate>,
    /// Replacement completion flag.
    pub done: Option<bool>,
}

impl TaskPatch {
    /// Merges the patch over `current`, producing the effective field set.
    #[must_use]
    pub fn merge_onto(&self, current: &TaskFields) -> TaskFields {
        TaskFields {
            title: self
                .title
                .clone()
                .unwrap_or_else(|| current.title.clone()),
            content: self.content.clone().or_else(|| current.content.clone()),
            due_date: self.due_date.or(current.due_date),
            done: self.done.unwrap_or(current.done),
        }
    }
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    fields: TaskFields,
    created_at: Timestamp,
    updated_at: Timestamp,
    last_request_ts: Timestamp,
}

/// Parameter object for reconstructing a persisted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted field set.
    pub fields: TaskFields,
    /// Persisted creation timestamp.
    pub created_at: Timestamp,
    /// Persisted latest mutation timestamp.
    pub updated_at: Timestamp,
    /// Logical timestamp of the latest accepted write.
    pub last_request_ts: Timestamp,
}

impl Task {
    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            fields: data.fields,
            created_at: data.created_at,
            updated_at: data.updated_at,
            last_request_ts: data.last_request_ts,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the full field set.
    #[must_use]
    pub const fn fields(&self) -> &TaskFields {
        &self.fields
    }

    /// Returns the task title.
    #[must_use]
    pub const fn title(&self) -> &TaskTitle {
        &self.fields.title
    }

    /// Returns the task content, if any.
    #[must_use]
    pub const fn content(&self) -> Option<&TaskContent> {
        self.fields.content.as_ref()
    }

    /// Returns the due date, if any.
    #[must_use]
    pub const fn due_date(&self) -> Option<NaiveDate> {
        self.fields.due_date
    }

    /// Returns the completion flag.
    #[must_use]
    pub const fn done(&self) -> bool {
        self.fields.done
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Returns the wall-clock time of the latest mutation.
    #[must_use]
    pub const fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Returns the watermark: the logical time of the latest accepted write.
    #[must_use]
    pub const fn last_request_ts(&self) -> Timestamp {
        self.last_request_ts
    }

    /// Returns `true` when a write stamped `requested_at` may follow the
    /// current watermark. Equal instants are refused.
    #[must_use]
    pub fn accepts_write_at(&self, requested_at: impl Into<DateTime<Utc>>) -> bool {
        requested_at.into() > self.last_request_ts.as_datetime()
    }
}
