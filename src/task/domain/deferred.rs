//! Deferred operations: writes whose logical timestamp lies in the future.

use super::{DeferredOperationId, ParseOperationTypeError, TaskFields, TaskId, Timestamp};

/// Kind of write carried by a deferred operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    /// Insert a new task.
    Create,
    /// Replace the field set of an existing task.
    Update,
    /// Physically remove an existing task.
    Delete,
}

impl OperationType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl TryFrom<&str> for OperationType {
    type Error = ParseOperationTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(ParseOperationTypeError(value.to_owned())),
        }
    }
}

/// Effect snapshot stored with a deferred operation.
///
/// Update snapshots hold the merged effective field set computed at enqueue
/// time, not the sparse patch the client sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    /// Create a task with the given initial fields.
    Create(TaskFields),
    /// Overwrite the target task with the given fields.
    Update {
        /// Target task.
        task_id: TaskId,
        /// Effective field set to write.
        fields: TaskFields,
    },
    /// Delete the target task.
    Delete {
        /// Target task.
        task_id: TaskId,
    },
}

impl DeferredAction {
    /// Returns the operation type of this action.
    #[must_use]
    pub const fn operation_type(&self) -> OperationType {
        match self {
            Self::Create(_) => OperationType::Create,
            Self::Update { .. } => OperationType::Update,
            Self::Delete { .. } => OperationType::Delete,
        }
    }

    /// Returns the target task, absent for creates.
    #[must_use]
    pub const fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::Create(_) => None,
            Self::Update { task_id, .. } | Self::Delete { task_id } => Some(*task_id),
        }
    }

    /// Returns the field snapshot for create and update actions.
    #[must_use]
    pub const fn fields(&self) -> Option<&TaskFields> {
        match self {
            Self::Create(fields) | Self::Update { fields, .. } => Some(fields),
            Self::Delete { .. } => None,
        }
    }
}

/// Deferred operation that has not been assigned an identifier yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeferredOperation {
    /// Effect to apply once due.
    pub action: DeferredAction,
    /// Earliest instant at which the operation may run.
    pub execute_at: Timestamp,
    /// Logical timestamp of the originating request.
    pub request_ts: Timestamp,
    /// Server time of enqueue.
    pub created_at: Timestamp,
}

impl NewDeferredOperation {
    /// Attaches the storage-assigned identifier.
    #[must_use]
    pub fn with_id(self, id: DeferredOperationId) -> DeferredOperation {
        DeferredOperation { id, planned: self }
    }
}

/// Queued deferred operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredOperation {
    id: DeferredOperationId,
    planned: NewDeferredOperation,
}

impl DeferredOperation {
    /// Returns the operation identifier.
    #[must_use]
    pub const fn id(&self) -> DeferredOperationId {
        self.id
    }

    /// Returns the target task, absent for creates.
    #[must_use]
    pub const fn task_id(&self) -> Option<TaskId> {
        self.planned.action.task_id()
    }

    /// Returns the stored effect.
    #[must_use]
    pub const fn action(&self) -> &DeferredAction {
        &self.planned.action
    }

    /// Returns the operation type.
    #[must_use]
    pub const fn operation_type(&self) -> OperationType {
        self.planned.action.operation_type()
    }

    /// Returns the instant from which the operation is due.
    #[must_use]
    pub const fn execute_at(&self) -> Timestamp {
        self.planned.execute_at
    }

    /// Returns the logical timestamp of the originating request.
    #[must_use]
    pub const fn request_ts(&self) -> Timestamp {
        self.planned.request_ts
    }

    /// Returns the server time of enqueue.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.planned.created_at
    }

    /// Returns `true` when the operation is eligible at `now`.
    #[must_use]
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.planned.execute_at <= now
    }
}
