//! Write admission and deferred re-validation rules.
//!
//! Both functions here are pure: storage adapters call them inside the
//! transaction that holds the target row, then persist whatever effect they
//! return.
//!
//! The rules:
//!
//! - update and delete require an existing target whose watermark is strictly
//!   older than the request instant as sent; equal instants are stale
//! - a request timestamp strictly after `now` defers the write
//! - everything else applies immediately, stamping the request timestamp as
//!   the new watermark

use super::{
    DeferredAction, DeferredOperation, NewDeferredOperation, Task, TaskDraft, TaskFields, TaskId,
    TaskPatch, Timestamp,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// The write a client asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteIntent {
    /// Create a new task.
    Create(TaskDraft),
    /// Merge a patch over an existing task.
    Update {
        /// Target task.
        task_id: TaskId,
        /// Fields to change.
        patch: TaskPatch,
    },
    /// Remove an existing task.
    Delete {
        /// Target task.
        task_id: TaskId,
    },
}

impl WriteIntent {
    /// Returns the target task for updates and deletes.
    #[must_use]
    pub const fn target(&self) -> Option<TaskId> {
        match self {
            Self::Create(_) => None,
            Self::Update { task_id, .. } | Self::Delete { task_id } => Some(*task_id),
        }
    }
}

/// A validated write together with its logical timestamp.
///
/// Keeps the client's instant as sent for the watermark check, alongside
/// the whole-second value used for scheduling and storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    intent: WriteIntent,
    requested_at: DateTime<Utc>,
    request_ts: Timestamp,
}

impl WriteRequest {
    /// Pairs an intent with the instant the client stamped it with.
    #[must_use]
    pub fn new(intent: WriteIntent, requested_at: impl Into<DateTime<Utc>>) -> Self {
        let requested_at = requested_at.into();
        Self {
            intent,
            requested_at,
            request_ts: Timestamp::from_instant(requested_at),
        }
    }

    /// Returns the requested write.
    #[must_use]
    pub const fn intent(&self) -> &WriteIntent {
        &self.intent
    }

    /// Returns the instant as supplied, sub-seconds included.
    #[must_use]
    pub const fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    /// Returns the normalised logical timestamp.
    #[must_use]
    pub const fn request_ts(&self) -> Timestamp {
        self.request_ts
    }
}

/// A task-store mutation ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskMutation {
    /// Insert a new row.
    Insert {
        /// Initial field set.
        fields: TaskFields,
        /// Value for both `created_at` and `updated_at`.
        created_at: Timestamp,
        /// Initial watermark.
        watermark: Timestamp,
    },
    /// Overwrite the field set of an existing row.
    Replace {
        /// Target task.
        task_id: TaskId,
        /// Effective field set after the merge.
        fields: TaskFields,
        /// New `updated_at`.
        updated_at: Timestamp,
        /// New watermark.
        watermark: Timestamp,
    },
    /// Physically remove a row.
    Remove {
        /// Target task.
        task_id: TaskId,
    },
}

/// Outcome of admission for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritePlan {
    /// Apply the mutation now.
    Apply(TaskMutation),
    /// Queue the operation for later execution.
    Defer(NewDeferredOperation),
}

/// Reasons a write is refused at admission.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AdmissionRejection {
    /// The target task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The request timestamp does not advance the stored watermark.
    #[error("request timestamp {requested} is not newer than {watermark} on task {task_id}")]
    Stale {
        /// Target task.
        task_id: TaskId,
        /// Normalised request timestamp.
        requested: Timestamp,
        /// Stored watermark.
        watermark: Timestamp,
    },
}

/// Decides how a write request is handled.
///
/// `current` must be the locked row for [`WriteRequest::intent`]'s target,
/// or `None` when the target is missing or the intent is a create.
///
/// # Errors
///
/// Returns [`AdmissionRejection::NotFound`] when an update or delete has no
/// target row, and [`AdmissionRejection::Stale`] when the request timestamp
/// does not strictly exceed the stored watermark.
pub fn plan_write(
    request: &WriteRequest,
    current: Option<&Task>,
    now: Timestamp,
) -> Result<WritePlan, AdmissionRejection> {
    let request_ts = request.request_ts();
    let deferred = request_ts > now;

    match request.intent() {
        WriteIntent::Create(draft) => {
            let fields = draft.clone().into_fields();
            if deferred {
                return Ok(WritePlan::Defer(defer(
                    DeferredAction::Create(fields),
                    request_ts,
                    now,
                )));
            }
            Ok(WritePlan::Apply(TaskMutation::Insert {
                fields,
                created_at: now,
                watermark: request_ts,
            }))
        }
        WriteIntent::Update { task_id, patch } => {
            let task = admit_target(*task_id, current, request)?;
            let fields = patch.merge_onto(task.fields());
            if deferred {
                return Ok(WritePlan::Defer(defer(
                    DeferredAction::Update {
                        task_id: *task_id,
                        fields,
                    },
                    request_ts,
                    now,
                )));
            }
            Ok(WritePlan::Apply(TaskMutation::Replace {
                task_id: *task_id,
                fields,
                updated_at: now,
                watermark: request_ts,
            }))
        }
        WriteIntent::Delete { task_id } => {
            admit_target(*task_id, current, request)?;
            if deferred {
                return Ok(WritePlan::Defer(defer(
                    DeferredAction::Delete { task_id: *task_id },
                    request_ts,
                    now,
                )));
            }
            Ok(WritePlan::Apply(TaskMutation::Remove { task_id: *task_id }))
        }
    }
}

fn admit_target<'a>(
    task_id: TaskId,
    current: Option<&'a Task>,
    request: &WriteRequest,
) -> Result<&'a Task, AdmissionRejection> {
    let task = current
        .filter(|task| task.id() == task_id)
        .ok_or(AdmissionRejection::NotFound(task_id))?;
    if !task.accepts_write_at(request.requested_at()) {
        return Err(AdmissionRejection::Stale {
            task_id,
            requested: request.request_ts(),
            watermark: task.last_request_ts(),
        });
    }
    Ok(task)
}

const fn defer(
    action: DeferredAction,
    request_ts: Timestamp,
    now: Timestamp,
) -> NewDeferredOperation {
    NewDeferredOperation {
        action,
        execute_at: request_ts,
        request_ts,
        created_at: now,
    }
}

/// Why a due deferred operation was dropped without effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The target task no longer exists.
    TargetMissing(TaskId),
    /// A write at or after the operation's timestamp already landed.
    Superseded {
        /// Watermark found on the target at execution time.
        watermark: Timestamp,
    },
}

impl DiscardReason {
    /// Short machine-readable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TargetMissing(_) => "target_missing",
            Self::Superseded { .. } => "superseded",
        }
    }
}

/// Result of re-validating a due deferred operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredVerdict {
    /// Apply the mutation and drop the operation.
    Apply(TaskMutation),
    /// Drop the operation without touching the task store.
    Discard(DiscardReason),
}

/// Re-validates a due operation against the current state of its target.
///
/// Creates skip the watermark check. Updates and deletes are discarded when
/// the target vanished or when the stored watermark is not strictly older
/// than the operation's request timestamp.
#[must_use]
pub fn plan_deferred(
    operation: &DeferredOperation,
    current: Option<&Task>,
    now: Timestamp,
) -> DeferredVerdict {
    let request_ts = operation.request_ts();
    let (task_id, fields) = match operation.action() {
        DeferredAction::Create(fields) => {
            return DeferredVerdict::Apply(TaskMutation::Insert {
                fields: fields.clone(),
                created_at: now,
                watermark: request_ts,
            });
        }
        DeferredAction::Update { task_id, fields } => (*task_id, Some(fields)),
        DeferredAction::Delete { task_id } => (*task_id, None),
    };

    let Some(task) = current.filter(|task| task.id() == task_id) else {
        return DeferredVerdict::Discard(DiscardReason::TargetMissing(task_id));
    };
    if !task.accepts_write_at(request_ts) {
        return DeferredVerdict::Discard(DiscardReason::Superseded {
            watermark: task.last_request_ts(),
        });
    }

    let mutation = match fields {
        Some(fields) => TaskMutation::Replace {
            task_id,
            fields: fields.clone(),
            updated_at: now,
            watermark: request_ts,
        },
        None => TaskMutation::Remove { task_id },
    };
    DeferredVerdict::Apply(mutation)
}
