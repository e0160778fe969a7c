//! Domain model for timestamp-ordered task writes.
//!
//! The task domain models tasks, the deferred operations queued against them,
//! and the admission rules that order writes by client-declared logical
//! timestamps, while keeping all infrastructure concerns outside of the
//! domain boundary.

mod admission;
mod deferred;
mod error;
mod ids;
mod task;
mod timestamp;

pub use admission::{
    AdmissionRejection, DeferredVerdict, DiscardReason, TaskMutation, WriteIntent, WritePlan,
    WriteRequest, plan_deferred, plan_write,
};
pub use deferred::{DeferredAction, DeferredOperation, NewDeferredOperation, OperationType};
pub use error::{ParseOperationTypeError, TaskDomainError};
pub use ids::{DeferredOperationId, TaskId};
pub use task::{
    PersistedTaskData, Task, TaskContent, TaskDraft, TaskFields, TaskPatch, TaskTitle,
};
pub use timestamp::Timestamp;
