//! Application services for task reads, writes, and deferred execution.

mod processor;
mod tasks;

pub use processor::{DeferredOperationProcessor, ProcessorHandle, TickReport};
pub use tasks::{
    CreateTaskRequest, DeleteTaskRequest, TaskErrorKind, TaskService, TaskServiceError,
    TaskServiceResult, UpdateTaskRequest,
};
