//! Application context wiring the service, router, and deferred processor.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use mockable::Clock;
use tracing::info;

use crate::http::task_router;
use crate::task::{
    ports::TaskRepository,
    services::{DeferredOperationProcessor, ProcessorHandle, TaskService},
};

/// Explicit application context built once at startup.
///
/// Owns the task service handed to HTTP handlers and the handle of the
/// background deferred-operation processor.
pub struct TaskApp<R, C>
where
    R: TaskRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    service: TaskService<R, C>,
    processor: DeferredOperationProcessor<R, C>,
    interval: Duration,
    handle: Option<ProcessorHandle>,
}

impl<R, C> TaskApp<R, C>
where
    R: TaskRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Builds the context. The processor does not run until [`Self::start`].
    #[must_use]
    pub fn new(repository: Arc<R>, clock: Arc<C>, interval: Duration) -> Self {
        Self {
            service: TaskService::new(Arc::clone(&repository), Arc::clone(&clock)),
            processor: DeferredOperationProcessor::new(repository, clock),
            interval,
            handle: None,
        }
    }

    /// Returns the task service.
    #[must_use]
    pub const fn service(&self) -> &TaskService<R, C> {
        &self.service
    }

    /// Returns the deferred-operation processor.
    #[must_use]
    pub const fn processor(&self) -> &DeferredOperationProcessor<R, C> {
        &self.processor
    }

    /// Builds the HTTP router bound to this context's service.
    #[must_use]
    pub fn router(&self) -> Router {
        task_router(self.service.clone())
    }

    /// Starts the processor loop. Calling it while running is a no-op.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.handle = Some(self.processor.clone().spawn(self.interval));
    }

    /// Stops the processor loop and waits for it to exit.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown_and_join().await;
            info!("task application stopped");
        }
    }

    /// Returns `true` while the processor loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
