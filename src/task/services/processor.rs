//! Periodic executor for deferred task operations.

use crate::task::{
    domain::{DeferredOperation, TaskId, Timestamp},
    ports::{DeferredOutcome, TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Counts of what a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Operations whose effect was applied.
    pub applied: usize,
    /// Operations dropped after re-validation.
    pub discarded: usize,
    /// Operations dropped because processing them failed.
    pub failed: usize,
    /// Operations claimed elsewhere before this tick reached them.
    pub skipped: usize,
}

impl TickReport {
    /// Returns `true` when the tick found nothing to do.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.applied == 0 && self.discarded == 0 && self.failed == 0 && self.skipped == 0
    }
}

/// Applies or discards due deferred operations.
pub struct DeferredOperationProcessor<R, C>
where
    R: TaskRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> Clone for DeferredOperationProcessor<R, C>
where
    R: TaskRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R, C> DeferredOperationProcessor<R, C>
where
    R: TaskRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a processor over the given repository and clock.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    /// Processes every operation due at the current clock reading.
    ///
    /// Operations run in `execute_at` order. A failure on one operation
    /// discards it and moves on to the next.
    ///
    /// # Errors
    ///
    /// Returns the repository error when the due operations cannot be listed.
    pub async fn tick(&self) -> TaskRepositoryResult<TickReport> {
        let now = Timestamp::now(&*self.clock);
        let due = self.repository.due_operations(now).await?;
        let mut report = TickReport::default();

        for operation in due {
            match self.repository.execute_deferred(operation.id(), now).await {
                Ok(DeferredOutcome::Applied(op_type)) => {
                    report.applied += 1;
                    debug!(
                        op_id = operation.id().value(),
                        op_type = op_type.as_str(),
                        "deferred operation applied"
                    );
                }
                Ok(DeferredOutcome::Discarded(reason)) => {
                    report.discarded += 1;
                    debug!(
                        op_id = operation.id().value(),
                        task_id = ?operation.task_id().map(TaskId::value),
                        reason = reason.as_str(),
                        "deferred operation discarded"
                    );
                }
                Ok(DeferredOutcome::Vanished) => report.skipped += 1,
                Err(err) => {
                    report.failed += 1;
                    self.drop_failed(&operation, &err).await;
                }
            }
        }

        if !report.is_empty() {
            debug!(
                applied = report.applied,
                discarded = report.discarded,
                failed = report.failed,
                skipped = report.skipped,
                "deferred tick finished"
            );
        }
        Ok(report)
    }

    async fn drop_failed(&self, operation: &DeferredOperation, cause: &TaskRepositoryError) {
        warn!(
            op_id = operation.id().value(),
            task_id = ?operation.task_id().map(TaskId::value),
            op_type = operation.operation_type().as_str(),
            error = %cause,
            "deferred operation failed; discarding"
        );
        if let Err(err) = self.repository.discard_deferred(operation.id()).await {
            warn!(
                op_id = operation.id().value(),
                error = %err,
                "failed to discard deferred operation"
            );
        }
    }

    /// Runs [`Self::tick`] every `period` on a background task until the
    /// returned handle is shut down.
    ///
    /// Shutdown is observed between ticks; a tick in progress completes.
    #[must_use]
    pub fn spawn(self, period: Duration) -> ProcessorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period = ?period, "deferred operation processor started");
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                    _ = interval.tick() => {}
                }
                if let Err(err) = self.tick().await {
                    error!(error = %err, "deferred tick failed");
                }
            }
            info!("deferred operation processor stopped");
        });
        ProcessorHandle { shutdown_tx, join }
    }
}

/// Handle to a running processor loop.
#[derive(Debug)]
pub struct ProcessorHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ProcessorHandle {
    /// Asks the loop to stop after the current tick.
    pub fn request_shutdown(&self) {
        if self.shutdown_tx.send(true).is_err() {
            debug!("deferred operation processor already stopped");
        }
    }

    /// Returns `true` once the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(err) = self.join.await {
            warn!(error = %err, "deferred operation processor panicked");
        }
    }
}
