//! `PostgreSQL` integration tests for deferred execution.

use chrono::{Duration, NaiveDate};
use rstest::rstest;
use taskdeck::task::{
    domain::{OperationType, TaskId},
    ports::{DeferredOutcome, TaskRepository, WriteOutcome},
    services::{CreateTaskRequest, DeleteTaskRequest, UpdateTaskRequest},
};

use crate::postgres::helpers::{BoxError, PostgresContext, context, timestamp};

async fn seed(ctx: &PostgresContext, title: &str) -> Result<TaskId, BoxError> {
    let request = CreateTaskRequest::new(title, "2025-09-25T19:00:00Z");
    match ctx.service.create(request).await? {
        WriteOutcome::Created(task) => Ok(task.id()),
        other => Err(format!("expected an immediate create, got {other:?}").into()),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_applies_due_update_and_dequeues(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    let id = seed(&ctx, "Write").await?;
    let request = UpdateTaskRequest::new(id, "2025-09-25T20:00:30Z").with_title("Rewrite");
    ctx.service.update(request).await?;

    ctx.clock.advance(Duration::seconds(30));
    let report = ctx.processor.tick().await?;
    assert_eq!(report.applied, 1);

    let task = ctx.service.get(id).await?;
    assert_eq!(task.title().as_str(), "Rewrite");
    assert_eq!(task.last_request_ts(), timestamp("2025-09-25T20:00:30Z")?);
    assert_eq!(task.updated_at(), timestamp("2025-09-25T20:00:30Z")?);
    assert!(ctx.repository.pending_operations().await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_discards_superseded_and_orphaned_operations(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    let kept = seed(&ctx, "Kept").await?;
    let removed = seed(&ctx, "Removed").await?;

    let superseded = UpdateTaskRequest::new(kept, "2025-09-25T20:00:10Z").with_title("Stale");
    ctx.service.update(superseded).await?;
    let orphaned = UpdateTaskRequest::new(removed, "2025-09-25T20:00:10Z").with_done(true);
    ctx.service.update(orphaned).await?;

    ctx.clock.advance(Duration::seconds(20));
    let newer = UpdateTaskRequest::new(kept, "2025-09-25T20:00:15Z").with_title("Fresh");
    ctx.service.update(newer).await?;
    ctx.service
        .delete(DeleteTaskRequest::new(removed, "2025-09-25T20:00:15Z"))
        .await?;

    let report = ctx.processor.tick().await?;
    assert_eq!(report.discarded, 2);
    assert_eq!(ctx.service.get(kept).await?.title().as_str(), "Fresh");
    assert!(ctx.repository.pending_operations().await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_execute_reports_outcomes_once(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    let id = seed(&ctx, "Write").await?;
    let WriteOutcome::Scheduled(ack) = ctx
        .service
        .delete(DeleteTaskRequest::new(id, "2025-09-25T20:00:05Z"))
        .await?
    else {
        return Err("expected a scheduled delete".into());
    };

    let now = timestamp("2025-09-25T20:00:05Z")?;
    let first = ctx.repository.execute_deferred(ack.op_id, now).await?;
    assert_eq!(first, DeferredOutcome::Applied(OperationType::Delete));
    let second = ctx.repository.execute_deferred(ack.op_id, now).await?;
    assert_eq!(second, DeferredOutcome::Vanished);
    assert!(ctx.repository.find_by_id(id).await?.is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_failed_apply_rolls_back_and_processor_drops_it(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    let due = NaiveDate::from_ymd_opt(2025, 10, 1).ok_or("invalid date")?;
    let later = CreateTaskRequest::new("Write", "2025-09-25T20:00:05Z").with_due_date(due);
    let WriteOutcome::Scheduled(ack) = ctx.service.create(later).await? else {
        return Err("expected a scheduled create".into());
    };
    let now = CreateTaskRequest::new("Write", "2025-09-25T19:00:00Z").with_due_date(due);
    ctx.service.create(now).await?;

    let at = timestamp("2025-09-25T20:00:05Z")?;
    let failure = ctx.repository.execute_deferred(ack.op_id, at).await;
    assert!(failure.is_err(), "colliding deferred create should fail");
    assert_eq!(ctx.repository.pending_operations().await?.len(), 1);

    ctx.clock.advance(Duration::seconds(5));
    let report = ctx.processor.tick().await?;
    assert_eq!(report.failed, 1);
    assert!(ctx.repository.pending_operations().await?.is_empty());
    assert_eq!(ctx.service.list().await?.len(), 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_deferred_create_is_applied(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    let request = CreateTaskRequest::new("Later", "2025-09-25T20:00:03Z");
    ctx.service.create(request).await?;

    ctx.clock.advance(Duration::seconds(3));
    let report = ctx.processor.tick().await?;
    assert_eq!(report.applied, 1);

    let tasks = ctx.service.list().await?;
    let task = tasks.first().ok_or("deferred create should insert a row")?;
    assert_eq!(task.title().as_str(), "Later");
    assert_eq!(task.last_request_ts(), timestamp("2025-09-25T20:00:03Z")?);
    Ok(())
}
