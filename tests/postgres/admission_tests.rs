//! `PostgreSQL` integration tests for write admission.

use chrono::NaiveDate;
use rstest::rstest;
use taskdeck::task::{
    domain::TaskContent,
    ports::{TaskRepository, TaskRepositoryError, WriteOutcome},
    services::{
        CreateTaskRequest, DeleteTaskRequest, TaskErrorKind, TaskServiceError, UpdateTaskRequest,
    },
};

use crate::postgres::helpers::{BoxError, PostgresContext, context, timestamp};

async fn create(ctx: &PostgresContext, request: CreateTaskRequest) -> Result<i64, BoxError> {
    match ctx.service.create(request).await? {
        WriteOutcome::Created(task) => Ok(task.id().value()),
        other => Err(format!("expected an immediate create, got {other:?}").into()),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_create_persists_all_fields(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    let due = NaiveDate::from_ymd_opt(2025, 10, 1).ok_or("invalid date")?;
    let request = CreateTaskRequest::new("Write report", "2025-09-25T19:00:00.750Z")
        .with_content("quarterly numbers")
        .with_due_date(due);
    let id = create(&ctx, request).await?;

    let task = ctx.service.get(id.into()).await?;
    assert_eq!(task.title().as_str(), "Write report");
    assert_eq!(
        task.content().map(TaskContent::as_str),
        Some("quarterly numbers")
    );
    assert_eq!(task.due_date(), Some(due));
    assert!(!task.done());
    assert_eq!(task.created_at(), timestamp("2025-09-25T20:00:00Z")?);
    assert_eq!(task.last_request_ts(), timestamp("2025-09-25T19:00:00Z")?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_rejects_stale_and_equal_timestamps(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    let id = create(&ctx, CreateTaskRequest::new("Write", "2025-09-25T19:00:00Z")).await?;

    let newer = UpdateTaskRequest::new(id.into(), "2025-09-25T19:30:00Z").with_done(true);
    ctx.service.update(newer).await?;

    for stale_ts in ["2025-09-25T19:10:00Z", "2025-09-25T19:30:00Z"] {
        let stale = DeleteTaskRequest::new(id.into(), stale_ts);
        let err = ctx
            .service
            .delete(stale)
            .await
            .err()
            .ok_or("stale delete should fail")?;
        assert!(matches!(
            err,
            TaskServiceError::Repository(TaskRepositoryError::StaleWrite { .. })
        ));
    }
    assert!(ctx.service.get(id.into()).await?.done());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_admits_sub_second_newer_writes(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    let id = create(&ctx, CreateTaskRequest::new("Write", "2025-09-25T19:00:00Z")).await?;

    let request = UpdateTaskRequest::new(id.into(), "2025-09-25T19:00:00.500Z").with_done(true);
    ctx.service.update(request).await?;

    let task = ctx.service.get(id.into()).await?;
    assert!(task.done());
    assert_eq!(task.last_request_ts(), timestamp("2025-09-25T19:00:00Z")?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_maps_unique_violation_to_duplicate(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    let due = NaiveDate::from_ymd_opt(2025, 10, 1).ok_or("invalid date")?;
    let request = CreateTaskRequest::new("Write", "2025-09-25T19:00:00Z").with_due_date(due);
    create(&ctx, request.clone()).await?;

    let err = ctx
        .service
        .create(request)
        .await
        .err()
        .ok_or("duplicate should fail")?;
    assert_eq!(err.kind(), TaskErrorKind::Conflict);
    assert!(matches!(
        err,
        TaskServiceError::Repository(TaskRepositoryError::DuplicateTitleDueDate { .. })
    ));

    create(&ctx, CreateTaskRequest::new("Write", "2025-09-25T19:00:00Z")).await?;
    create(&ctx, CreateTaskRequest::new("Write", "2025-09-25T19:00:00Z")).await?;
    assert_eq!(ctx.service.list().await?.len(), 3);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_queues_future_update_with_merged_snapshot(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    let request = CreateTaskRequest::new("Write", "2025-09-25T19:00:00Z").with_content("notes");
    let id = create(&ctx, request).await?;

    let future = UpdateTaskRequest::new(id.into(), "2025-09-25T21:00:00Z").with_done(true);
    let WriteOutcome::Scheduled(ack) = ctx.service.update(future).await? else {
        return Err("expected a scheduled update".into());
    };
    assert_eq!(ack.execute_at, timestamp("2025-09-25T21:00:00Z")?);

    let pending = ctx.repository.pending_operations().await?;
    let operation = pending.first().ok_or("operation should be queued")?;
    assert_eq!(operation.id(), ack.op_id);
    let snapshot = operation.action().fields().ok_or("update carries fields")?;
    assert_eq!(snapshot.title.as_str(), "Write");
    assert_eq!(snapshot.content.as_ref().map(TaskContent::as_str), Some("notes"));
    assert!(snapshot.done);

    assert!(!ctx.service.get(id.into()).await?.done());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn postgres_missing_target_is_not_found(
    context: Result<PostgresContext, BoxError>,
) -> Result<(), BoxError> {
    let ctx = context?;
    let err = ctx
        .service
        .update(UpdateTaskRequest::new(999.into(), "2025-09-25T21:00:00Z").with_done(true))
        .await
        .err()
        .ok_or("missing task should fail")?;
    assert_eq!(err.kind(), TaskErrorKind::NotFound);
    assert!(ctx.repository.pending_operations().await?.is_empty());
    Ok(())
}
