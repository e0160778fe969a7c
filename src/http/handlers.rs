//! Axum handlers for the task endpoints.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mockable::Clock;

use super::dto::{
    CreateTaskBody, DeleteTaskBody, DeletedResponse, ScheduledResponse, TaskResponse,
    UpdateTaskBody,
};
use super::error::ApiErrorResponse;
use crate::task::{
    domain::TaskId,
    ports::{TaskRepository, WriteOutcome},
    services::TaskService,
};

type HandlerResult = Result<Response, ApiErrorResponse>;

/// `POST /tasks`
///
/// # Errors
///
/// Returns [`ApiErrorResponse`] for malformed bodies, validation failures,
/// duplicate `(title, due_date)` pairs, and internal errors.
pub async fn create_task<R, C>(
    State(service): State<TaskService<R, C>>,
    body: Result<Json<CreateTaskBody>, JsonRejection>,
) -> HandlerResult
where
    R: TaskRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    let Json(body) = body?;
    let outcome = service.create(body.into()).await?;
    Ok(write_response(StatusCode::CREATED, outcome))
}

/// `GET /tasks`
///
/// # Errors
///
/// Returns [`ApiErrorResponse`] when the repository fails.
pub async fn list_tasks<R, C>(State(service): State<TaskService<R, C>>) -> HandlerResult
where
    R: TaskRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    let tasks = service.list().await?;
    let body: Vec<TaskResponse> = tasks.iter().map(TaskResponse::from).collect();
    Ok(Json(body).into_response())
}

/// `GET /tasks/{id}`
///
/// # Errors
///
/// Returns [`ApiErrorResponse`] for an invalid or unknown identifier.
pub async fn get_task<R, C>(
    State(service): State<TaskService<R, C>>,
    id: Result<Path<i64>, PathRejection>,
) -> HandlerResult
where
    R: TaskRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    let Path(id) = id?;
    let task = service.get(TaskId::new(id)).await?;
    Ok(Json(TaskResponse::from(&task)).into_response())
}

/// `PUT /tasks/{id}`
///
/// # Errors
///
/// Returns [`ApiErrorResponse`] for malformed input, unknown tasks, stale
/// timestamps, and uniqueness violations.
pub async fn update_task<R, C>(
    State(service): State<TaskService<R, C>>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateTaskBody>, JsonRejection>,
) -> HandlerResult
where
    R: TaskRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    let Path(id) = id?;
    let Json(body) = body?;
    let outcome = service.update(body.into_request(TaskId::new(id))).await?;
    Ok(write_response(StatusCode::OK, outcome))
}

/// `DELETE /tasks/{id}`
///
/// # Errors
///
/// Returns [`ApiErrorResponse`] for malformed input, unknown tasks, and stale
/// timestamps.
pub async fn delete_task<R, C>(
    State(service): State<TaskService<R, C>>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<DeleteTaskBody>, JsonRejection>,
) -> HandlerResult
where
    R: TaskRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    let Path(id) = id?;
    let Json(body) = body?;
    let outcome = service.delete(body.into_request(TaskId::new(id))).await?;
    Ok(write_response(StatusCode::OK, outcome))
}

/// Fallback for unknown routes.
#[expect(clippy::unused_async, reason = "axum fallbacks are async handlers")]
pub async fn not_found() -> ApiErrorResponse {
    ApiErrorResponse::not_found("resource not found")
}

fn write_response(status: StatusCode, outcome: WriteOutcome) -> Response {
    match outcome {
        WriteOutcome::Created(task) | WriteOutcome::Updated(task) => {
            (status, Json(TaskResponse::from(&task))).into_response()
        }
        WriteOutcome::Deleted(task_id) => (
            status,
            Json(DeletedResponse {
                id: task_id.value(),
                deleted: true,
            }),
        )
            .into_response(),
        WriteOutcome::Scheduled(ack) => {
            (status, Json(ScheduledResponse::from(ack))).into_response()
        }
    }
}
