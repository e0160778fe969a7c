//! Task API router setup.

use axum::Router;
use axum::middleware;
use axum::routing::get;
use mockable::Clock;
use tower_http::trace::TraceLayer;

use super::correlation::correlation_middleware;
use super::handlers::{create_task, delete_task, get_task, list_tasks, not_found, update_task};
use crate::task::{ports::TaskRepository, services::TaskService};

/// Creates the task API router.
pub fn task_router<R, C>(service: TaskService<R, C>) -> Router
where
    R: TaskRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    Router::new()
        .route("/tasks", get(list_tasks::<R, C>).post(create_task::<R, C>))
        .route(
            "/tasks/{id}",
            get(get_task::<R, C>)
                .put(update_task::<R, C>)
                .delete(delete_task::<R, C>),
        )
        .fallback(not_found)
        .layer(middleware::from_fn(correlation_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
