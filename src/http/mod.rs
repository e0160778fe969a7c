//! HTTP surface for the task API.

pub mod correlation;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;

pub use correlation::{CORRELATION_ID_ALT_HEADER, CORRELATION_ID_HEADER, CorrelationId};
pub use error::{ApiError, ApiErrorResponse, FieldError};
pub use router::task_router;
