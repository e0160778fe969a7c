//! Error types for task domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing domain task values from untrusted input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task title is empty.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// The task title exceeds the character limit.
    #[error("task title is {length} characters long, the limit is {limit}")]
    TitleTooLong {
        /// Character count of the rejected title.
        length: usize,
        /// Maximum permitted character count.
        limit: usize,
    },

    /// The task content exceeds the character limit.
    #[error("task content is {length} characters long, the limit is {limit}")]
    ContentTooLong {
        /// Character count of the rejected content.
        length: usize,
        /// Maximum permitted character count.
        limit: usize,
    },

    /// A timestamp could not be parsed as RFC3339 or as a naive UTC value.
    #[error("invalid timestamp '{0}', expected RFC3339 such as 2025-09-25T20:00:00Z")]
    InvalidTimestamp(String),
}

/// Error returned while parsing deferred operation types from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown deferred operation type: {0}")]
pub struct ParseOperationTypeError(pub String);
