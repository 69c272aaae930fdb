//! Error types for the task store.
//!
//! [`StoreError`] is what a backend reports. [`TaskError`] is what callers of
//! the service see; storage details never leak past it.

use lambda_http::http::StatusCode;
use thiserror::Error;

/// Failures raised by a [`TaskRepository`](super::repository::TaskRepository).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A task with this id already exists.
    #[error("task already exists: {0}")]
    Conflict(String),

    /// Poisoned lock, unreadable row and similar.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by [`TaskService`](super::service::TaskService).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Backend failure. The message is always generic.
    #[error("{0}")]
    Internal(String),
}

impl TaskError {
    pub fn validation(message: impl Into<String>) -> Self {
        TaskError::Validation(message.into())
    }

    pub fn not_found() -> Self {
        TaskError::NotFound("not found".to_string())
    }

    pub fn internal() -> Self {
        TaskError::Internal("internal error".to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            TaskError::Validation(_) => StatusCode::BAD_REQUEST,
            TaskError::NotFound(_) => StatusCode::NOT_FOUND,
            TaskError::Conflict(_) => StatusCode::CONFLICT,
            TaskError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Translate a storage failure at the service boundary. Everything except a
    /// duplicate id is logged in full and reported as a bare internal error.
    pub fn from_store(operation: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::Conflict(id) => {
                TaskError::Conflict(format!("task with id '{id}' already exists"))
            }
            other => {
                tracing::error!(operation, error = %other, "task store failure");
                TaskError::internal()
            }
        }
    }
}
