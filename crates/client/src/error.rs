//! Client error types.

use thiserror::Error;
use todosync_core::cache::CacheError;
use todosync_core::envelope::{EnvelopeError, NETWORK_ERROR_MESSAGE};
use uuid::Uuid;

/// Result type alias for client module.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("{0}")]
    Domain(#[from] EnvelopeError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Task {task_id} is not cached; list the todolist's tasks first")]
    TaskNotCached { task_id: Uuid },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns true for failures below the domain layer: no envelope was read.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Request(_)
                | ClientError::ServerError { .. }
                | ClientError::NotFound { .. }
                | ClientError::Cache(CacheError::FetchFailed(_))
        )
    }

    /// The message surfaced to the user for this error.
    ///
    /// Transport failures collapse into one generic message; domain errors
    /// keep the backend's wording.
    pub fn user_message(&self) -> String {
        match self {
            e if e.is_transport() => NETWORK_ERROR_MESSAGE.to_string(),
            ClientError::Domain(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}
