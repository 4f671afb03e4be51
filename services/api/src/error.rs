//! services/api/src/error.rs
//!
//! Defines the primary error type for the API service and the mapping from
//! use-case errors to HTTP responses.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};
use word_study_core::ports::PortError;
use word_study_core::WordStudyError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The HTTP status a use-case error is reported with.
pub fn status_for(err: &WordStudyError) -> StatusCode {
    match err {
        WordStudyError::Validation(_) => StatusCode::BAD_REQUEST,
        WordStudyError::NotFound(_) => StatusCode::NOT_FOUND,
        WordStudyError::NotOwner { .. } => StatusCode::FORBIDDEN,
        WordStudyError::Generation { .. } => StatusCode::BAD_GATEWAY,
        WordStudyError::Store(PortError::Conflict(_)) => StatusCode::CONFLICT,
        WordStudyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The error half of every handler result: a status and a plain-text body.
#[derive(Debug)]
pub struct Rejection {
    pub status: StatusCode,
    pub message: String,
}

impl Rejection {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

/// Lets handlers use `?` on use-case results. Storage details are not echoed.
impl From<WordStudyError> for Rejection {
    fn from(err: WordStudyError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            error!("Request failed: {}", err);
        } else {
            warn!("Request rejected: {}", err);
        }
        let message = match err {
            WordStudyError::Store(_) => "Storage is unavailable, please retry".to_string(),
            other => other.to_string(),
        };
        Self { status, message }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_case_errors_map_to_http_statuses() {
        let cases = [
            (WordStudyError::validation("bad"), StatusCode::BAD_REQUEST),
            (WordStudyError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                WordStudyError::session_not_owned(uuid::Uuid::new_v4(), "u"),
                StatusCode::FORBIDDEN,
            ),
            (
                WordStudyError::generation("fetch passage", PortError::Unexpected("t".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                WordStudyError::Store(PortError::Unexpected("db".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected, "{}", err);
        }
    }

    #[test]
    fn storage_errors_are_not_echoed() {
        let rejection: Rejection =
            WordStudyError::Store(PortError::Unexpected("password=hunter2".into())).into();
        assert_eq!(rejection.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!rejection.message.contains("hunter2"));
    }
}
