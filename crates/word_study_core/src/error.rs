//! crates/word_study_core/src/error.rs
//!
//! The error type returned by every word-study use case.

use crate::ports::PortError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum WordStudyError {
    /// Rejected before any I/O happened.
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller tried to act on a session or insight it does not own.
    #[error("User {user_id} does not own {resource}")]
    NotOwner { resource: String, user_id: String },

    /// The generation gateway (or quiz service) failed. `context` names the
    /// word, passage or reference the request was about.
    #[error("Failed to {context}: {source}")]
    Generation {
        context: String,
        #[source]
        source: PortError,
    },

    #[error("Storage error: {0}")]
    Store(PortError),
}

impl WordStudyError {
    pub fn validation(message: impl Into<String>) -> Self {
        WordStudyError::Validation(message.into())
    }

    pub fn session_not_owned(session_id: Uuid, user_id: &str) -> Self {
        WordStudyError::NotOwner {
            resource: format!("session {}", session_id),
            user_id: user_id.to_string(),
        }
    }

    pub fn insight_not_owned(insight_id: Uuid, user_id: &str) -> Self {
        WordStudyError::NotOwner {
            resource: format!("insight {}", insight_id),
            user_id: user_id.to_string(),
        }
    }

    pub fn generation(context: impl Into<String>, source: PortError) -> Self {
        WordStudyError::Generation {
            context: context.into(),
            source,
        }
    }
}

impl From<PortError> for WordStudyError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => WordStudyError::NotFound(what),
            other => WordStudyError::Store(other),
        }
    }
}

/// A convenience type alias for use-case results.
pub type WordStudyResult<T> = Result<T, WordStudyError>;
