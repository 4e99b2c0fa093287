//! Error types for feedpulse-core

use thiserror::Error;
use uuid::Uuid;

/// Main error type for the feedpulse-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Organization unknown to the organization provider
    #[error("organization not found: {0}")]
    OrganizationNotFound(Uuid),

    /// Question unknown to the question provider
    #[error("question not found: {0}")]
    QuestionNotFound(Uuid),

    /// Malformed request (date range, granularity, metric list)
    #[error("validation error: {0}")]
    Validation(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A batch insert failed while replacing an organization's metrics.
    ///
    /// Batches before `batch_start` were written but never activated.
    #[error("batch write aborted at rows {batch_start}..{batch_end} of {total}: {source}")]
    BatchWrite {
        batch_start: usize,
        batch_end: usize,
        total: usize,
        #[source]
        source: rusqlite::Error,
    },

    /// A collaborator (feedback, organization or question provider) failed
    #[error("provider error: {0}")]
    Provider(String),

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    DependencyFailure,
    Cancelled,
    Internal,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OrganizationNotFound(_) | Error::QuestionNotFound(_) => ErrorKind::NotFound,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Database(_) | Error::BatchWrite { .. } | Error::Provider(_) | Error::Io(_) => {
                ErrorKind::DependencyFailure
            }
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Json(_) | Error::Config(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

/// Result type alias for feedpulse-core
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::OrganizationNotFound(Uuid::nil()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(Error::validation("bad").kind(), ErrorKind::Validation);
        assert_eq!(
            Error::Provider("down".to_string()).kind(),
            ErrorKind::DependencyFailure
        );
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
    }
}
