//! Reconciliation error types.

use bioid_directory::DirectoryError;
use thiserror::Error;

/// Errors that can occur during reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A realm or schedule configuration vanished between scheduling and
    /// execution. Self-healing: the schedule cancels itself.
    #[error("configuration not found: {0}")]
    ConfigurationNotFound(String),

    /// The external service could not be reached; retryable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A terminal data error (e.g. template not found); not retried.
    #[error("data error: {0}")]
    DataError(String),

    /// The analysis pass could not obtain a consistent snapshot.
    #[error("consistency analysis failed: {0}")]
    AnalysisFailed(String),

    /// Internal error.
    #[error("internal reconciliation error: {0}")]
    Internal(String),
}

impl ReconcileError {
    /// Whether retrying the failed operation could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }
}

impl From<DirectoryError> for ReconcileError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::ServiceUnavailable(msg) => Self::ServiceUnavailable(msg),
            DirectoryError::NotFound { .. } => Self::DataError(err.to_string()),
            DirectoryError::InvalidData(msg) => Self::DataError(msg),
            DirectoryError::Internal(msg) => Self::Internal(msg),
        }
    }
}

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;
