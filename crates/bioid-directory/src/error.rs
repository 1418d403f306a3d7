//! Directory error types.

use thiserror::Error;

/// Errors that can occur during directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Entity not found.
    #[error("{entity_kind} not found: {id}")]
    NotFound {
        /// Kind of entity (e.g., "Credential", "Template").
        entity_kind: &'static str,
        /// Entity identifier.
        id: String,
    },

    /// The backing service could not be reached or refused the call.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The stored data could not be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Internal directory error.
    #[error("internal directory error: {0}")]
    Internal(String),
}

impl DirectoryError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(entity_kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_kind,
            id: id.into(),
        }
    }

    /// Checks if this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether retrying the failed operation could succeed.
    ///
    /// Only transient availability failures are retryable; a missing entity
    /// or unreadable payload will not improve on retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_error() {
        let err = DirectoryError::not_found("Template", "42");

        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("Template"));
    }

    #[test]
    fn only_unavailability_is_retryable() {
        assert!(DirectoryError::ServiceUnavailable("timeout".into()).is_retryable());
        assert!(!DirectoryError::InvalidData("bad payload".into()).is_retryable());
        assert!(!DirectoryError::Internal("bug".into()).is_retryable());
    }
}
