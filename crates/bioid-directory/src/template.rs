//! Template directory trait.

use async_trait::async_trait;
use bioid_model::TemplateStatus;

use crate::error::DirectoryResult;

/// Provider for the external biometric service's template records.
///
/// All calls cross a network boundary and may fail transiently; callers are
/// expected to wrap them in the retry policy.
#[async_trait]
pub trait TemplateDirectory: Send + Sync {
    /// Gets the status of one template.
    ///
    /// ## Errors
    ///
    /// Returns `DirectoryError::NotFound` if no template exists for the
    /// class id, or `DirectoryError::ServiceUnavailable` on transient
    /// failure.
    async fn get_status(&self, class_id: i64) -> DirectoryResult<TemplateStatus>;

    /// Lists all enrolled templates.
    ///
    /// ## Errors
    ///
    /// Returns `DirectoryError::ServiceUnavailable` on transient failure.
    async fn list_templates(&self) -> DirectoryResult<Vec<TemplateStatus>>;

    /// Deletes a template.
    ///
    /// ## Errors
    ///
    /// Returns `DirectoryError::NotFound` if no template exists for the
    /// class id, or `DirectoryError::ServiceUnavailable` on transient
    /// failure.
    async fn delete_template(&self, class_id: i64) -> DirectoryResult<()>;

    /// Replaces a template's tags.
    ///
    /// ## Errors
    ///
    /// Returns `DirectoryError::NotFound` if no template exists for the
    /// class id, or `DirectoryError::ServiceUnavailable` on transient
    /// failure.
    async fn set_template_tags(&self, class_id: i64, tags: &[String]) -> DirectoryResult<()>;
}
