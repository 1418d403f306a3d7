//! Orphaned-data cleanup result models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a cleanup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CleanupStatus {
    /// Created but not started.
    Pending,
    /// Run in progress.
    Running,
    /// Run finished with no per-item errors.
    Completed,
    /// The run itself could not proceed.
    Failed,
    /// The run finished but some items failed.
    PartiallyCompleted,
}

/// Error captured for one item during cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupError {
    /// Identifier of the failed item (user id or class id).
    pub item_id: String,
    /// What kind of item failed ("credential" or "template").
    pub item_kind: String,
    /// What went wrong.
    pub message: String,
    /// Whether retrying later could succeed.
    pub retryable: bool,
    /// When the failure happened.
    pub occurred_at: DateTime<Utc>,
}

impl CleanupError {
    /// Creates an error record.
    #[must_use]
    pub fn new(
        item_id: impl Into<String>,
        item_kind: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            item_kind: item_kind.into(),
            message: message.into(),
            retryable,
            occurred_at: Utc::now(),
        }
    }
}

/// Outcome of one orphaned-data cleanup run.
///
/// A dry run populates the `*_to_clean` collections and leaves the cleaned
/// collections empty; a live run does the reverse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResult {
    /// Realm the run covered.
    pub realm_id: String,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Run status.
    pub status: CleanupStatus,
    /// Failure message when the run could not proceed.
    pub error_message: Option<String>,
    /// Users whose orphaned credentials were deleted (live runs).
    pub cleaned_credentials: Vec<Uuid>,
    /// Class ids of templates deleted (live runs).
    pub cleaned_templates: Vec<i64>,
    /// Users whose orphaned credentials would be deleted (dry runs).
    pub credentials_to_clean: Vec<Uuid>,
    /// Class ids of templates that would be deleted (dry runs).
    pub templates_to_clean: Vec<i64>,
    /// Per-item failures.
    pub errors: Vec<CleanupError>,
}

impl CleanupResult {
    /// Creates a running result.
    #[must_use]
    pub fn new(realm_id: impl Into<String>, dry_run: bool) -> Self {
        Self {
            realm_id: realm_id.into(),
            dry_run,
            started_at: Utc::now(),
            completed_at: None,
            status: CleanupStatus::Running,
            error_message: None,
            cleaned_credentials: Vec::new(),
            cleaned_templates: Vec::new(),
            credentials_to_clean: Vec::new(),
            templates_to_clean: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Records a deleted credential (live run).
    pub fn add_cleaned_credential(&mut self, user_id: Uuid) {
        self.cleaned_credentials.push(user_id);
    }

    /// Records a deleted template (live run).
    pub fn add_cleaned_template(&mut self, class_id: i64) {
        self.cleaned_templates.push(class_id);
    }

    /// Records a credential that would be deleted (dry run).
    pub fn add_credential_to_clean(&mut self, user_id: Uuid) {
        self.credentials_to_clean.push(user_id);
    }

    /// Records a template that would be deleted (dry run).
    pub fn add_template_to_clean(&mut self, class_id: i64) {
        self.templates_to_clean.push(class_id);
    }

    /// Records a per-item failure.
    pub fn add_error(&mut self, error: CleanupError) {
        self.errors.push(error);
    }

    /// Finishes the run: Completed with no errors, else PartiallyCompleted.
    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
        self.status = if self.errors.is_empty() {
            CleanupStatus::Completed
        } else {
            CleanupStatus::PartiallyCompleted
        };
    }

    /// Marks the run failed (could not proceed at all).
    pub fn fail(&mut self, message: impl Into<String>) {
        self.completed_at = Some(Utc::now());
        self.status = CleanupStatus::Failed;
        self.error_message = Some(message.into());
    }

    /// Total items processed or identified, including failures.
    #[must_use]
    pub fn total_items_processed(&self) -> usize {
        self.cleaned_credentials.len()
            + self.cleaned_templates.len()
            + self.credentials_to_clean.len()
            + self.templates_to_clean.len()
            + self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_populates_to_clean_only() {
        let mut result = CleanupResult::new("realm-1", true);
        result.add_credential_to_clean(Uuid::now_v7());
        result.add_template_to_clean(99);
        result.finish();

        assert!(result.dry_run);
        assert_eq!(result.credentials_to_clean.len(), 1);
        assert_eq!(result.templates_to_clean.len(), 1);
        assert!(result.cleaned_credentials.is_empty());
        assert!(result.cleaned_templates.is_empty());
        assert_eq!(result.status, CleanupStatus::Completed);
        assert_eq!(result.total_items_processed(), 2);
    }

    #[test]
    fn item_errors_force_partial_completion() {
        let mut result = CleanupResult::new("realm-1", false);
        result.add_cleaned_template(7);
        result.add_error(CleanupError::new("42", "template", "unavailable", true));
        result.finish();

        assert_eq!(result.status, CleanupStatus::PartiallyCompleted);
        assert_eq!(result.total_items_processed(), 2);
    }

    #[test]
    fn failed_run_keeps_message() {
        let mut result = CleanupResult::new("realm-1", false);
        result.fail("credential listing unavailable");

        assert_eq!(result.status, CleanupStatus::Failed);
        assert_eq!(
            result.error_message.as_deref(),
            Some("credential listing unavailable")
        );
    }
}
