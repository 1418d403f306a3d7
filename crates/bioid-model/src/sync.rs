//! Template-status synchronization models.
//!
//! Synchronization is the non-destructive sibling of repair: it only rewrites
//! metadata so the identity store's view matches the biometric service's
//! authoritative template state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of synchronization action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SynchronizationActionKind {
    /// Rewrite the credential's recorded metadata from the template.
    UpdateMetadata,
    /// Nothing to synchronize for this issue.
    NoAction,
    /// Divergence needs an operator decision.
    ManualReview,
}

/// One synchronization step for one issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynchronizationAction {
    /// Issue this action addresses.
    pub issue_id: Uuid,
    /// What the action does.
    pub kind: SynchronizationActionKind,
    /// Human-readable description.
    pub description: String,
    /// When the action was created or executed.
    pub executed_at: DateTime<Utc>,
}

impl SynchronizationAction {
    /// Creates an action.
    #[must_use]
    pub fn new(
        issue_id: Uuid,
        kind: SynchronizationActionKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            issue_id,
            kind,
            description: description.into(),
            executed_at: Utc::now(),
        }
    }
}

/// Error captured for one action during synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynchronizationError {
    /// Issue whose synchronization failed.
    pub issue_id: Uuid,
    /// What went wrong.
    pub message: String,
    /// When the failure happened.
    pub occurred_at: DateTime<Utc>,
}

impl SynchronizationError {
    /// Creates an error record.
    #[must_use]
    pub fn new(issue_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            issue_id,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Status of a synchronization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SynchronizationStatus {
    /// Created but not started.
    Pending,
    /// Run in progress.
    Running,
    /// Run finished.
    Completed,
    /// The run itself could not proceed.
    Failed,
}

/// Outcome of one synchronization run.
///
/// A dry run populates `planned_actions` and leaves `executed_actions`
/// empty; a live run does the reverse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynchronizationResult {
    /// Realm the run covered.
    pub realm_id: String,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Run status.
    pub status: SynchronizationStatus,
    /// Failure message when the run could not proceed.
    pub error_message: Option<String>,
    /// Actions applied (live runs only).
    pub executed_actions: Vec<SynchronizationAction>,
    /// Actions that would be applied (dry runs only).
    pub planned_actions: Vec<SynchronizationAction>,
    /// Per-action failures.
    pub errors: Vec<SynchronizationError>,
}

impl SynchronizationResult {
    /// Creates a running result.
    #[must_use]
    pub fn new(realm_id: impl Into<String>, dry_run: bool) -> Self {
        Self {
            realm_id: realm_id.into(),
            dry_run,
            started_at: Utc::now(),
            completed_at: None,
            status: SynchronizationStatus::Running,
            error_message: None,
            executed_actions: Vec::new(),
            planned_actions: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Records an applied action.
    pub fn add_executed_action(&mut self, action: SynchronizationAction) {
        self.executed_actions.push(action);
    }

    /// Records a planned action (dry run).
    pub fn add_planned_action(&mut self, action: SynchronizationAction) {
        self.planned_actions.push(action);
    }

    /// Records a per-action failure.
    pub fn add_error(&mut self, error: SynchronizationError) {
        self.errors.push(error);
    }

    /// Marks the run completed.
    pub fn complete(&mut self) {
        self.status = SynchronizationStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Marks the run failed.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = SynchronizationStatus::Failed;
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
    }

    /// Total number of actions, planned or executed.
    #[must_use]
    pub fn total_actions(&self) -> usize {
        self.executed_actions.len() + self.planned_actions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_populates_planned_only() {
        let mut result = SynchronizationResult::new("realm-1", true);
        result.add_planned_action(SynchronizationAction::new(
            Uuid::now_v7(),
            SynchronizationActionKind::UpdateMetadata,
            "sync encoder version",
        ));
        result.complete();

        assert!(result.dry_run);
        assert_eq!(result.planned_actions.len(), 1);
        assert!(result.executed_actions.is_empty());
        assert_eq!(result.total_actions(), 1);
    }

    #[test]
    fn failed_run_keeps_message() {
        let mut result = SynchronizationResult::new("realm-1", false);
        result.fail("snapshot unavailable");

        assert_eq!(result.status, SynchronizationStatus::Failed);
        assert_eq!(result.error_message.as_deref(), Some("snapshot unavailable"));
    }
}
