//! Repair action and result models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of repair the planner can propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairActionKind {
    /// Delete a credential whose template no longer exists.
    DeleteOrphanedCredential,
    /// Delete a template no credential references.
    DeleteOrphanedTemplate,
    /// Rewrite the credential's recorded metadata from the template.
    UpdateMetadata,
    /// Resolve conflicting state between the two stores.
    ResolveConflict,
    /// Recreate a missing credential from the template.
    RecreateCredential,
    /// Recreate a missing template from the credential.
    RecreateTemplate,
    /// No automatic action is safe; an operator must decide.
    ManualInterventionRequired,
}

impl RepairActionKind {
    /// String form used in results and audit events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeleteOrphanedCredential => "delete-orphaned-credential",
            Self::DeleteOrphanedTemplate => "delete-orphaned-template",
            Self::UpdateMetadata => "update-metadata",
            Self::ResolveConflict => "resolve-conflict",
            Self::RecreateCredential => "recreate-credential",
            Self::RecreateTemplate => "recreate-template",
            Self::ManualInterventionRequired => "manual-intervention-required",
        }
    }
}

/// A proposed or executed repair for one issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairAction {
    /// Issue this action addresses.
    pub issue_id: Uuid,
    /// What the action does.
    pub kind: RepairActionKind,
    /// Human-readable description, carried from the issue.
    pub description: String,
    /// When the action was created or executed.
    pub executed_at: DateTime<Utc>,
    /// Whether execution needs explicit sign-off.
    pub requires_approval: bool,
    /// Who approved the action.
    pub approved_by: Option<String>,
    /// When the action was approved.
    pub approved_at: Option<DateTime<Utc>>,
    /// Whether execution succeeded.
    pub successful: bool,
    /// Failure message, when execution failed.
    pub error_message: Option<String>,
}

impl RepairAction {
    /// Creates an unexecuted action.
    #[must_use]
    pub fn new(issue_id: Uuid, kind: RepairActionKind, description: impl Into<String>) -> Self {
        Self {
            issue_id,
            kind,
            description: description.into(),
            executed_at: Utc::now(),
            requires_approval: false,
            approved_by: None,
            approved_at: None,
            successful: true,
            error_message: None,
        }
    }

    /// Flags the action as requiring explicit approval.
    #[must_use]
    pub const fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    /// Records an approval.
    pub fn approve(&mut self, approved_by: impl Into<String>) {
        self.approved_by = Some(approved_by.into());
        self.approved_at = Some(Utc::now());
    }

    /// Records an execution failure.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.successful = false;
        self.error_message = Some(message.into());
    }
}

/// Error captured for one action in a repair batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairError {
    /// Issue whose repair failed.
    pub issue_id: Uuid,
    /// What went wrong.
    pub message: String,
    /// Whether retrying the action later could succeed.
    pub retryable: bool,
    /// When the failure happened.
    pub occurred_at: DateTime<Utc>,
}

impl RepairError {
    /// Creates an error record.
    #[must_use]
    pub fn new(issue_id: Uuid, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            issue_id,
            message: message.into(),
            retryable,
            occurred_at: Utc::now(),
        }
    }
}

/// Status of a repair batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairStatus {
    /// Created but not started.
    Pending,
    /// Batch in progress.
    Running,
    /// Every action executed successfully with nothing pending.
    Completed,
    /// The batch itself could not run.
    Failed,
    /// The batch finished but some actions failed or await approval.
    PartiallyCompleted,
}

/// Outcome of a repair batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairResult {
    /// Realm the batch ran against.
    pub realm_id: String,
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// When the batch finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Batch status.
    pub status: RepairStatus,
    /// Failure message when the batch itself could not run.
    pub error_message: Option<String>,
    /// Actions executed successfully.
    pub successful_repairs: Vec<RepairAction>,
    /// Actions awaiting explicit approval; not executed.
    pub pending_approvals: Vec<RepairAction>,
    /// Per-action failures.
    pub errors: Vec<RepairError>,
}

impl RepairResult {
    /// Creates a running result for the given realm.
    #[must_use]
    pub fn new(realm_id: impl Into<String>) -> Self {
        Self {
            realm_id: realm_id.into(),
            started_at: Utc::now(),
            completed_at: None,
            status: RepairStatus::Running,
            error_message: None,
            successful_repairs: Vec::new(),
            pending_approvals: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Records a successfully executed action.
    pub fn add_successful_repair(&mut self, action: RepairAction) {
        self.successful_repairs.push(action);
    }

    /// Records an action parked for approval.
    pub fn add_pending_approval(&mut self, action: RepairAction) {
        self.pending_approvals.push(action);
    }

    /// Records a per-action failure.
    pub fn add_error(&mut self, error: RepairError) {
        self.errors.push(error);
    }

    /// Finishes the batch: Completed only with zero errors and zero
    /// pending approvals, otherwise PartiallyCompleted.
    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
        self.status = if self.errors.is_empty() && self.pending_approvals.is_empty() {
            RepairStatus::Completed
        } else {
            RepairStatus::PartiallyCompleted
        };
    }

    /// Marks the whole batch failed (the run itself could not proceed).
    pub fn fail(&mut self, message: impl Into<String>) {
        self.completed_at = Some(Utc::now());
        self.status = RepairStatus::Failed;
        self.error_message = Some(message.into());
    }

    /// Total number of actions considered by the batch.
    #[must_use]
    pub fn total_actions(&self) -> usize {
        self.successful_repairs.len() + self.pending_approvals.len() + self.errors.len()
    }

    /// Whether any action failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether any action awaits approval.
    #[must_use]
    pub fn has_pending_approvals(&self) -> bool {
        !self.pending_approvals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(kind: RepairActionKind) -> RepairAction {
        RepairAction::new(Uuid::now_v7(), kind, "test action")
    }

    #[test]
    fn clean_batch_completes() {
        let mut result = RepairResult::new("realm-1");
        result.add_successful_repair(action(RepairActionKind::UpdateMetadata));
        result.finish();

        assert_eq!(result.status, RepairStatus::Completed);
        assert_eq!(result.total_actions(), 1);
    }

    #[test]
    fn errors_force_partial_completion() {
        let mut result = RepairResult::new("realm-1");
        result.add_successful_repair(action(RepairActionKind::UpdateMetadata));
        result.add_error(RepairError::new(Uuid::now_v7(), "service unavailable", true));
        result.finish();

        assert_eq!(result.status, RepairStatus::PartiallyCompleted);
        assert!(result.has_errors());
    }

    #[test]
    fn pending_approvals_force_partial_completion() {
        let mut result = RepairResult::new("realm-1");
        result.add_pending_approval(
            action(RepairActionKind::DeleteOrphanedCredential).requiring_approval(),
        );
        result.finish();

        assert_eq!(result.status, RepairStatus::PartiallyCompleted);
        assert!(result.has_pending_approvals());
        assert!(!result.has_errors());
    }

    #[test]
    fn failed_batch_keeps_message() {
        let mut result = RepairResult::new("realm-1");
        result.fail("snapshot unavailable");

        assert_eq!(result.status, RepairStatus::Failed);
        assert_eq!(result.error_message.as_deref(), Some("snapshot unavailable"));
    }

    #[test]
    fn approval_metadata_round_trip() {
        let mut action = action(RepairActionKind::DeleteOrphanedTemplate).requiring_approval();
        assert!(action.requires_approval);
        assert!(action.approved_by.is_none());

        action.approve("operator");
        assert_eq!(action.approved_by.as_deref(), Some("operator"));
        assert!(action.approved_at.is_some());
    }
}
