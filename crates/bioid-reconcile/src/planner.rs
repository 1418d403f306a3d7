//! Repair planning.
//!
//! Maps each detected issue to a proposed repair action and decides whether
//! the action may run without human sign-off. The kind-to-action mapping
//! lives in one place so adding an issue kind is a one-match change.

use bioid_model::{ConsistencyIssue, ConsistencyIssueKind, RepairAction, RepairActionKind};

/// Plans repair actions for consistency issues.
///
/// Deletions are irreversible and affect end-user authentication, so the
/// defaults are conservative: only metadata updates are low risk, and
/// template deletion is auto-approvable only when explicitly configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairPlanner {
    auto_approve_template_deletion: bool,
}

impl RepairPlanner {
    /// Creates a planner.
    #[must_use]
    pub const fn new(auto_approve_template_deletion: bool) -> Self {
        Self {
            auto_approve_template_deletion,
        }
    }

    /// Proposes a repair action for an issue.
    #[must_use]
    pub fn plan(&self, issue: &ConsistencyIssue) -> RepairAction {
        let (kind, requires_approval) = match issue.kind {
            ConsistencyIssueKind::OrphanedCredential => {
                (RepairActionKind::DeleteOrphanedCredential, true)
            }
            ConsistencyIssueKind::OrphanedTemplate => (
                RepairActionKind::DeleteOrphanedTemplate,
                !self.auto_approve_template_deletion,
            ),
            ConsistencyIssueKind::MetadataMismatch => (RepairActionKind::UpdateMetadata, false),
            ConsistencyIssueKind::SyncConflict => (RepairActionKind::ResolveConflict, true),
            ConsistencyIssueKind::CorruptedData | ConsistencyIssueKind::InvalidReference => {
                (RepairActionKind::ManualInterventionRequired, true)
            }
        };

        let action = RepairAction::new(issue.issue_id, kind, issue.description.clone());
        if requires_approval {
            action.requiring_approval()
        } else {
            action
        }
    }

    /// Whether an action is low risk and may run without sign-off.
    #[must_use]
    pub const fn is_low_risk(action: &RepairAction) -> bool {
        matches!(action.kind, RepairActionKind::UpdateMetadata)
    }

    /// Whether the executor can carry an action out automatically at all.
    ///
    /// Conflict resolution and manual-intervention actions always need an
    /// operator decision, even under a global auto-approve flag.
    #[must_use]
    pub const fn is_auto_executable(kind: RepairActionKind) -> bool {
        matches!(
            kind,
            RepairActionKind::DeleteOrphanedCredential
                | RepairActionKind::DeleteOrphanedTemplate
                | RepairActionKind::UpdateMetadata
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(kind: ConsistencyIssueKind) -> ConsistencyIssue {
        ConsistencyIssue::new(kind, "test issue")
    }

    #[test]
    fn orphaned_credential_maps_to_guarded_deletion() {
        let planner = RepairPlanner::default();
        let action = planner.plan(&issue(ConsistencyIssueKind::OrphanedCredential));

        assert_eq!(action.kind, RepairActionKind::DeleteOrphanedCredential);
        assert!(action.requires_approval);
        assert!(!RepairPlanner::is_low_risk(&action));
    }

    #[test]
    fn metadata_mismatch_is_low_risk() {
        let planner = RepairPlanner::default();
        let action = planner.plan(&issue(ConsistencyIssueKind::MetadataMismatch));

        assert_eq!(action.kind, RepairActionKind::UpdateMetadata);
        assert!(!action.requires_approval);
        assert!(RepairPlanner::is_low_risk(&action));
    }

    #[test]
    fn template_deletion_approval_is_configurable() {
        let strict = RepairPlanner::new(false);
        assert!(
            strict
                .plan(&issue(ConsistencyIssueKind::OrphanedTemplate))
                .requires_approval
        );

        let relaxed = RepairPlanner::new(true);
        assert!(
            !relaxed
                .plan(&issue(ConsistencyIssueKind::OrphanedTemplate))
                .requires_approval
        );
    }

    #[test]
    fn conflicts_and_corruption_stay_manual() {
        let planner = RepairPlanner::default();

        let conflict = planner.plan(&issue(ConsistencyIssueKind::SyncConflict));
        assert_eq!(conflict.kind, RepairActionKind::ResolveConflict);
        assert!(!RepairPlanner::is_auto_executable(conflict.kind));

        let corrupted = planner.plan(&issue(ConsistencyIssueKind::CorruptedData));
        assert_eq!(
            corrupted.kind,
            RepairActionKind::ManualInterventionRequired
        );
        assert!(!RepairPlanner::is_auto_executable(corrupted.kind));
    }
}
