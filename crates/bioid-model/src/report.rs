//! Consistency check report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::issue::{ConsistencyIssue, ConsistencyIssueKind, IssueSeverity};

/// Status of a consistency check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyCheckStatus {
    /// Created but not started.
    Pending,
    /// Snapshot gathering or analysis in progress.
    Running,
    /// Analysis finished; the issue list is trustworthy.
    Completed,
    /// Analysis could not complete; the issue list must not be trusted.
    Failed,
}

/// Aggregated counts derived from a report's issue list.
///
/// Always recomputed from the current issues - never updated incrementally,
/// so it cannot go stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyStatistics {
    /// Total number of issues.
    pub total_issues: usize,
    /// Count of orphaned credentials.
    pub orphaned_credentials: usize,
    /// Count of orphaned templates.
    pub orphaned_templates: usize,
    /// Count of metadata mismatches.
    pub metadata_mismatches: usize,
    /// Count of sync conflicts.
    pub sync_conflicts: usize,
    /// Count of corrupted-data issues.
    pub corrupted_data: usize,
    /// Count of invalid-reference issues.
    pub invalid_references: usize,
    /// Count of critical-severity issues.
    pub critical_issues: usize,
    /// Count of high-severity issues.
    pub high_severity_issues: usize,
    /// Count of medium-severity issues.
    pub medium_severity_issues: usize,
    /// Count of low-severity issues.
    pub low_severity_issues: usize,
}

impl ConsistencyStatistics {
    fn compute(issues: &[ConsistencyIssue]) -> Self {
        let mut stats = Self {
            total_issues: issues.len(),
            ..Self::default()
        };
        for issue in issues {
            match issue.kind {
                ConsistencyIssueKind::OrphanedCredential => stats.orphaned_credentials += 1,
                ConsistencyIssueKind::OrphanedTemplate => stats.orphaned_templates += 1,
                ConsistencyIssueKind::MetadataMismatch => stats.metadata_mismatches += 1,
                ConsistencyIssueKind::SyncConflict => stats.sync_conflicts += 1,
                ConsistencyIssueKind::CorruptedData => stats.corrupted_data += 1,
                ConsistencyIssueKind::InvalidReference => stats.invalid_references += 1,
            }
            match issue.severity {
                IssueSeverity::Critical => stats.critical_issues += 1,
                IssueSeverity::High => stats.high_severity_issues += 1,
                IssueSeverity::Medium => stats.medium_severity_issues += 1,
                IssueSeverity::Low => stats.low_severity_issues += 1,
            }
        }
        stats
    }
}

/// Result of one consistency check run, scoped to a single realm.
///
/// Owned by the run that created it; accessors hand out copies so completed
/// reports cannot be mutated by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConsistencyReport {
    realm_id: String,
    realm_name: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    status: ConsistencyCheckStatus,
    error_message: Option<String>,
    issues: Vec<ConsistencyIssue>,
    statistics: ConsistencyStatistics,
}

impl DataConsistencyReport {
    /// Creates a running report for the given realm.
    #[must_use]
    pub fn new(realm_id: impl Into<String>, realm_name: impl Into<String>) -> Self {
        Self {
            realm_id: realm_id.into(),
            realm_name: realm_name.into(),
            started_at: Utc::now(),
            completed_at: None,
            status: ConsistencyCheckStatus::Running,
            error_message: None,
            issues: Vec::new(),
            statistics: ConsistencyStatistics::default(),
        }
    }

    /// Realm identifier this report covers.
    #[must_use]
    pub fn realm_id(&self) -> &str {
        &self.realm_id
    }

    /// Realm name this report covers.
    #[must_use]
    pub fn realm_name(&self) -> &str {
        &self.realm_name
    }

    /// When the run started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the run completed, if it has.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Current run status.
    #[must_use]
    pub const fn status(&self) -> ConsistencyCheckStatus {
        self.status
    }

    /// Failure message, when the run failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Copy of the issue list, in detection order.
    #[must_use]
    pub fn issues(&self) -> Vec<ConsistencyIssue> {
        self.issues.clone()
    }

    /// Current statistics; always consistent with the issue list.
    #[must_use]
    pub const fn statistics(&self) -> ConsistencyStatistics {
        self.statistics
    }

    /// Appends an issue and recomputes statistics.
    pub fn add_issue(&mut self, issue: ConsistencyIssue) {
        self.issues.push(issue);
        self.statistics = ConsistencyStatistics::compute(&self.issues);
    }

    /// Replaces the issue list and recomputes statistics.
    pub fn set_issues(&mut self, issues: Vec<ConsistencyIssue>) {
        self.issues = issues;
        self.statistics = ConsistencyStatistics::compute(&self.issues);
    }

    /// Marks the run completed.
    pub fn complete(&mut self) {
        self.status = ConsistencyCheckStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Marks the run failed with the causing message.
    ///
    /// A failed report's issue list must not be trusted by callers.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ConsistencyCheckStatus::Failed;
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
    }

    /// Total number of issues.
    #[must_use]
    pub const fn total_issues(&self) -> usize {
        self.statistics.total_issues
    }

    /// Run duration in milliseconds; uses now for a still-running report.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }

    /// Issues of the given kind, in detection order.
    #[must_use]
    pub fn issues_of_kind(&self, kind: ConsistencyIssueKind) -> Vec<ConsistencyIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.kind == kind)
            .cloned()
            .collect()
    }

    /// Issues of the given severity, in detection order.
    #[must_use]
    pub fn issues_of_severity(&self, severity: IssueSeverity) -> Vec<ConsistencyIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .cloned()
            .collect()
    }

    /// Whether any issue is high severity.
    #[must_use]
    pub fn has_high_severity_issues(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == IssueSeverity::High)
    }

    /// Whether any issue is critical severity.
    #[must_use]
    pub fn has_critical_issues(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == IssueSeverity::Critical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(kind: ConsistencyIssueKind) -> ConsistencyIssue {
        ConsistencyIssue::new(kind, "test issue")
    }

    #[test]
    fn empty_report_has_zero_issues() {
        let mut report = DataConsistencyReport::new("realm-1", "master");
        report.complete();

        assert_eq!(report.total_issues(), 0);
        assert_eq!(report.status(), ConsistencyCheckStatus::Completed);
        assert!(report.completed_at().is_some());
    }

    #[test]
    fn statistics_track_issue_list() {
        let mut report = DataConsistencyReport::new("realm-1", "master");
        report.add_issue(issue(ConsistencyIssueKind::OrphanedCredential));
        report.add_issue(issue(ConsistencyIssueKind::OrphanedCredential));
        report.add_issue(issue(ConsistencyIssueKind::OrphanedTemplate));

        let stats = report.statistics();
        assert_eq!(stats.total_issues, 3);
        assert_eq!(stats.orphaned_credentials, 2);
        assert_eq!(stats.orphaned_templates, 1);
        assert_eq!(stats.high_severity_issues, 2);
        assert_eq!(stats.medium_severity_issues, 1);
    }

    #[test]
    fn statistics_recomputed_on_set_issues() {
        let mut report = DataConsistencyReport::new("realm-1", "master");
        report.add_issue(issue(ConsistencyIssueKind::MetadataMismatch));

        report.set_issues(vec![issue(ConsistencyIssueKind::CorruptedData)]);

        let stats = report.statistics();
        assert_eq!(stats.total_issues, 1);
        assert_eq!(stats.metadata_mismatches, 0);
        assert_eq!(stats.corrupted_data, 1);
        assert_eq!(stats.critical_issues, 1);
    }

    #[test]
    fn issues_getter_returns_copy() {
        let mut report = DataConsistencyReport::new("realm-1", "master");
        report.add_issue(issue(ConsistencyIssueKind::OrphanedTemplate));

        let mut copy = report.issues();
        copy.clear();

        assert_eq!(report.total_issues(), 1);
    }

    #[test]
    fn failed_report_records_message() {
        let mut report = DataConsistencyReport::new("realm-1", "master");
        report.fail("biometric service unreachable");

        assert_eq!(report.status(), ConsistencyCheckStatus::Failed);
        assert_eq!(
            report.error_message(),
            Some("biometric service unreachable")
        );
    }

    #[test]
    fn severity_queries() {
        let mut report = DataConsistencyReport::new("realm-1", "master");
        report.add_issue(issue(ConsistencyIssueKind::OrphanedCredential));

        assert!(report.has_high_severity_issues());
        assert!(!report.has_critical_issues());
        assert_eq!(report.issues_of_severity(IssueSeverity::High).len(), 1);
        assert_eq!(
            report
                .issues_of_kind(ConsistencyIssueKind::OrphanedCredential)
                .len(),
            1
        );
    }
}
