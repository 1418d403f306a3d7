//! Consistency issue model.
//!
//! One issue per detected divergence between the identity store and the
//! biometric service. Issues are never deleted, only marked resolved, so a
//! report retains a full audit trail of what was found.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of divergence the analyzer can detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyIssueKind {
    /// Credential exists in the identity store but no template in the
    /// biometric service.
    OrphanedCredential,
    /// Template exists in the biometric service but no credential references
    /// it.
    OrphanedTemplate,
    /// Designated metadata fields differ between the two stores.
    MetadataMismatch,
    /// Conflicting state that cannot be resolved automatically.
    SyncConflict,
    /// Credential payload is unreadable.
    CorruptedData,
    /// Credential carries no usable template reference.
    InvalidReference,
}

impl ConsistencyIssueKind {
    /// Returns the severity this kind always carries.
    ///
    /// Kind and severity are set together at construction; the pairing is
    /// fixed so statistics and threshold gates stay comparable across runs.
    #[must_use]
    pub const fn severity(self) -> IssueSeverity {
        match self {
            Self::OrphanedCredential => IssueSeverity::High,
            Self::OrphanedTemplate => IssueSeverity::Medium,
            Self::MetadataMismatch => IssueSeverity::Low,
            Self::SyncConflict => IssueSeverity::High,
            Self::CorruptedData | Self::InvalidReference => IssueSeverity::Critical,
        }
    }

    /// Returns the string form used in reports and audit events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrphanedCredential => "orphaned-credential",
            Self::OrphanedTemplate => "orphaned-template",
            Self::MetadataMismatch => "metadata-mismatch",
            Self::SyncConflict => "sync-conflict",
            Self::CorruptedData => "corrupted-data",
            Self::InvalidReference => "invalid-reference",
        }
    }
}

/// Severity of a consistency issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueSeverity {
    /// Affects system functionality; immediate attention required.
    Critical,
    /// Affects end-user authentication.
    High,
    /// Should be addressed soon.
    Medium,
    /// Cosmetic or minor.
    Low,
}

impl IssueSeverity {
    /// Numeric rank for comparison; higher means more severe.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Critical => 4,
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }
}

/// A single detected divergence between the two stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    /// Generated unique identifier.
    pub issue_id: Uuid,
    /// What kind of divergence this is.
    pub kind: ConsistencyIssueKind,
    /// Severity, fixed by the kind at construction.
    pub severity: IssueSeverity,
    /// Affected user, when the issue is credential-side.
    pub user_id: Option<Uuid>,
    /// Username of the affected user.
    pub username: Option<String>,
    /// Affected template class id.
    pub class_id: Option<i64>,
    /// Affected credential id.
    pub credential_id: Option<Uuid>,
    /// Human-readable description.
    pub description: String,
    /// When the issue was detected.
    pub detected_at: DateTime<Utc>,
    /// Free-form context recorded by the analyzer.
    pub metadata: BTreeMap<String, String>,
    /// Whether the issue has been resolved.
    pub resolved: bool,
    /// When the issue was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Who resolved the issue.
    pub resolved_by: Option<String>,
    /// Notes recorded at resolution time.
    pub resolution_notes: Option<String>,
}

impl ConsistencyIssue {
    /// Creates an unresolved issue; severity is derived from the kind.
    #[must_use]
    pub fn new(kind: ConsistencyIssueKind, description: impl Into<String>) -> Self {
        Self {
            issue_id: Uuid::now_v7(),
            kind,
            severity: kind.severity(),
            user_id: None,
            username: None,
            class_id: None,
            credential_id: None,
            description: description.into(),
            detected_at: Utc::now(),
            metadata: BTreeMap::new(),
            resolved: false,
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
        }
    }

    /// Sets the affected user.
    #[must_use]
    pub fn with_user(mut self, user_id: Uuid, username: impl Into<String>) -> Self {
        self.user_id = Some(user_id);
        self.username = Some(username.into());
        self
    }

    /// Sets the affected class id.
    #[must_use]
    pub const fn with_class_id(mut self, class_id: i64) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Sets the affected credential id.
    #[must_use]
    pub const fn with_credential_id(mut self, credential_id: Uuid) -> Self {
        self.credential_id = Some(credential_id);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Marks the issue resolved, recording the resolver and optional notes.
    pub fn resolve(&mut self, resolved_by: impl Into<String>, notes: Option<String>) {
        self.resolved = true;
        if self.resolved_at.is_none() {
            self.resolved_at = Some(Utc::now());
        }
        self.resolved_by = Some(resolved_by.into());
        self.resolution_notes = notes;
    }

    /// Whether this issue needs immediate attention.
    #[must_use]
    pub const fn requires_immediate_attention(&self) -> bool {
        matches!(self.severity, IssueSeverity::Critical | IssueSeverity::High)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_fixed_per_kind() {
        assert_eq!(
            ConsistencyIssueKind::OrphanedCredential.severity(),
            IssueSeverity::High
        );
        assert_eq!(
            ConsistencyIssueKind::OrphanedTemplate.severity(),
            IssueSeverity::Medium
        );
        assert_eq!(
            ConsistencyIssueKind::MetadataMismatch.severity(),
            IssueSeverity::Low
        );
        assert_eq!(
            ConsistencyIssueKind::CorruptedData.severity(),
            IssueSeverity::Critical
        );
    }

    #[test]
    fn severity_ranks_order() {
        assert!(IssueSeverity::Critical.rank() > IssueSeverity::High.rank());
        assert!(IssueSeverity::High.rank() > IssueSeverity::Medium.rank());
        assert!(IssueSeverity::Medium.rank() > IssueSeverity::Low.rank());
    }

    #[test]
    fn construction_sets_kind_and_severity_together() {
        let issue = ConsistencyIssue::new(ConsistencyIssueKind::OrphanedCredential, "orphan");

        assert_eq!(issue.kind, ConsistencyIssueKind::OrphanedCredential);
        assert_eq!(issue.severity, IssueSeverity::High);
        assert!(!issue.resolved);
        assert!(issue.resolved_at.is_none());
    }

    #[test]
    fn resolve_round_trip() {
        let mut issue = ConsistencyIssue::new(ConsistencyIssueKind::MetadataMismatch, "drift");
        issue.resolve("admin", Some("synced from template".into()));

        assert!(issue.resolved);
        assert!(issue.resolved_at.is_some());
        assert_eq!(issue.resolved_by.as_deref(), Some("admin"));
        assert_eq!(
            issue.resolution_notes.as_deref(),
            Some("synced from template")
        );
    }

    #[test]
    fn immediate_attention_tracks_severity() {
        let high = ConsistencyIssue::new(ConsistencyIssueKind::SyncConflict, "conflict");
        let low = ConsistencyIssue::new(ConsistencyIssueKind::MetadataMismatch, "drift");

        assert!(high.requires_immediate_attention());
        assert!(!low.requires_immediate_attention());
    }
}
