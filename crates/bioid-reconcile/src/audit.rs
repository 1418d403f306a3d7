//! Audit events for reconciliation runs.
//!
//! Every completed analysis, repair, synchronization, and cleanup run is
//! reported as a structured event. The subsystem does not persist audit
//! trails itself; embedders supply an [`AuditSink`] that forwards events to
//! their audit pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of reconciliation audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventKind {
    /// A consistency check completed.
    ConsistencyCheckCompleted,
    /// A consistency check failed.
    ConsistencyCheckFailed,
    /// A repair batch finished.
    RepairExecuted,
    /// A synchronization run finished.
    SynchronizationExecuted,
    /// A live cleanup run finished.
    CleanupExecuted,
    /// A dry-run cleanup finished and awaits review.
    CleanupDryRun,
    /// Automated cleanup was scheduled for a realm.
    CleanupScheduled,
    /// A realm's cleanup schedule was cancelled.
    CleanupCancelled,
    /// A scheduled cleanup cycle raised an error.
    CleanupError,
}

/// Outcome of an audited run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    /// The run succeeded.
    Success,
    /// The run failed.
    Failure,
}

/// A structured audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: AuditEventKind,
    /// Whether the run succeeded.
    pub outcome: AuditOutcome,
    /// Realm the run covered.
    pub realm_id: Option<String>,
    /// Realm display name.
    pub realm_name: Option<String>,
    /// Error message for failure events.
    pub error: Option<String>,
    /// Counts and context as key-value pairs.
    pub details: Vec<(String, String)>,
}

impl AuditEvent {
    /// Creates a builder for an event of the given kind.
    #[must_use]
    pub const fn builder(kind: AuditEventKind) -> AuditEventBuilder {
        AuditEventBuilder::new(kind)
    }
}

/// Builder for audit events.
pub struct AuditEventBuilder {
    kind: AuditEventKind,
    outcome: AuditOutcome,
    realm_id: Option<String>,
    realm_name: Option<String>,
    error: Option<String>,
    details: Vec<(String, String)>,
}

impl AuditEventBuilder {
    /// Creates a builder; the outcome defaults to success.
    #[must_use]
    pub const fn new(kind: AuditEventKind) -> Self {
        Self {
            kind,
            outcome: AuditOutcome::Success,
            realm_id: None,
            realm_name: None,
            error: None,
            details: Vec::new(),
        }
    }

    /// Sets the realm.
    #[must_use]
    pub fn realm(mut self, realm_id: impl Into<String>, realm_name: impl Into<String>) -> Self {
        self.realm_id = Some(realm_id.into());
        self.realm_name = Some(realm_name.into());
        self
    }

    /// Marks the outcome failed with an error message.
    #[must_use]
    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.outcome = AuditOutcome::Failure;
        self.error = Some(error.into());
        self
    }

    /// Adds a detail key-value pair.
    #[must_use]
    pub fn detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.push((key.into(), value.to_string()));
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build(self) -> AuditEvent {
        AuditEvent {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            kind: self.kind,
            outcome: self.outcome,
            realm_id: self.realm_id,
            realm_name: self.realm_name,
            error: self.error,
            details: self.details,
        }
    }
}

/// Sink for reconciliation audit events.
///
/// Implementations must not block for long and must never panic; a lost
/// audit event must not take a cleanup cycle down with it.
pub trait AuditSink: Send + Sync {
    /// Records an event.
    fn record(&self, event: AuditEvent);
}

/// Default sink that emits events as structured log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match event.outcome {
            AuditOutcome::Success => tracing::info!(
                kind = ?event.kind,
                realm_id = event.realm_id.as_deref().unwrap_or("-"),
                details = ?event.details,
                "reconciliation audit event"
            ),
            AuditOutcome::Failure => tracing::warn!(
                kind = ?event.kind,
                realm_id = event.realm_id.as_deref().unwrap_or("-"),
                error = event.error.as_deref().unwrap_or("-"),
                details = ?event.details,
                "reconciliation audit event"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_creates_success_event() {
        let event = AuditEvent::builder(AuditEventKind::CleanupExecuted)
            .realm("realm-1", "master")
            .detail("credentials_cleaned", 3)
            .build();

        assert_eq!(event.kind, AuditEventKind::CleanupExecuted);
        assert_eq!(event.outcome, AuditOutcome::Success);
        assert_eq!(event.realm_id.as_deref(), Some("realm-1"));
        assert_eq!(
            event.details,
            vec![("credentials_cleaned".to_string(), "3".to_string())]
        );
        assert!(event.error.is_none());
    }

    #[test]
    fn builder_creates_failure_event() {
        let event = AuditEvent::builder(AuditEventKind::ConsistencyCheckFailed)
            .realm("realm-1", "master")
            .failure("biometric service unreachable")
            .build();

        assert_eq!(event.outcome, AuditOutcome::Failure);
        assert_eq!(
            event.error.as_deref(),
            Some("biometric service unreachable")
        );
    }
}
