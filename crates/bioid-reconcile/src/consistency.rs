//! Consistency analysis between the identity store and the biometric
//! service.
//!
//! Analysis is split in two: snapshot gathering (the only part that touches
//! the stores) and [`analyze_snapshot`], a pure function so that identical
//! snapshots always yield identical issue lists.

use std::collections::BTreeMap;
use std::sync::Arc;

use bioid_directory::{CredentialDirectory, RealmRef, TemplateDirectory};
use bioid_model::{
    ConsistencyIssue, ConsistencyIssueKind, DataConsistencyReport, FaceCredential,
    FaceCredentialData, TemplateStatus,
};

use crate::audit::{AuditEvent, AuditEventKind, AuditSink};
use crate::error::{ReconcileError, ReconcileResult};
use crate::retry::RetryPolicy;

/// Realm-scoped snapshot of both stores.
#[derive(Debug, Clone)]
pub struct RealmSnapshot {
    /// Realm the snapshot covers.
    pub realm: RealmRef,
    /// All face credentials in the realm.
    pub credentials: Vec<FaceCredential>,
    /// All templates enrolled in the biometric service.
    pub templates: Vec<TemplateStatus>,
}

/// Analyzes a snapshot and returns the detected issues.
///
/// Pure and deterministic: issues are emitted in a fixed order (corrupted
/// and unlinked credentials first, then orphaned credentials, then orphaned
/// templates, then pair mismatches), each group sorted by its join key.
#[must_use]
pub fn analyze_snapshot(snapshot: &RealmSnapshot) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();

    // Credentials sorted by id so emission order is reproducible.
    let mut credentials: Vec<&FaceCredential> = snapshot.credentials.iter().collect();
    credentials.sort_by_key(|cred| cred.credential_id);

    let templates: BTreeMap<i64, &TemplateStatus> = snapshot
        .templates
        .iter()
        .map(|template| (template.class_id, template))
        .collect();

    // Index linkable credentials by class id; classify the rest.
    let mut by_class: BTreeMap<i64, Vec<(&FaceCredential, FaceCredentialData)>> = BTreeMap::new();
    for cred in credentials {
        match cred.decode_data() {
            Err(err) => {
                issues.push(
                    ConsistencyIssue::new(
                        ConsistencyIssueKind::CorruptedData,
                        format!(
                            "Credential payload for user {} is unreadable",
                            cred.username
                        ),
                    )
                    .with_user(cred.user_id, cred.username.clone())
                    .with_credential_id(cred.credential_id)
                    .with_metadata("parse_error", err.to_string()),
                );
            }
            Ok(data) => match data.usable_class_id() {
                None => {
                    issues.push(
                        ConsistencyIssue::new(
                            ConsistencyIssueKind::InvalidReference,
                            format!(
                                "Credential for user {} carries no usable template reference",
                                cred.username
                            ),
                        )
                        .with_user(cred.user_id, cred.username.clone())
                        .with_credential_id(cred.credential_id),
                    );
                }
                Some(class_id) => {
                    by_class.entry(class_id).or_default().push((cred, data));
                }
            },
        }
    }

    // Credentials whose template is gone.
    for (class_id, creds) in &by_class {
        if templates.contains_key(class_id) {
            continue;
        }
        for (cred, _) in creds {
            issues.push(
                ConsistencyIssue::new(
                    ConsistencyIssueKind::OrphanedCredential,
                    format!(
                        "User {} has a face credential but no corresponding template in the biometric service",
                        cred.username
                    ),
                )
                .with_user(cred.user_id, cred.username.clone())
                .with_class_id(*class_id)
                .with_credential_id(cred.credential_id),
            );
        }
    }

    // Templates no credential references.
    for (class_id, _) in &templates {
        if !by_class.contains_key(class_id) {
            issues.push(
                ConsistencyIssue::new(
                    ConsistencyIssueKind::OrphanedTemplate,
                    format!(
                        "Template {class_id} exists in the biometric service but no credential references it"
                    ),
                )
                .with_class_id(*class_id),
            );
        }
    }

    // Pairs that exist on both sides.
    for (class_id, creds) in &by_class {
        let Some(template) = templates.get(class_id) else {
            continue;
        };
        for (cred, data) in creds {
            if cred.active != template.available {
                issues.push(
                    ConsistencyIssue::new(
                        ConsistencyIssueKind::SyncConflict,
                        format!(
                            "Credential activity for user {} conflicts with template availability",
                            cred.username
                        ),
                    )
                    .with_user(cred.user_id, cred.username.clone())
                    .with_class_id(*class_id)
                    .with_credential_id(cred.credential_id)
                    .with_metadata("credential_active", cred.active.to_string())
                    .with_metadata("template_available", template.available.to_string()),
                );
            } else if has_metadata_mismatch(data, template) {
                issues.push(
                    ConsistencyIssue::new(
                        ConsistencyIssueKind::MetadataMismatch,
                        format!(
                            "Metadata differs between the identity store and the biometric service for user {}",
                            cred.username
                        ),
                    )
                    .with_user(cred.user_id, cred.username.clone())
                    .with_class_id(*class_id)
                    .with_credential_id(cred.credential_id)
                    .with_metadata("credential_encoder", data.encoder_version.to_string())
                    .with_metadata("template_encoder", template.encoder_version.to_string()),
                );
            }
        }
    }

    issues
}

/// Compares the designated metadata fields of a credential/template pair.
///
/// The designated fields are the encoder version and the tag set (order
/// insensitive). Availability disagreement is a sync conflict, not a
/// mismatch, and is handled separately.
fn has_metadata_mismatch(data: &FaceCredentialData, template: &TemplateStatus) -> bool {
    data.encoder_version != template.encoder_version
        || data.sorted_tags() != template.sorted_tags()
}

/// Service that performs consistency checks for a realm.
pub struct DataConsistencyService {
    credentials: Arc<dyn CredentialDirectory>,
    templates: Arc<dyn TemplateDirectory>,
    retry: RetryPolicy,
    audit: Arc<dyn AuditSink>,
}

impl DataConsistencyService {
    /// Creates a service over the given directories.
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialDirectory>,
        templates: Arc<dyn TemplateDirectory>,
        retry: RetryPolicy,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            credentials,
            templates,
            retry,
            audit,
        }
    }

    /// Retry policy used for store access.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Gathers a realm snapshot from both stores.
    ///
    /// ## Errors
    ///
    /// Returns [`ReconcileError::AnalysisFailed`] when either store cannot
    /// be enumerated, after retries.
    pub async fn gather_snapshot(&self, realm: &RealmRef) -> ReconcileResult<RealmSnapshot> {
        let credentials = self
            .retry
            .execute(|| async {
                self.credentials
                    .list_face_credentials(&realm.id)
                    .await
                    .map_err(ReconcileError::from)
            })
            .await
            .map_err(|err| {
                ReconcileError::AnalysisFailed(format!("credential listing failed: {err}"))
            })?;

        let templates = self
            .retry
            .execute(|| async {
                self.templates
                    .list_templates()
                    .await
                    .map_err(ReconcileError::from)
            })
            .await
            .map_err(|err| {
                ReconcileError::AnalysisFailed(format!("template listing failed: {err}"))
            })?;

        Ok(RealmSnapshot {
            realm: realm.clone(),
            credentials,
            templates,
        })
    }

    /// Performs a full consistency check for a realm.
    ///
    /// The returned report is `Completed` with the detected issues, or
    /// `Failed` with the causing message when a consistent snapshot could
    /// not be obtained - a failed report's issue list must not be trusted.
    pub async fn perform_consistency_check(&self, realm: &RealmRef) -> DataConsistencyReport {
        tracing::info!(realm = %realm.name, "starting data consistency check");
        let mut report = DataConsistencyReport::new(realm.id.clone(), realm.name.clone());

        match self.gather_snapshot(realm).await {
            Err(err) => {
                tracing::error!(realm = %realm.name, error = %err, "consistency check failed");
                report.fail(err.to_string());
                self.audit.record(
                    AuditEvent::builder(AuditEventKind::ConsistencyCheckFailed)
                        .realm(realm.id.clone(), realm.name.clone())
                        .failure(err.to_string())
                        .build(),
                );
            }
            Ok(snapshot) => {
                tracing::debug!(
                    realm = %realm.name,
                    credentials = snapshot.credentials.len(),
                    templates = snapshot.templates.len(),
                    "snapshot gathered"
                );
                report.set_issues(analyze_snapshot(&snapshot));
                report.complete();
                tracing::info!(
                    realm = %realm.name,
                    issues = report.total_issues(),
                    "data consistency check completed"
                );
                let stats = report.statistics();
                self.audit.record(
                    AuditEvent::builder(AuditEventKind::ConsistencyCheckCompleted)
                        .realm(realm.id.clone(), realm.name.clone())
                        .detail("total_issues", stats.total_issues)
                        .detail("orphaned_credentials", stats.orphaned_credentials)
                        .detail("orphaned_templates", stats.orphaned_templates)
                        .detail("metadata_mismatches", stats.metadata_mismatches)
                        .build(),
                );
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use bioid_model::IssueSeverity;
    use uuid::Uuid;

    use super::*;

    fn realm() -> RealmRef {
        RealmRef::new("realm-1", "master")
    }

    fn credential(username: &str, class_id: i64, encoder: i32) -> FaceCredential {
        FaceCredential::new(
            Uuid::now_v7(),
            username,
            Uuid::now_v7(),
            format!(r#"{{"classId":{class_id},"encoderVersion":{encoder}}}"#),
        )
    }

    fn snapshot(
        credentials: Vec<FaceCredential>,
        templates: Vec<TemplateStatus>,
    ) -> RealmSnapshot {
        RealmSnapshot {
            realm: realm(),
            credentials,
            templates,
        }
    }

    #[test]
    fn empty_snapshot_yields_no_issues() {
        assert!(analyze_snapshot(&snapshot(vec![], vec![])).is_empty());
    }

    #[test]
    fn orphaned_credential_detected() {
        let cred = credential("alice", 42, 1);
        let user_id = cred.user_id;
        let issues = analyze_snapshot(&snapshot(vec![cred], vec![]));

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, ConsistencyIssueKind::OrphanedCredential);
        assert_eq!(issues[0].severity, IssueSeverity::High);
        assert_eq!(issues[0].class_id, Some(42));
        assert_eq!(issues[0].user_id, Some(user_id));
    }

    #[test]
    fn orphaned_template_detected() {
        let issues = analyze_snapshot(&snapshot(vec![], vec![TemplateStatus::new(99, 1)]));

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, ConsistencyIssueKind::OrphanedTemplate);
        assert_eq!(issues[0].severity, IssueSeverity::Medium);
        assert_eq!(issues[0].class_id, Some(99));
    }

    #[test]
    fn consistent_pair_yields_no_issues() {
        let issues = analyze_snapshot(&snapshot(
            vec![credential("bob", 7, 3)],
            vec![TemplateStatus::new(7, 3)],
        ));

        assert!(issues.is_empty());
    }

    #[test]
    fn encoder_divergence_is_low_severity_mismatch() {
        let issues = analyze_snapshot(&snapshot(
            vec![credential("bob", 7, 2)],
            vec![TemplateStatus::new(7, 3)],
        ));

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, ConsistencyIssueKind::MetadataMismatch);
        assert_eq!(issues[0].severity, IssueSeverity::Low);
    }

    #[test]
    fn availability_disagreement_is_sync_conflict() {
        let issues = analyze_snapshot(&snapshot(
            vec![credential("bob", 7, 3)],
            vec![TemplateStatus::new(7, 3).unavailable()],
        ));

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, ConsistencyIssueKind::SyncConflict);
        assert_eq!(issues[0].severity, IssueSeverity::High);
    }

    #[test]
    fn unreadable_payload_is_corrupted_data() {
        let cred = FaceCredential::new(Uuid::now_v7(), "eve", Uuid::now_v7(), "{broken");
        let issues = analyze_snapshot(&snapshot(vec![cred], vec![]));

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, ConsistencyIssueKind::CorruptedData);
        assert_eq!(issues[0].severity, IssueSeverity::Critical);
    }

    #[test]
    fn missing_class_id_is_invalid_reference() {
        let cred = FaceCredential::new(
            Uuid::now_v7(),
            "eve",
            Uuid::now_v7(),
            r#"{"classId":0,"encoderVersion":1}"#,
        );
        let issues = analyze_snapshot(&snapshot(vec![cred], vec![]));

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, ConsistencyIssueKind::InvalidReference);
    }

    #[test]
    fn analysis_is_deterministic() {
        let snap = snapshot(
            vec![
                credential("alice", 42, 1),
                credential("bob", 7, 2),
                FaceCredential::new(Uuid::now_v7(), "eve", Uuid::now_v7(), "{broken"),
            ],
            vec![TemplateStatus::new(7, 3), TemplateStatus::new(99, 1)],
        );

        let first = analyze_snapshot(&snap);
        let second = analyze_snapshot(&snap);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.severity, b.severity);
            assert_eq!(a.class_id, b.class_id);
            assert_eq!(a.credential_id, b.credential_id);
            assert_eq!(a.description, b.description);
        }
    }

    #[test]
    fn emission_order_groups_by_kind() {
        let snap = snapshot(
            vec![
                credential("alice", 42, 1),
                FaceCredential::new(Uuid::now_v7(), "eve", Uuid::now_v7(), "{broken"),
                credential("bob", 7, 2),
            ],
            vec![TemplateStatus::new(7, 3), TemplateStatus::new(99, 1)],
        );

        let kinds: Vec<ConsistencyIssueKind> =
            analyze_snapshot(&snap).iter().map(|i| i.kind).collect();

        assert_eq!(
            kinds,
            vec![
                ConsistencyIssueKind::CorruptedData,
                ConsistencyIssueKind::OrphanedCredential,
                ConsistencyIssueKind::OrphanedTemplate,
                ConsistencyIssueKind::MetadataMismatch,
            ]
        );
    }
}
