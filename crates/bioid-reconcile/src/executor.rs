//! Repair execution.
//!
//! Applies planned repairs against the two stores. Every action in a batch
//! is attempted independently - one failure never prevents attempts on the
//! remaining actions - and actions that need sign-off are parked instead of
//! executed.

use std::collections::HashMap;
use std::sync::Arc;

use bioid_directory::{CredentialDirectory, DirectoryError, RealmRef, TemplateDirectory};
use bioid_model::{
    CleanupError, CleanupResult, ConsistencyCheckStatus, ConsistencyIssue, ConsistencyIssueKind,
    RepairAction, RepairActionKind, RepairError, RepairResult, SynchronizationAction,
    SynchronizationActionKind, SynchronizationError, SynchronizationResult,
};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditEventKind, AuditSink};
use crate::consistency::DataConsistencyService;
use crate::error::{ReconcileError, ReconcileResult};
use crate::planner::RepairPlanner;
use crate::retry::RetryPolicy;

/// Executes repair, cleanup, and synchronization runs for a realm.
pub struct RepairExecutor {
    consistency: Arc<DataConsistencyService>,
    credentials: Arc<dyn CredentialDirectory>,
    templates: Arc<dyn TemplateDirectory>,
    retry: RetryPolicy,
    planner: RepairPlanner,
    audit: Arc<dyn AuditSink>,
}

impl RepairExecutor {
    /// Creates an executor over the given directories.
    #[must_use]
    pub fn new(
        consistency: Arc<DataConsistencyService>,
        credentials: Arc<dyn CredentialDirectory>,
        templates: Arc<dyn TemplateDirectory>,
        retry: RetryPolicy,
        planner: RepairPlanner,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            consistency,
            credentials,
            templates,
            retry,
            planner,
            audit,
        }
    }

    /// Planner used for issue-to-action mapping.
    #[must_use]
    pub const fn planner(&self) -> &RepairPlanner {
        &self.planner
    }

    /// Executes one action.
    ///
    /// ## Errors
    ///
    /// Returns the underlying store error; deletions are idempotent-safe, so
    /// an already-absent target is success, not an error.
    pub async fn execute(
        &self,
        realm: &RealmRef,
        action: &RepairAction,
        issue: &ConsistencyIssue,
    ) -> ReconcileResult<()> {
        tracing::debug!(
            realm = %realm.name,
            action = action.kind.as_str(),
            issue_id = %issue.issue_id,
            "executing repair action"
        );
        match action.kind {
            RepairActionKind::DeleteOrphanedCredential => {
                self.delete_orphaned_credential(realm, issue).await
            }
            RepairActionKind::DeleteOrphanedTemplate => {
                self.delete_orphaned_template(issue).await
            }
            RepairActionKind::UpdateMetadata => self.sync_credential_metadata(realm, issue).await,
            RepairActionKind::ResolveConflict
            | RepairActionKind::RecreateCredential
            | RepairActionKind::RecreateTemplate
            | RepairActionKind::ManualInterventionRequired => Err(ReconcileError::DataError(
                format!("{} requires manual intervention", action.kind.as_str()),
            )),
        }
    }

    /// Executes a batch of issues through planning and approval gating.
    ///
    /// Successes accumulate into `successful_repairs`, actions needing
    /// sign-off into `pending_approvals`, failures into `errors`. The batch
    /// status is `Completed` only with zero errors and zero pending entries.
    pub async fn execute_batch(
        &self,
        realm: &RealmRef,
        issues: &[ConsistencyIssue],
        auto_approve: bool,
    ) -> RepairResult {
        let mut result = RepairResult::new(realm.id.clone());
        for issue in issues {
            self.apply_planned(realm, issue, auto_approve, &mut result)
                .await;
        }
        result.finish();
        self.record_repair_audit(realm, &result);
        result
    }

    /// Repairs the given issues from a fresh consistency check.
    ///
    /// Issue ids not present in the current report are recorded as
    /// non-retryable errors; the rest go through normal batch execution.
    pub async fn repair_consistency_issues(
        &self,
        realm: &RealmRef,
        issue_ids: &[Uuid],
        auto_approve: bool,
    ) -> RepairResult {
        tracing::info!(
            realm = %realm.name,
            requested = issue_ids.len(),
            "starting repair of consistency issues"
        );
        let mut result = RepairResult::new(realm.id.clone());

        let report = self.consistency.perform_consistency_check(realm).await;
        if report.status() == ConsistencyCheckStatus::Failed {
            let message = report
                .error_message()
                .unwrap_or("consistency check failed")
                .to_string();
            result.fail(message);
            self.record_repair_audit(realm, &result);
            return result;
        }

        let issue_map: HashMap<Uuid, ConsistencyIssue> = report
            .issues()
            .into_iter()
            .map(|issue| (issue.issue_id, issue))
            .collect();

        for issue_id in issue_ids {
            match issue_map.get(issue_id) {
                None => {
                    tracing::warn!(issue_id = %issue_id, "issue not found in current report");
                    result.add_error(RepairError::new(*issue_id, "issue not found", false));
                }
                Some(issue) => {
                    self.apply_planned(realm, issue, auto_approve, &mut result)
                        .await;
                }
            }
        }

        result.finish();
        tracing::info!(
            realm = %realm.name,
            successful = result.successful_repairs.len(),
            pending = result.pending_approvals.len(),
            errors = result.errors.len(),
            "repair completed"
        );
        self.record_repair_audit(realm, &result);
        result
    }

    /// Cleans up orphaned credentials and templates found by a fresh
    /// consistency check.
    pub async fn cleanup_orphaned_data(&self, realm: &RealmRef, dry_run: bool) -> CleanupResult {
        self.cleanup_orphaned_data_bounded(realm, dry_run, None)
            .await
    }

    /// Cleanup with an optional cap on the number of items touched.
    ///
    /// Items beyond the cap are left for the next run and logged, never
    /// silently dropped.
    pub async fn cleanup_orphaned_data_bounded(
        &self,
        realm: &RealmRef,
        dry_run: bool,
        max_items: Option<usize>,
    ) -> CleanupResult {
        tracing::info!(realm = %realm.name, dry_run, "starting orphaned data cleanup");
        let mut result = CleanupResult::new(realm.id.clone(), dry_run);

        let audit_kind = if dry_run {
            AuditEventKind::CleanupDryRun
        } else {
            AuditEventKind::CleanupExecuted
        };
        let report = self.consistency.perform_consistency_check(realm).await;
        if report.status() == ConsistencyCheckStatus::Failed {
            let message = report
                .error_message()
                .unwrap_or("consistency check failed")
                .to_string();
            result.fail(message.clone());
            self.audit.record(
                AuditEvent::builder(audit_kind)
                    .realm(realm.id.clone(), realm.name.clone())
                    .failure(message)
                    .build(),
            );
            return result;
        }

        let orphaned_credentials =
            report.issues_of_kind(ConsistencyIssueKind::OrphanedCredential);
        let orphaned_templates = report.issues_of_kind(ConsistencyIssueKind::OrphanedTemplate);
        let total = orphaned_credentials.len() + orphaned_templates.len();
        let mut budget = max_items.unwrap_or(usize::MAX);
        if budget < total {
            tracing::warn!(
                realm = %realm.name,
                total,
                cap = budget,
                "orphan count exceeds per-run cap; remainder deferred to the next run"
            );
        }

        for issue in &orphaned_credentials {
            if budget == 0 {
                break;
            }
            budget -= 1;
            self.cleanup_one_credential(realm, issue, dry_run, &mut result)
                .await;
        }

        for issue in &orphaned_templates {
            if budget == 0 {
                break;
            }
            budget -= 1;
            self.cleanup_one_template(issue, dry_run, &mut result).await;
        }

        result.finish();
        tracing::info!(
            realm = %realm.name,
            items = result.total_items_processed(),
            errors = result.errors.len(),
            dry_run,
            "orphaned data cleanup finished"
        );
        self.audit.record(
            AuditEvent::builder(audit_kind)
                .realm(realm.id.clone(), realm.name.clone())
                .detail("items", result.total_items_processed())
                .detail("errors", result.errors.len())
                .build(),
        );
        result
    }

    /// Synchronizes credential metadata with the biometric service's
    /// authoritative template state.
    ///
    /// Only metadata mismatches are applied; conflicts and corruption are
    /// surfaced as planned manual-review actions. Orphans are the cleanup
    /// pass's concern and are skipped here.
    pub async fn synchronize_template_status(
        &self,
        realm: &RealmRef,
        dry_run: bool,
    ) -> SynchronizationResult {
        tracing::info!(realm = %realm.name, dry_run, "starting template status synchronization");
        let mut result = SynchronizationResult::new(realm.id.clone(), dry_run);

        let report = self.consistency.perform_consistency_check(realm).await;
        if report.status() == ConsistencyCheckStatus::Failed {
            result.fail(
                report
                    .error_message()
                    .unwrap_or("consistency check failed")
                    .to_string(),
            );
            return result;
        }

        for issue in report.issues() {
            let kind = match issue.kind {
                ConsistencyIssueKind::MetadataMismatch => {
                    SynchronizationActionKind::UpdateMetadata
                }
                ConsistencyIssueKind::SyncConflict
                | ConsistencyIssueKind::CorruptedData
                | ConsistencyIssueKind::InvalidReference => SynchronizationActionKind::ManualReview,
                ConsistencyIssueKind::OrphanedCredential
                | ConsistencyIssueKind::OrphanedTemplate => continue,
            };
            let action =
                SynchronizationAction::new(issue.issue_id, kind, issue.description.clone());

            if dry_run || kind == SynchronizationActionKind::ManualReview {
                result.add_planned_action(action);
                continue;
            }
            match self.sync_credential_metadata(realm, &issue).await {
                Ok(()) => result.add_executed_action(action),
                Err(err) => {
                    tracing::error!(
                        issue_id = %issue.issue_id,
                        error = %err,
                        "failed to synchronize issue"
                    );
                    result.add_error(SynchronizationError::new(issue.issue_id, err.to_string()));
                }
            }
        }

        result.complete();
        tracing::info!(
            realm = %realm.name,
            actions = result.total_actions(),
            errors = result.errors.len(),
            "template status synchronization completed"
        );
        self.audit.record(
            AuditEvent::builder(AuditEventKind::SynchronizationExecuted)
                .realm(realm.id.clone(), realm.name.clone())
                .detail("actions", result.total_actions())
                .detail("errors", result.errors.len())
                .detail("dry_run", dry_run)
                .build(),
        );
        result
    }

    /// Plans one issue and routes the action through approval gating.
    async fn apply_planned(
        &self,
        realm: &RealmRef,
        issue: &ConsistencyIssue,
        auto_approve: bool,
        result: &mut RepairResult,
    ) {
        let mut action = self.planner.plan(issue);

        if !RepairPlanner::is_auto_executable(action.kind) {
            result.add_pending_approval(action);
            return;
        }
        if action.requires_approval && !auto_approve && !RepairPlanner::is_low_risk(&action) {
            result.add_pending_approval(action);
            return;
        }
        if action.requires_approval && auto_approve {
            action.approve("auto-approve");
        }

        match self.execute(realm, &action, issue).await {
            Ok(()) => result.add_successful_repair(action),
            Err(err) => {
                tracing::error!(
                    issue_id = %issue.issue_id,
                    error = %err,
                    "failed to repair issue"
                );
                result.add_error(RepairError::new(
                    issue.issue_id,
                    err.to_string(),
                    err.is_retryable(),
                ));
            }
        }
    }

    async fn delete_orphaned_credential(
        &self,
        realm: &RealmRef,
        issue: &ConsistencyIssue,
    ) -> ReconcileResult<()> {
        let user_id = issue
            .user_id
            .ok_or_else(|| ReconcileError::DataError("issue carries no user id".into()))?;
        let credential_id = issue
            .credential_id
            .ok_or_else(|| ReconcileError::DataError("issue carries no credential id".into()))?;

        // A user deleted concurrently already took the credential with them.
        if !self.credentials.user_exists(&realm.id, user_id).await? {
            tracing::debug!(user_id = %user_id, "user gone; orphaned credential already removed");
            return Ok(());
        }

        match self
            .credentials
            .delete_credential(&realm.id, user_id, credential_id)
            .await
        {
            Ok(()) => {
                tracing::info!(user_id = %user_id, "removed orphaned credential");
                Ok(())
            }
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_orphaned_template(&self, issue: &ConsistencyIssue) -> ReconcileResult<()> {
        let class_id = issue
            .class_id
            .ok_or_else(|| ReconcileError::DataError("issue carries no class id".into()))?;

        let outcome = self
            .retry
            .execute(|| async {
                match self.templates.delete_template(class_id).await {
                    Ok(()) => Ok(true),
                    Err(DirectoryError::NotFound { .. }) => Ok(false),
                    Err(err) => Err(err.into()),
                }
            })
            .await?;
        if outcome {
            tracing::info!(class_id, "removed orphaned template");
        } else {
            tracing::debug!(class_id, "template already absent");
        }
        Ok(())
    }

    /// Rewrites the credential payload's designated fields from the
    /// template's current values.
    async fn sync_credential_metadata(
        &self,
        realm: &RealmRef,
        issue: &ConsistencyIssue,
    ) -> ReconcileResult<()> {
        let user_id = issue
            .user_id
            .ok_or_else(|| ReconcileError::DataError("issue carries no user id".into()))?;
        let credential_id = issue
            .credential_id
            .ok_or_else(|| ReconcileError::DataError("issue carries no credential id".into()))?;
        let class_id = issue
            .class_id
            .ok_or_else(|| ReconcileError::DataError("issue carries no class id".into()))?;

        let template = match self
            .retry
            .execute(|| async {
                self.templates
                    .get_status(class_id)
                    .await
                    .map_err(ReconcileError::from)
            })
            .await
        {
            Ok(template) => template,
            // Template gone between check and repair: the mismatch dissolved
            // into an orphan the next check will pick up.
            Err(ReconcileError::DataError(_)) => {
                tracing::debug!(class_id, "template gone; nothing to synchronize");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let credentials = self.credentials.list_face_credentials(&realm.id).await?;
        let Some(credential) = credentials
            .iter()
            .find(|cred| cred.credential_id == credential_id)
        else {
            tracing::debug!(credential_id = %credential_id, "credential gone; nothing to synchronize");
            return Ok(());
        };

        let mut data = credential
            .decode_data()
            .map_err(|err| ReconcileError::DataError(format!("credential payload: {err}")))?;
        data.encoder_version = template.encoder_version;
        data.tags = template.tags.clone();
        data.feature_vectors = template.feature_vectors;
        let encoded = data
            .encode()
            .map_err(|err| ReconcileError::Internal(err.to_string()))?;

        match self
            .credentials
            .update_credential_data(&realm.id, user_id, credential_id, &encoded)
            .await
        {
            Ok(()) => {
                tracing::info!(user_id = %user_id, class_id, "synchronized credential metadata");
                Ok(())
            }
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn cleanup_one_credential(
        &self,
        realm: &RealmRef,
        issue: &ConsistencyIssue,
        dry_run: bool,
        result: &mut CleanupResult,
    ) {
        let Some(user_id) = issue.user_id else {
            result.add_error(CleanupError::new(
                issue.issue_id.to_string(),
                "credential",
                "issue carries no user id",
                false,
            ));
            return;
        };
        if dry_run {
            result.add_credential_to_clean(user_id);
            return;
        }
        match self.delete_orphaned_credential(realm, issue).await {
            Ok(()) => result.add_cleaned_credential(user_id),
            Err(err) => {
                tracing::error!(user_id = %user_id, error = %err, "failed to clean up orphaned credential");
                result.add_error(CleanupError::new(
                    user_id.to_string(),
                    "credential",
                    err.to_string(),
                    err.is_retryable(),
                ));
            }
        }
    }

    async fn cleanup_one_template(
        &self,
        issue: &ConsistencyIssue,
        dry_run: bool,
        result: &mut CleanupResult,
    ) {
        let Some(class_id) = issue.class_id else {
            result.add_error(CleanupError::new(
                issue.issue_id.to_string(),
                "template",
                "issue carries no class id",
                false,
            ));
            return;
        };
        if dry_run {
            result.add_template_to_clean(class_id);
            return;
        }
        match self.delete_orphaned_template(issue).await {
            Ok(()) => result.add_cleaned_template(class_id),
            Err(err) => {
                tracing::error!(class_id, error = %err, "failed to clean up orphaned template");
                result.add_error(CleanupError::new(
                    class_id.to_string(),
                    "template",
                    err.to_string(),
                    err.is_retryable(),
                ));
            }
        }
    }

    fn record_repair_audit(&self, realm: &RealmRef, result: &RepairResult) {
        self.audit.record(
            AuditEvent::builder(AuditEventKind::RepairExecuted)
                .realm(realm.id.clone(), realm.name.clone())
                .detail("successful", result.successful_repairs.len())
                .detail("pending_approvals", result.pending_approvals.len())
                .detail("errors", result.errors.len())
                .build(),
        );
    }
}
