//! Automated cleanup scheduling.
//!
//! One recurring job per realm runs the consistency check, decides through
//! configurable thresholds whether cleanup is warranted, and executes it
//! behind a dry-run safety gate. Runs for a realm never overlap: the job
//! sleeps the configured interval *after* a cycle completes, so a slow cycle
//! delays its own next fire instead of racing it.

use std::collections::{HashMap, VecDeque};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use bioid_directory::{RealmDirectory, RealmRef};
use bioid_model::{
    CleanupResult, ConsistencyCheckStatus, ConsistencyIssueKind, DataConsistencyReport,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::audit::{AuditEvent, AuditEventKind, AuditSink};
use crate::consistency::DataConsistencyService;
use crate::error::{ReconcileError, ReconcileResult};
use crate::executor::RepairExecutor;

/// Executed cleanup results kept per realm.
const MAX_CLEANUP_RESULTS: usize = 50;
/// Dry-run results kept per realm.
const MAX_DRY_RUN_RESULTS: usize = 20;
/// Execution errors kept per realm.
const MAX_EXECUTION_ERRORS: usize = 20;
/// Realm cleanup cycles allowed to run concurrently.
const MAX_CONCURRENT_CYCLES: usize = 4;
/// Bound on waiting for a cancelled job to terminate at shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a realm's automated cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Hours between cleanup cycles.
    pub interval_hours: u64,
    /// Hours to wait before the first cycle.
    pub initial_delay_hours: u64,
    /// Run a dry-run pass before any live cleanup.
    pub dry_run_first: bool,
    /// Escalate a non-empty dry run to a live run without an operator.
    pub auto_approve_cleanup: bool,
    /// Emit a notification when a live cleanup completes.
    pub notify_on_completion: bool,
    /// Minimum orphaned credentials before cleanup is warranted.
    pub min_orphaned_credentials_threshold: usize,
    /// Minimum orphaned templates before cleanup is warranted.
    pub min_orphaned_templates_threshold: usize,
    /// Maximum items one cleanup run may touch.
    pub max_items_per_cleanup: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_hours: 24,
            initial_delay_hours: 1,
            dry_run_first: true,
            auto_approve_cleanup: false,
            notify_on_completion: true,
            min_orphaned_credentials_threshold: 1,
            min_orphaned_templates_threshold: 1,
            max_items_per_cleanup: 100,
        }
    }
}

impl CleanupConfig {
    /// Interval between cycles as a duration.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours * 3600)
    }

    /// Delay before the first cycle as a duration.
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_hours * 3600)
    }
}

/// A realm's cleanup schedule state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupSchedule {
    /// Realm identifier.
    pub realm_id: String,
    /// Realm display name.
    pub realm_name: String,
    /// Configuration the schedule runs with.
    pub config: CleanupConfig,
    /// When the schedule was created.
    pub scheduled_at: DateTime<Utc>,
    /// When the last cycle ran.
    pub last_run_at: Option<DateTime<Utc>>,
    /// When the next cycle is expected.
    pub next_run_at: Option<DateTime<Utc>>,
}

/// An error raised by a scheduled cleanup cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupExecutionError {
    /// When the error occurred.
    pub occurred_at: DateTime<Utc>,
    /// What went wrong.
    pub message: String,
}

impl CleanupExecutionError {
    /// Creates an error record stamped now.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            occurred_at: Utc::now(),
            message: message.into(),
        }
    }
}

/// Bounded per-realm history of cleanup runs.
///
/// Append-only with oldest-first eviction; reset only by process restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupHistory {
    realm_id: String,
    realm_name: String,
    cleanup_results: VecDeque<CleanupResult>,
    dry_run_results: VecDeque<CleanupResult>,
    errors: VecDeque<CleanupExecutionError>,
}

impl CleanupHistory {
    /// Creates an empty history for a realm.
    #[must_use]
    pub fn new(realm_id: impl Into<String>, realm_name: impl Into<String>) -> Self {
        Self {
            realm_id: realm_id.into(),
            realm_name: realm_name.into(),
            cleanup_results: VecDeque::new(),
            dry_run_results: VecDeque::new(),
            errors: VecDeque::new(),
        }
    }

    /// Realm identifier.
    #[must_use]
    pub fn realm_id(&self) -> &str {
        &self.realm_id
    }

    /// Realm display name.
    #[must_use]
    pub fn realm_name(&self) -> &str {
        &self.realm_name
    }

    /// Records an executed cleanup, evicting the oldest past the cap.
    pub fn add_cleanup_result(&mut self, result: CleanupResult) {
        self.cleanup_results.push_back(result);
        while self.cleanup_results.len() > MAX_CLEANUP_RESULTS {
            self.cleanup_results.pop_front();
        }
    }

    /// Records a dry-run result awaiting review.
    pub fn add_dry_run_result(&mut self, result: CleanupResult) {
        self.dry_run_results.push_back(result);
        while self.dry_run_results.len() > MAX_DRY_RUN_RESULTS {
            self.dry_run_results.pop_front();
        }
    }

    /// Records a cycle error.
    pub fn add_error(&mut self, error: CleanupExecutionError) {
        self.errors.push_back(error);
        while self.errors.len() > MAX_EXECUTION_ERRORS {
            self.errors.pop_front();
        }
    }

    /// Copy of the executed cleanup results, oldest first.
    #[must_use]
    pub fn cleanup_results(&self) -> Vec<CleanupResult> {
        self.cleanup_results.iter().cloned().collect()
    }

    /// Copy of the dry-run results, oldest first.
    #[must_use]
    pub fn dry_run_results(&self) -> Vec<CleanupResult> {
        self.dry_run_results.iter().cloned().collect()
    }

    /// Copy of the cycle errors, oldest first.
    #[must_use]
    pub fn errors(&self) -> Vec<CleanupExecutionError> {
        self.errors.iter().cloned().collect()
    }
}

struct ScheduledJob {
    schedule: CleanupSchedule,
    handle: JoinHandle<()>,
}

enum CycleOutcome {
    NoActionNeeded,
    DryRunPendingApproval,
    Executed,
    RealmGone,
}

/// Per-realm automated cleanup service.
///
/// The schedule registry is the one piece of shared mutable state; every
/// mutation happens under a single lock so re-scheduling is an atomic
/// replace (last writer wins) and cancellation cannot race it.
pub struct AutomatedCleanupService {
    core: Arc<CleanupCore>,
}

struct CleanupCore {
    consistency: Arc<DataConsistencyService>,
    executor: Arc<RepairExecutor>,
    realms: Arc<dyn RealmDirectory>,
    audit: Arc<dyn AuditSink>,
    schedules: Mutex<HashMap<String, ScheduledJob>>,
    history: DashMap<String, CleanupHistory>,
    run_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    run_slots: Semaphore,
}

impl AutomatedCleanupService {
    /// Creates the service over the given collaborators.
    #[must_use]
    pub fn new(
        consistency: Arc<DataConsistencyService>,
        executor: Arc<RepairExecutor>,
        realms: Arc<dyn RealmDirectory>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            core: Arc::new(CleanupCore {
                consistency,
                executor,
                realms,
                audit,
                schedules: Mutex::new(HashMap::new()),
                history: DashMap::new(),
                run_locks: DashMap::new(),
                run_slots: Semaphore::new(MAX_CONCURRENT_CYCLES),
            }),
        }
    }

    /// Schedules automated cleanup for a realm, replacing any prior
    /// schedule (the old job is cancelled under the same registry lock).
    pub fn schedule_automated_cleanup(&self, realm: &RealmRef, config: CleanupConfig) {
        let now = Utc::now();
        let schedule = CleanupSchedule {
            realm_id: realm.id.clone(),
            realm_name: realm.name.clone(),
            config: config.clone(),
            scheduled_at: now,
            last_run_at: None,
            next_run_at: Some(now + to_chrono(config.initial_delay())),
        };

        let core = Arc::clone(&self.core);
        let realm_id = realm.id.clone();
        let initial_delay = config.initial_delay();
        let interval = config.interval();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;
            loop {
                if core.run_cycle(&realm_id).await.is_break() {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        });

        let replaced = self.core.schedules.lock().insert(
            realm.id.clone(),
            ScheduledJob { schedule, handle },
        );
        if let Some(old) = replaced {
            old.handle.abort();
            tracing::info!(realm = %realm.name, "replaced existing cleanup schedule");
        }

        tracing::info!(
            realm = %realm.name,
            interval_hours = config.interval_hours,
            dry_run_first = config.dry_run_first,
            "automated cleanup scheduled"
        );
        self.core.audit.record(
            AuditEvent::builder(AuditEventKind::CleanupScheduled)
                .realm(realm.id.clone(), realm.name.clone())
                .detail("interval_hours", config.interval_hours)
                .build(),
        );
    }

    /// Cancels a realm's cleanup schedule.
    ///
    /// Best effort: an already-firing cycle completes, but no further cycle
    /// starts. Returns whether a schedule existed.
    pub fn cancel_scheduled_cleanup(&self, realm_id: &str) -> bool {
        let removed = self.core.schedules.lock().remove(realm_id);
        match removed {
            Some(job) => {
                job.handle.abort();
                tracing::info!(realm_id, "cancelled automated cleanup");
                self.core.audit.record(
                    AuditEvent::builder(AuditEventKind::CleanupCancelled)
                        .realm(realm_id.to_string(), job.schedule.realm_name.clone())
                        .build(),
                );
                true
            }
            None => false,
        }
    }

    /// Returns a realm's schedule state, or `None` if never scheduled.
    #[must_use]
    pub fn get_cleanup_schedule(&self, realm_id: &str) -> Option<CleanupSchedule> {
        self.core
            .schedules
            .lock()
            .get(realm_id)
            .map(|job| job.schedule.clone())
    }

    /// Returns a realm's run history, or `None` if it never ran.
    #[must_use]
    pub fn get_cleanup_history(&self, realm_id: &str) -> Option<CleanupHistory> {
        self.core
            .history
            .get(realm_id)
            .map(|entry| entry.value().clone())
    }

    /// Runs one cleanup cycle for every scheduled realm, sequentially, in
    /// the caller's context.
    ///
    /// Per-realm failures are recorded in history and do not stop the sweep.
    ///
    /// ## Errors
    ///
    /// Returns an error only when the realm list itself cannot be obtained.
    pub async fn perform_immediate_cleanup_check(&self) -> ReconcileResult<()> {
        tracing::info!("starting immediate cleanup check for all realms");
        let realms = self.core.realms.list_realms().await?;
        for realm in realms {
            let scheduled = self.core.schedules.lock().contains_key(&realm.id);
            if !scheduled {
                tracing::debug!(realm = %realm.name, "no cleanup schedule; skipping");
                continue;
            }
            let _ = self.core.run_cycle(&realm.id).await;
        }
        Ok(())
    }

    /// Cancels all schedules and waits (bounded) for their jobs to stop.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down automated cleanup service");
        let handles: Vec<JoinHandle<()>> = self
            .core
            .schedules
            .lock()
            .drain()
            .map(|(_, job)| job.handle)
            .collect();
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
                tracing::warn!("cleanup job did not stop within the shutdown timeout");
            }
        }
    }
}

impl CleanupCore {
    /// Runs one cycle for a realm; `Break` ends the realm's job.
    ///
    /// The per-realm lock serializes scheduled cycles with immediate-check
    /// cycles; the semaphore bounds how many realms run at once.
    async fn run_cycle(&self, realm_id: &str) -> ControlFlow<()> {
        let lock = self.run_lock(realm_id);
        let _guard = lock.lock().await;
        let Ok(_permit) = self.run_slots.acquire().await else {
            return ControlFlow::Break(());
        };

        match self.run_realm_cycle(realm_id).await {
            Ok(CycleOutcome::RealmGone) => {
                self.forget_realm(realm_id);
                ControlFlow::Break(())
            }
            Ok(outcome) => {
                self.advance_schedule(realm_id);
                if matches!(outcome, CycleOutcome::DryRunPendingApproval) {
                    tracing::info!(realm_id, "cleanup awaits manual approval");
                }
                ControlFlow::Continue(())
            }
            Err(err) => {
                // A failing cycle still advances the schedule so transient
                // store outages cannot turn into a retry storm.
                tracing::error!(realm_id, error = %err, "scheduled cleanup cycle failed");
                self.advance_schedule(realm_id);
                let realm_name = self.realm_name_for(realm_id);
                self.history_for(realm_id, &realm_name)
                    .add_error(CleanupExecutionError::new(err.to_string()));
                self.audit.record(
                    AuditEvent::builder(AuditEventKind::CleanupError)
                        .realm(realm_id.to_string(), realm_name)
                        .failure(err.to_string())
                        .build(),
                );
                ControlFlow::Continue(())
            }
        }
    }

    async fn run_realm_cycle(&self, realm_id: &str) -> ReconcileResult<CycleOutcome> {
        let Some(realm) = self.realms.get_realm(realm_id).await? else {
            tracing::warn!(realm_id, "realm no longer exists; cancelling its cleanup schedule");
            return Ok(CycleOutcome::RealmGone);
        };
        let Some(config) = self.config_for(realm_id) else {
            // Schedule cancelled between fire and lookup.
            return Ok(CycleOutcome::RealmGone);
        };

        tracing::info!(realm = %realm.name, "starting scheduled cleanup cycle");
        let report = self.consistency.perform_consistency_check(&realm).await;
        if report.status() == ConsistencyCheckStatus::Failed {
            return Err(ReconcileError::AnalysisFailed(
                report
                    .error_message()
                    .unwrap_or("consistency check failed")
                    .to_string(),
            ));
        }

        if !should_perform_cleanup(&report, &config) {
            tracing::debug!(realm = %realm.name, "no cleanup needed");
            return Ok(CycleOutcome::NoActionNeeded);
        }

        let cap = Some(config.max_items_per_cleanup);
        if config.dry_run_first {
            let dry_run = self
                .executor
                .cleanup_orphaned_data_bounded(&realm, true, cap)
                .await;
            if dry_run.total_items_processed() == 0 {
                return Ok(CycleOutcome::NoActionNeeded);
            }
            if !config.auto_approve_cleanup {
                tracing::info!(
                    realm = %realm.name,
                    items = dry_run.total_items_processed(),
                    "dry run found items; awaiting manual approval"
                );
                self.history_for(realm_id, &realm.name)
                    .add_dry_run_result(dry_run);
                return Ok(CycleOutcome::DryRunPendingApproval);
            }
            tracing::info!(realm = %realm.name, "auto-approving cleanup after dry run");
        }

        let result = self
            .executor
            .cleanup_orphaned_data_bounded(&realm, false, cap)
            .await;
        tracing::info!(
            realm = %realm.name,
            items = result.total_items_processed(),
            errors = result.errors.len(),
            "scheduled cleanup executed"
        );
        if config.notify_on_completion {
            tracing::info!(
                realm = %realm.name,
                items = result.total_items_processed(),
                "cleanup completion notification"
            );
        }
        self.history_for(realm_id, &realm.name)
            .add_cleanup_result(result);
        Ok(CycleOutcome::Executed)
    }

    fn run_lock(&self, realm_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.run_locks
            .entry(realm_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn config_for(&self, realm_id: &str) -> Option<CleanupConfig> {
        self.schedules
            .lock()
            .get(realm_id)
            .map(|job| job.schedule.config.clone())
    }

    fn realm_name_for(&self, realm_id: &str) -> String {
        self.schedules
            .lock()
            .get(realm_id)
            .map(|job| job.schedule.realm_name.clone())
            .unwrap_or_else(|| realm_id.to_string())
    }

    fn history_for(
        &self,
        realm_id: &str,
        realm_name: &str,
    ) -> dashmap::mapref::one::RefMut<'_, String, CleanupHistory> {
        self.history
            .entry(realm_id.to_string())
            .or_insert_with(|| CleanupHistory::new(realm_id, realm_name))
    }

    /// Advances `last_run_at`/`next_run_at` after a cycle, successful or not.
    fn advance_schedule(&self, realm_id: &str) {
        let now = Utc::now();
        let mut schedules = self.schedules.lock();
        if let Some(job) = schedules.get_mut(realm_id) {
            job.schedule.last_run_at = Some(now);
            job.schedule.next_run_at = Some(now + to_chrono(job.schedule.config.interval()));
        }
    }

    /// Removes a vanished realm's schedule from within its own job.
    fn forget_realm(&self, realm_id: &str) {
        let removed = self.schedules.lock().remove(realm_id);
        if let Some(job) = removed {
            self.audit.record(
                AuditEvent::builder(AuditEventKind::CleanupCancelled)
                    .realm(realm_id.to_string(), job.schedule.realm_name.clone())
                    .detail("reason", "realm deleted")
                    .build(),
            );
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Decides whether a report warrants a cleanup run.
///
/// Orphan counts are gated by the configured thresholds so a single
/// transient discrepancy does not trigger a disruptive repair cycle; any
/// other high or critical issue escalates regardless of count.
fn should_perform_cleanup(report: &DataConsistencyReport, config: &CleanupConfig) -> bool {
    let stats = report.statistics();
    if stats.total_issues == 0 {
        return false;
    }
    let escalation = report.issues().iter().any(|issue| {
        issue.requires_immediate_attention()
            && !matches!(
                issue.kind,
                ConsistencyIssueKind::OrphanedCredential | ConsistencyIssueKind::OrphanedTemplate
            )
    });
    stats.orphaned_credentials >= config.min_orphaned_credentials_threshold
        || stats.orphaned_templates >= config.min_orphaned_templates_threshold
        || escalation
}

#[cfg(test)]
mod tests {
    use bioid_model::ConsistencyIssue;

    use super::*;

    fn report_with(kinds: &[ConsistencyIssueKind]) -> DataConsistencyReport {
        let mut report = DataConsistencyReport::new("realm-1", "master");
        for kind in kinds {
            report.add_issue(ConsistencyIssue::new(*kind, "test"));
        }
        report.complete();
        report
    }

    #[test]
    fn defaults_match_daily_conservative_cleanup() {
        let config = CleanupConfig::default();

        assert_eq!(config.interval_hours, 24);
        assert_eq!(config.initial_delay_hours, 1);
        assert!(config.dry_run_first);
        assert!(!config.auto_approve_cleanup);
        assert_eq!(config.min_orphaned_credentials_threshold, 1);
        assert_eq!(config.max_items_per_cleanup, 100);
    }

    #[test]
    fn no_issues_means_no_cleanup() {
        let config = CleanupConfig::default();
        assert!(!should_perform_cleanup(&report_with(&[]), &config));
    }

    #[test]
    fn orphan_counts_below_threshold_do_not_trigger() {
        let config = CleanupConfig {
            min_orphaned_credentials_threshold: 3,
            min_orphaned_templates_threshold: 3,
            ..CleanupConfig::default()
        };
        let report = report_with(&[
            ConsistencyIssueKind::OrphanedCredential,
            ConsistencyIssueKind::OrphanedCredential,
        ]);

        assert!(!should_perform_cleanup(&report, &config));
    }

    #[test]
    fn orphan_counts_at_threshold_trigger() {
        let config = CleanupConfig::default();
        let report = report_with(&[ConsistencyIssueKind::OrphanedCredential]);

        assert!(should_perform_cleanup(&report, &config));
    }

    #[test]
    fn non_orphan_escalation_bypasses_thresholds() {
        let config = CleanupConfig {
            min_orphaned_credentials_threshold: 100,
            min_orphaned_templates_threshold: 100,
            ..CleanupConfig::default()
        };
        let report = report_with(&[ConsistencyIssueKind::CorruptedData]);

        assert!(should_perform_cleanup(&report, &config));
    }

    #[test]
    fn low_severity_issues_alone_do_not_trigger() {
        let config = CleanupConfig {
            min_orphaned_credentials_threshold: 2,
            min_orphaned_templates_threshold: 2,
            ..CleanupConfig::default()
        };
        let report = report_with(&[ConsistencyIssueKind::MetadataMismatch]);

        assert!(!should_perform_cleanup(&report, &config));
    }

    #[test]
    fn history_rings_evict_oldest() {
        let mut history = CleanupHistory::new("realm-1", "master");
        for i in 0..(MAX_CLEANUP_RESULTS + 5) {
            let mut result = CleanupResult::new(format!("run-{i}"), false);
            result.finish();
            history.add_cleanup_result(result);
        }

        let results = history.cleanup_results();
        assert_eq!(results.len(), MAX_CLEANUP_RESULTS);
        assert_eq!(results[0].realm_id, "run-5");

        for _ in 0..(MAX_EXECUTION_ERRORS + 3) {
            history.add_error(CleanupExecutionError::new("boom"));
        }
        assert_eq!(history.errors().len(), MAX_EXECUTION_ERRORS);
    }

    #[test]
    fn config_serde_round_trip() {
        let config = CleanupConfig {
            interval_hours: 6,
            auto_approve_cleanup: true,
            ..CleanupConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: CleanupConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.interval_hours, 6);
        assert!(parsed.auto_approve_cleanup);
        assert!(parsed.dry_run_first);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: CleanupConfig = serde_json::from_str(r#"{"interval_hours":12}"#).unwrap();

        assert_eq!(parsed.interval_hours, 12);
        assert!(parsed.dry_run_first);
        assert!(!parsed.auto_approve_cleanup);
    }

    #[test]
    fn history_reads_are_copies() {
        let mut history = CleanupHistory::new("realm-1", "master");
        let mut result = CleanupResult::new("realm-1", true);
        result.add_template_to_clean(42);
        result.finish();
        history.add_dry_run_result(result);

        let mut copy = history.dry_run_results();
        copy.clear();

        assert_eq!(history.dry_run_results().len(), 1);
    }
}
