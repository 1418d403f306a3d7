//! # bioid-reconcile
//!
//! Data-consistency reconciliation between the identity store's face
//! credentials and the external biometric service's templates.
//!
//! The two stores are independently mutable and drift apart after partial
//! failures, crashes mid-operation, or out-of-band deletions. This crate
//! implements the detect-classify-plan-execute cycle that restores
//! agreement:
//!
//! - [`DataConsistencyService`] - snapshots both stores and produces a
//!   severity-ranked [`bioid_model::DataConsistencyReport`]
//! - [`RepairPlanner`] - maps each issue to a proposed repair and decides
//!   whether it may run without sign-off
//! - [`RepairExecutor`] - applies approved repairs with partial-failure
//!   isolation
//! - [`AutomatedCleanupService`] - per-realm recurring job with threshold
//!   and dry-run safety gates and bounded run history
//!
//! External-service calls go through [`RetryPolicy`]; every completed run is
//! reported to an [`AuditSink`].

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod audit;
pub mod cleanup;
pub mod consistency;
pub mod error;
pub mod executor;
pub mod planner;
pub mod retry;

pub use audit::{AuditEvent, AuditEventKind, AuditOutcome, AuditSink, TracingAuditSink};
pub use cleanup::{
    AutomatedCleanupService, CleanupConfig, CleanupExecutionError, CleanupHistory,
    CleanupSchedule,
};
pub use consistency::{analyze_snapshot, DataConsistencyService, RealmSnapshot};
pub use error::{ReconcileError, ReconcileResult};
pub use executor::RepairExecutor;
pub use planner::RepairPlanner;
pub use retry::RetryPolicy;
