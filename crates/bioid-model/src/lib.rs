//! # bioid-model
//!
//! Domain models for the biometric credential/template reconciliation
//! subsystem.
//!
//! The identity store and the external biometric service each hold one side
//! of a user's face enrollment: the identity store keeps a [`FaceCredential`]
//! record per user, the biometric service keeps a [`TemplateStatus`] record
//! per enrolled class. The two are joined by the class identifier and can
//! drift apart after partial failures; the types in this crate describe that
//! drift and the outcome of repairing it.
//!
//! ## Model Groups
//!
//! - [`FaceCredential`] / [`TemplateStatus`] - the two store views
//! - [`ConsistencyIssue`] / [`DataConsistencyReport`] - detected divergence
//! - [`RepairAction`] / [`RepairResult`] - repair planning and outcomes
//! - [`SynchronizationAction`] / [`SynchronizationResult`] - metadata sync
//! - [`CleanupResult`] - orphaned-data cleanup outcomes

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod cleanup_result;
pub mod credential;
pub mod issue;
pub mod repair;
pub mod report;
pub mod sync;
pub mod template;

pub use cleanup_result::{CleanupError, CleanupResult, CleanupStatus};
pub use credential::{FaceCredential, FaceCredentialData};
pub use issue::{ConsistencyIssue, ConsistencyIssueKind, IssueSeverity};
pub use repair::{RepairAction, RepairActionKind, RepairError, RepairResult, RepairStatus};
pub use report::{ConsistencyCheckStatus, ConsistencyStatistics, DataConsistencyReport};
pub use sync::{
    SynchronizationAction, SynchronizationActionKind, SynchronizationError,
    SynchronizationResult, SynchronizationStatus,
};
pub use template::TemplateStatus;
