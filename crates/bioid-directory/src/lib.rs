//! # bioid-directory
//!
//! Directory provider traits for the reconciliation subsystem.
//!
//! Reconciliation sees the outside world through three narrow contracts:
//!
//! - [`CredentialDirectory`] - per-user face credentials in the identity
//!   store
//! - [`TemplateDirectory`] - enrolled templates in the external biometric
//!   service
//! - [`RealmDirectory`] - realm lookup and enumeration
//!
//! Implementations must be thread-safe and support concurrent access. The
//! [`memory`] module provides in-process implementations used by tests and
//! small deployments.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod credential;
pub mod error;
pub mod memory;
pub mod realm;
pub mod template;

pub use credential::CredentialDirectory;
pub use error::{DirectoryError, DirectoryResult};
pub use realm::{RealmDirectory, RealmRef};
pub use template::TemplateDirectory;
