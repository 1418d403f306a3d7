//! Realm directory trait.

use async_trait::async_trait;

use crate::error::DirectoryResult;

/// Minimal realm identity, enough for scheduling and reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealmRef {
    /// Realm identifier.
    pub id: String,
    /// Realm display name.
    pub name: String,
}

impl RealmRef {
    /// Creates a realm reference.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Provider for realm lookup.
///
/// The scheduler looks a realm up at every fire; a realm deleted since
/// scheduling returns `None`, which self-cancels the schedule.
#[async_trait]
pub trait RealmDirectory: Send + Sync {
    /// Gets a realm by id, or `None` if it no longer exists.
    async fn get_realm(&self, realm_id: &str) -> DirectoryResult<Option<RealmRef>>;

    /// Lists all realms.
    async fn list_realms(&self) -> DirectoryResult<Vec<RealmRef>>;
}
