//! Credential directory trait.

use async_trait::async_trait;
use bioid_model::FaceCredential;
use uuid::Uuid;

use crate::error::DirectoryResult;

/// Provider for the identity store's face credential records.
///
/// Reconciliation treats the identity store as read-only apart from the two
/// mutations repair execution needs: deleting an orphaned credential and
/// rewriting a credential's metadata payload.
#[async_trait]
pub trait CredentialDirectory: Send + Sync {
    /// Lists all face credentials in a realm.
    async fn list_face_credentials(&self, realm_id: &str) -> DirectoryResult<Vec<FaceCredential>>;

    /// Deletes a credential.
    ///
    /// ## Errors
    ///
    /// Returns `DirectoryError::NotFound` if the credential doesn't exist.
    async fn delete_credential(
        &self,
        realm_id: &str,
        user_id: Uuid,
        credential_id: Uuid,
    ) -> DirectoryResult<()>;

    /// Rewrites a credential's metadata payload.
    ///
    /// Used only by metadata repair to sync the stored payload to the
    /// template's authoritative values.
    ///
    /// ## Errors
    ///
    /// Returns `DirectoryError::NotFound` if the credential doesn't exist.
    async fn update_credential_data(
        &self,
        realm_id: &str,
        user_id: Uuid,
        credential_id: Uuid,
        credential_data: &str,
    ) -> DirectoryResult<()>;

    /// Checks whether a user still exists.
    ///
    /// Repair verifies this before deleting an orphaned credential so that a
    /// user removed concurrently is not treated as a failure.
    async fn user_exists(&self, realm_id: &str, user_id: Uuid) -> DirectoryResult<bool>;
}
