//! In-memory directory implementations.
//!
//! Backing store for tests and single-process deployments. The template
//! directory supports fault injection so callers can exercise the
//! retry/partial-failure paths without a real biometric service.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use bioid_model::{FaceCredential, TemplateStatus};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::credential::CredentialDirectory;
use crate::error::{DirectoryError, DirectoryResult};
use crate::realm::{RealmDirectory, RealmRef};
use crate::template::TemplateDirectory;

/// In-memory identity store view.
#[derive(Debug, Default)]
pub struct InMemoryCredentialDirectory {
    credentials: RwLock<HashMap<String, Vec<FaceCredential>>>,
    users: RwLock<HashMap<String, HashSet<Uuid>>>,
}

impl InMemoryCredentialDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a credential, registering its owning user.
    pub fn add_credential(&self, realm_id: &str, credential: FaceCredential) {
        self.users
            .write()
            .entry(realm_id.to_string())
            .or_default()
            .insert(credential.user_id);
        self.credentials
            .write()
            .entry(realm_id.to_string())
            .or_default()
            .push(credential);
    }

    /// Removes a user and all their credentials, simulating an out-of-band
    /// user deletion.
    pub fn remove_user(&self, realm_id: &str, user_id: Uuid) {
        if let Some(users) = self.users.write().get_mut(realm_id) {
            users.remove(&user_id);
        }
        if let Some(creds) = self.credentials.write().get_mut(realm_id) {
            creds.retain(|cred| cred.user_id != user_id);
        }
    }

    /// Number of credentials currently stored for a realm.
    #[must_use]
    pub fn credential_count(&self, realm_id: &str) -> usize {
        self.credentials
            .read()
            .get(realm_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl CredentialDirectory for InMemoryCredentialDirectory {
    async fn list_face_credentials(&self, realm_id: &str) -> DirectoryResult<Vec<FaceCredential>> {
        Ok(self
            .credentials
            .read()
            .get(realm_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_credential(
        &self,
        realm_id: &str,
        user_id: Uuid,
        credential_id: Uuid,
    ) -> DirectoryResult<()> {
        let mut credentials = self.credentials.write();
        let realm_creds = credentials
            .get_mut(realm_id)
            .ok_or_else(|| DirectoryError::not_found("Credential", credential_id.to_string()))?;
        let before = realm_creds.len();
        realm_creds
            .retain(|cred| !(cred.user_id == user_id && cred.credential_id == credential_id));
        if realm_creds.len() == before {
            return Err(DirectoryError::not_found(
                "Credential",
                credential_id.to_string(),
            ));
        }
        Ok(())
    }

    async fn update_credential_data(
        &self,
        realm_id: &str,
        user_id: Uuid,
        credential_id: Uuid,
        credential_data: &str,
    ) -> DirectoryResult<()> {
        let mut credentials = self.credentials.write();
        let cred = credentials
            .get_mut(realm_id)
            .and_then(|creds| {
                creds
                    .iter_mut()
                    .find(|cred| cred.user_id == user_id && cred.credential_id == credential_id)
            })
            .ok_or_else(|| DirectoryError::not_found("Credential", credential_id.to_string()))?;
        cred.credential_data = credential_data.to_string();
        Ok(())
    }

    async fn user_exists(&self, realm_id: &str, user_id: Uuid) -> DirectoryResult<bool> {
        Ok(self
            .users
            .read()
            .get(realm_id)
            .is_some_and(|users| users.contains(&user_id)))
    }
}

/// In-memory biometric service view with fault injection.
#[derive(Debug, Default)]
pub struct InMemoryTemplateDirectory {
    templates: RwLock<BTreeMap<i64, TemplateStatus>>,
    unavailable: RwLock<bool>,
    failing_deletes: RwLock<HashSet<i64>>,
}

impl InMemoryTemplateDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enrolls a template.
    pub fn add_template(&self, template: TemplateStatus) {
        self.templates.write().insert(template.class_id, template);
    }

    /// Toggles whole-service unavailability; while set, every call fails
    /// with `ServiceUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write() = unavailable;
    }

    /// Makes deletion of one class id fail with `ServiceUnavailable`.
    pub fn fail_delete(&self, class_id: i64) {
        self.failing_deletes.write().insert(class_id);
    }

    /// Number of templates currently enrolled.
    #[must_use]
    pub fn template_count(&self) -> usize {
        self.templates.read().len()
    }

    fn check_available(&self) -> DirectoryResult<()> {
        if *self.unavailable.read() {
            return Err(DirectoryError::ServiceUnavailable(
                "biometric service unreachable".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TemplateDirectory for InMemoryTemplateDirectory {
    async fn get_status(&self, class_id: i64) -> DirectoryResult<TemplateStatus> {
        self.check_available()?;
        self.templates
            .read()
            .get(&class_id)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found("Template", class_id.to_string()))
    }

    async fn list_templates(&self) -> DirectoryResult<Vec<TemplateStatus>> {
        self.check_available()?;
        Ok(self.templates.read().values().cloned().collect())
    }

    async fn delete_template(&self, class_id: i64) -> DirectoryResult<()> {
        self.check_available()?;
        if self.failing_deletes.read().contains(&class_id) {
            return Err(DirectoryError::ServiceUnavailable(format!(
                "delete of template {class_id} timed out"
            )));
        }
        self.templates
            .write()
            .remove(&class_id)
            .map(|_| ())
            .ok_or_else(|| DirectoryError::not_found("Template", class_id.to_string()))
    }

    async fn set_template_tags(&self, class_id: i64, tags: &[String]) -> DirectoryResult<()> {
        self.check_available()?;
        let mut templates = self.templates.write();
        let template = templates
            .get_mut(&class_id)
            .ok_or_else(|| DirectoryError::not_found("Template", class_id.to_string()))?;
        template.tags = tags.to_vec();
        Ok(())
    }
}

/// In-memory realm directory.
#[derive(Debug, Default)]
pub struct InMemoryRealmDirectory {
    realms: RwLock<Vec<RealmRef>>,
}

impl InMemoryRealmDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a realm.
    pub fn add_realm(&self, realm: RealmRef) {
        self.realms.write().push(realm);
    }

    /// Removes a realm, simulating realm deletion.
    pub fn remove_realm(&self, realm_id: &str) {
        self.realms.write().retain(|realm| realm.id != realm_id);
    }
}

#[async_trait]
impl RealmDirectory for InMemoryRealmDirectory {
    async fn get_realm(&self, realm_id: &str) -> DirectoryResult<Option<RealmRef>> {
        Ok(self
            .realms
            .read()
            .iter()
            .find(|realm| realm.id == realm_id)
            .cloned())
    }

    async fn list_realms(&self) -> DirectoryResult<Vec<RealmRef>> {
        Ok(self.realms.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(class_id: i64) -> FaceCredential {
        FaceCredential::new(
            Uuid::now_v7(),
            "alice",
            Uuid::now_v7(),
            format!(r#"{{"classId":{class_id},"encoderVersion":1}}"#),
        )
    }

    #[tokio::test]
    async fn credential_crud_round_trip() {
        let dir = InMemoryCredentialDirectory::new();
        let cred = credential(42);
        let (user_id, cred_id) = (cred.user_id, cred.credential_id);
        dir.add_credential("realm-1", cred);

        assert!(dir.user_exists("realm-1", user_id).await.unwrap());
        assert_eq!(dir.list_face_credentials("realm-1").await.unwrap().len(), 1);

        dir.delete_credential("realm-1", user_id, cred_id)
            .await
            .unwrap();
        assert!(dir.list_face_credentials("realm-1").await.unwrap().is_empty());

        let err = dir
            .delete_credential("realm-1", user_id, cred_id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn unknown_realm_lists_empty() {
        let dir = InMemoryCredentialDirectory::new();
        assert!(dir.list_face_credentials("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn template_unavailability_fails_all_calls() {
        let dir = InMemoryTemplateDirectory::new();
        dir.add_template(TemplateStatus::new(42, 1));
        dir.set_unavailable(true);

        assert!(dir.get_status(42).await.unwrap_err().is_retryable());
        assert!(dir.list_templates().await.unwrap_err().is_retryable());

        dir.set_unavailable(false);
        assert_eq!(dir.get_status(42).await.unwrap().class_id, 42);
    }

    #[tokio::test]
    async fn failing_delete_is_injectable_per_class() {
        let dir = InMemoryTemplateDirectory::new();
        dir.add_template(TemplateStatus::new(1, 1));
        dir.add_template(TemplateStatus::new(2, 1));
        dir.fail_delete(2);

        dir.delete_template(1).await.unwrap();
        let err = dir.delete_template(2).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(dir.template_count(), 1);
    }

    #[tokio::test]
    async fn realm_removal_is_observable() {
        let dir = InMemoryRealmDirectory::new();
        dir.add_realm(RealmRef::new("realm-1", "master"));

        assert!(dir.get_realm("realm-1").await.unwrap().is_some());
        dir.remove_realm("realm-1");
        assert!(dir.get_realm("realm-1").await.unwrap().is_none());
    }
}
