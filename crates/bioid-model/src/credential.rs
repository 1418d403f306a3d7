//! Face credential domain model.
//!
//! A face credential is the identity store's record of a user's biometric
//! enrollment. No raw biometric data is held locally - the credential carries
//! only metadata plus the class identifier that links it to the template held
//! by the external biometric service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Credential type tag used in the identity store for face enrollments.
pub const FACE_CREDENTIAL_TYPE: &str = "face-recognition";

/// A user's face credential as seen by the identity store.
///
/// Read-only to the reconciliation subsystem except for deletion and the
/// narrow metadata rewrite performed by repair execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceCredential {
    /// User this credential belongs to.
    pub user_id: Uuid,
    /// Username at the time the snapshot was taken.
    pub username: String,
    /// Unique credential identifier.
    pub credential_id: Uuid,
    /// Class identifier linking to the external template.
    ///
    /// Absence means the credential never recorded its template link, which
    /// is itself an integrity problem surfaced by analysis.
    pub class_id: Option<i64>,
    /// When the credential was created.
    pub created_at: DateTime<Utc>,
    /// Whether the credential is currently usable for authentication.
    pub active: bool,
    /// Raw credential metadata payload (JSON, see [`FaceCredentialData`]).
    pub credential_data: String,
}

impl FaceCredential {
    /// Creates a credential record with the class id extracted from the
    /// given payload.
    ///
    /// The payload is kept verbatim; extraction failures leave `class_id`
    /// unset so analysis can classify the record instead of dropping it.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        username: impl Into<String>,
        credential_id: Uuid,
        credential_data: impl Into<String>,
    ) -> Self {
        let credential_data = credential_data.into();
        let class_id = FaceCredentialData::parse(&credential_data)
            .ok()
            .and_then(|data| data.usable_class_id());
        Self {
            user_id,
            username: username.into(),
            credential_id,
            class_id,
            created_at: Utc::now(),
            active: true,
            credential_data,
        }
    }

    /// Marks the credential inactive.
    #[must_use]
    pub const fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// Decodes the credential payload.
    ///
    /// ## Errors
    ///
    /// Returns a `serde_json::Error` when the payload is not a valid
    /// [`FaceCredentialData`] document.
    pub fn decode_data(&self) -> Result<FaceCredentialData, serde_json::Error> {
        FaceCredentialData::parse(&self.credential_data)
    }
}

/// Decoded face credential metadata.
///
/// This is the JSON document stored in the identity store's credential-data
/// column. It mirrors what the biometric service reported at enrollment time;
/// reconciliation compares the designated fields (`encoder_version`, `tags`)
/// against the template's current values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceCredentialData {
    /// Template identifier in the external biometric service.
    ///
    /// Zero when the payload never recorded its template link; see
    /// [`Self::usable_class_id`].
    #[serde(default)]
    pub class_id: i64,
    /// Biometric encoder version the template was created with.
    pub encoder_version: i32,
    /// Number of enrollment images submitted.
    #[serde(default)]
    pub image_count: i32,
    /// Number of feature vectors in the template.
    #[serde(default)]
    pub feature_vectors: i32,
    /// Template tags mirrored from the biometric service.
    #[serde(default)]
    pub tags: Vec<String>,
    /// When the enrollment completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrolled_at: Option<DateTime<Utc>>,
    /// When the enrollment expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl FaceCredentialData {
    /// Parses a credential-data payload.
    ///
    /// ## Errors
    ///
    /// Returns a `serde_json::Error` for malformed payloads.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Serializes the payload back to its stored JSON form.
    ///
    /// ## Errors
    ///
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Returns the class id when it is usable as a template reference.
    ///
    /// Class ids are positive in the biometric service; zero or negative
    /// values mean the link was never established.
    #[must_use]
    pub const fn usable_class_id(&self) -> Option<i64> {
        if self.class_id > 0 {
            Some(self.class_id)
        } else {
            None
        }
    }

    /// Returns the tags sorted for order-insensitive comparison.
    #[must_use]
    pub fn sorted_tags(&self) -> Vec<String> {
        let mut tags = self.tags.clone();
        tags.sort();
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(class_id: i64) -> String {
        format!(r#"{{"classId":{class_id},"encoderVersion":3,"tags":["vip"]}}"#)
    }

    #[test]
    fn credential_extracts_class_id_from_payload() {
        let cred = FaceCredential::new(Uuid::now_v7(), "alice", Uuid::now_v7(), payload(42));

        assert_eq!(cred.class_id, Some(42));
        assert!(cred.active);
    }

    #[test]
    fn malformed_payload_leaves_class_id_unset() {
        let cred = FaceCredential::new(Uuid::now_v7(), "alice", Uuid::now_v7(), "not-json");

        assert_eq!(cred.class_id, None);
        assert!(cred.decode_data().is_err());
    }

    #[test]
    fn non_positive_class_id_is_not_usable() {
        let cred = FaceCredential::new(Uuid::now_v7(), "bob", Uuid::now_v7(), payload(0));

        assert_eq!(cred.class_id, None);
    }

    #[test]
    fn payload_without_class_id_still_parses() {
        let data = FaceCredentialData::parse(r#"{"encoderVersion":2}"#).unwrap();

        assert_eq!(data.class_id, 0);
        assert_eq!(data.usable_class_id(), None);
    }

    #[test]
    fn payload_round_trips() {
        let data = FaceCredentialData::parse(&payload(7)).unwrap();
        let encoded = data.encode().unwrap();
        let reparsed = FaceCredentialData::parse(&encoded).unwrap();

        assert_eq!(data, reparsed);
        assert_eq!(reparsed.class_id, 7);
        assert_eq!(reparsed.encoder_version, 3);
    }

    #[test]
    fn sorted_tags_are_order_insensitive() {
        let data = FaceCredentialData {
            class_id: 1,
            encoder_version: 1,
            image_count: 0,
            feature_vectors: 0,
            tags: vec!["b".into(), "a".into()],
            enrolled_at: None,
            expires_at: None,
        };

        assert_eq!(data.sorted_tags(), vec!["a".to_string(), "b".to_string()]);
    }
}
