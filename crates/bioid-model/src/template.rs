//! Template status domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of an enrolled face template in the external biometric service.
///
/// Owned by the biometric service; read-only to reconciliation except for
/// deletion and tag updates during repair execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateStatus {
    /// Template class identifier.
    pub class_id: i64,
    /// Whether the template is available for matching.
    pub available: bool,
    /// When the template was enrolled.
    pub enrolled_at: Option<DateTime<Utc>>,
    /// Encoder version the template was built with.
    pub encoder_version: i32,
    /// Number of feature vectors held.
    pub feature_vectors: i32,
    /// Tags attached to the template.
    pub tags: Vec<String>,
}

impl TemplateStatus {
    /// Creates an available template status.
    #[must_use]
    pub fn new(class_id: i64, encoder_version: i32) -> Self {
        Self {
            class_id,
            available: true,
            enrolled_at: Some(Utc::now()),
            encoder_version,
            feature_vectors: 0,
            tags: Vec::new(),
        }
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Marks the template unavailable for matching.
    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
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

    #[test]
    fn new_template_is_available() {
        let template = TemplateStatus::new(42, 3);

        assert_eq!(template.class_id, 42);
        assert!(template.available);
        assert!(template.enrolled_at.is_some());
    }

    #[test]
    fn unavailable_clears_flag_only() {
        let template = TemplateStatus::new(42, 3).unavailable();

        assert!(!template.available);
        assert_eq!(template.encoder_version, 3);
    }
}
