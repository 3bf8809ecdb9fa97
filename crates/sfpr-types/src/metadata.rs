use serde::{Deserialize, Serialize};

use crate::device::DeviceKey;

/// Submitter-provided metadata that has passed the schema check.
///
/// `sha256` is the digest the submitter claims for the blob; it is compared
/// against the recomputed digest and never trusted on its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionMetadata {
    pub name: String,
    pub vendor: String,
    pub model: String,
    pub serial: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
}

impl SubmissionMetadata {
    /// Metadata with the four required fields and nothing else.
    pub fn new(
        name: impl Into<String>,
        vendor: impl Into<String>,
        model: impl Into<String>,
        serial: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            vendor: vendor.into(),
            model: model.into(),
            serial: serial.into(),
            notes: None,
            sha256: None,
            submitted_by: None,
        }
    }

    /// The identity triple used for deduplication and conflict detection.
    pub fn device_key(&self) -> DeviceKey {
        DeviceKey::new(self.vendor.clone(), self.model.clone(), self.serial.clone())
    }
}
