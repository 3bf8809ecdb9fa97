use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::DeviceKey;
use crate::digest::Digest;
use crate::id::ModuleId;

/// A published registry entry.
///
/// Records are immutable once published. A correction is a new record whose
/// `supersedes` names the record it replaces; the old record stays in the
/// index untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: ModuleId,
    pub name: String,
    pub vendor: String,
    pub model: String,
    pub serial: String,
    /// Content address of the blob. The content store owns the bytes.
    pub sha256: Digest,
    pub size: u64,
    /// Location of the blob, always ending in `<sha256>.bin`.
    pub blob_url: String,
    pub submitted_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<ModuleId>,
}

impl ModuleRecord {
    /// The identity triple of this record.
    pub fn device_key(&self) -> DeviceKey {
        DeviceKey::new(self.vendor.clone(), self.model.clone(), self.serial.clone())
    }

    /// Build the blob URL for a digest under a base URL or path prefix.
    pub fn blob_url_for(base: &str, digest: &Digest) -> String {
        let base = base.trim_end_matches('/');
        if base.is_empty() {
            digest.blob_file_name()
        } else {
            format!("{base}/{}", digest.blob_file_name())
        }
    }

    /// Returns `true` if `blob_url` names exactly this record's digest.
    pub fn blob_url_matches_digest(&self) -> bool {
        let file = self.blob_url.rsplit('/').next().unwrap_or_default();
        file == self.sha256.blob_file_name()
    }
}
