use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sfpr_types::{ModuleId, ModuleRecord};

use crate::error::{PublishError, PublishResult};

/// One published version of the index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub version: u64,
    pub modules: Vec<ModuleRecord>,
}

impl IndexSnapshot {
    /// The empty index that precedes the first publish.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn get(&self, id: &ModuleId) -> Option<&ModuleRecord> {
        self.modules.iter().find(|r| r.id == *id)
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.get(id).is_some()
    }

    /// Records not superseded by any later record.
    pub fn live(&self) -> impl Iterator<Item = &ModuleRecord> {
        let superseded: HashSet<ModuleId> = self.modules.iter().filter_map(|r| r.supersedes).collect();
        self.modules
            .iter()
            .filter(move |r| !superseded.contains(&r.id))
    }

    /// The successor snapshot: existing records unchanged, `records` appended.
    pub fn successor(&self, records: Vec<ModuleRecord>) -> Self {
        let mut modules = Vec::with_capacity(self.modules.len() + records.len());
        modules.extend(self.modules.iter().cloned());
        modules.extend(records);
        Self {
            version: self.version + 1,
            modules,
        }
    }

    /// Check the index invariants: unique ids, blob URLs naming their
    /// digest, and `supersedes` pointing at a record in the index.
    pub fn validate(&self) -> PublishResult<()> {
        let mut ids = HashSet::with_capacity(self.modules.len());
        for record in &self.modules {
            if !ids.insert(record.id) {
                return Err(PublishError::InvalidIndex(format!(
                    "duplicate module id {}",
                    record.id
                )));
            }
            if !record.blob_url_matches_digest() {
                return Err(PublishError::InvalidIndex(format!(
                    "module {}: blob_url {} does not name {}",
                    record.id,
                    record.blob_url,
                    record.sha256.blob_file_name()
                )));
            }
        }
        for record in &self.modules {
            if let Some(old) = record.supersedes {
                if !ids.contains(&old) || old == record.id {
                    return Err(PublishError::InvalidIndex(format!(
                        "module {} supersedes unknown module {old}",
                        record.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Encode in the published format.
    pub fn to_json(&self) -> PublishResult<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Decode and validate a published index.
    pub fn from_json(bytes: &[u8]) -> PublishResult<Self> {
        let snapshot: Self = serde_json::from_slice(bytes)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}
