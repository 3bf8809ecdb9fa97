use std::collections::HashMap;
use std::sync::RwLock;

use sfpr_types::Digest;
use tracing::{debug, warn};

use crate::error::{IntegrityIssue, StoreError, StoreResult};
use crate::traits::ContentStore;

/// In-memory, HashMap-based content store.
///
/// Intended for tests and embedding. All blobs are held behind a `RwLock`
/// for safe concurrent access.
pub struct InMemoryContentStore {
    blobs: RwLock<HashMap<Digest, Vec<u8>>>,
}

impl InMemoryContentStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> StoreResult<u64> {
        let map = self.blobs.read().map_err(poisoned)?;
        Ok(map.values().map(|b| b.len() as u64).sum())
    }

    #[cfg(test)]
    fn overwrite_raw(&self, digest: Digest, data: Vec<u8>) {
        self.blobs.write().unwrap().insert(digest, data);
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::LockPoisoned(e.to_string())
}

impl ContentStore for InMemoryContentStore {
    fn put(&self, data: &[u8]) -> StoreResult<Digest> {
        let digest = Digest::of(data);
        let mut map = self.blobs.write().map_err(poisoned)?;
        let intact = map.get(&digest).map(|existing| existing.as_slice() == data);
        match intact {
            Some(true) => {
                debug!(digest = %digest.short_hex(), "blob already present");
            }
            Some(false) => {
                warn!(digest = %digest, "replacing corrupt blob");
                map.insert(digest, data.to_vec());
            }
            None => {
                map.insert(digest, data.to_vec());
                debug!(digest = %digest.short_hex(), size = data.len(), "stored blob");
            }
        }
        Ok(digest)
    }

    fn get(&self, digest: &Digest) -> StoreResult<Vec<u8>> {
        let map = self.blobs.read().map_err(poisoned)?;
        let data = map.get(digest).ok_or(StoreError::NotFound(*digest))?;
        let computed = Digest::of(data);
        if computed != *digest {
            return Err(StoreError::DigestMismatch {
                expected: *digest,
                computed,
            });
        }
        Ok(data.clone())
    }

    fn contains(&self, digest: &Digest) -> StoreResult<bool> {
        let map = self.blobs.read().map_err(poisoned)?;
        Ok(map.contains_key(digest))
    }

    fn list(&self) -> StoreResult<Vec<Digest>> {
        let map = self.blobs.read().map_err(poisoned)?;
        let mut digests: Vec<Digest> = map.keys().copied().collect();
        digests.sort();
        Ok(digests)
    }

    fn verify(&self) -> StoreResult<Vec<IntegrityIssue>> {
        let map = self.blobs.read().map_err(poisoned)?;
        let mut issues: Vec<IntegrityIssue> = map
            .iter()
            .filter_map(|(expected, data)| {
                let computed = Digest::of(data);
                (computed != *expected).then_some(IntegrityIssue::DigestMismatch {
                    expected: *expected,
                    computed,
                })
            })
            .collect();
        issues.sort_by_key(|issue| issue.to_string());
        Ok(issues)
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.blobs.read().map_err(poisoned)?.len())
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.blobs.read().map(|m| m.len()).unwrap_or_default();
        f.debug_struct("InMemoryContentStore")
            .field("blob_count", &count)
            .finish()
    }
}
