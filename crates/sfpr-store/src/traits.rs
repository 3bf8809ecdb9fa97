use sfpr_types::Digest;

use crate::error::{IntegrityIssue, StoreResult};

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - The identifier of a blob equals the SHA-256 digest of its bytes.
/// - Blobs are immutable once written; writing a known digest is a no-op.
/// - Concurrent reads are always safe.
/// - Reads verify the digest and return an error instead of corrupt data.
pub trait ContentStore: Send + Sync {
    /// Store `data` and return its digest.
    ///
    /// If the digest is already present nothing is written.
    fn put(&self, data: &[u8]) -> StoreResult<Digest>;

    /// Read the blob stored under `digest`.
    ///
    /// Returns [`StoreError::NotFound`](crate::StoreError::NotFound) if the
    /// digest is unknown.
    fn get(&self, digest: &Digest) -> StoreResult<Vec<u8>>;

    /// Check whether a blob exists.
    fn contains(&self, digest: &Digest) -> StoreResult<bool>;

    /// All digests currently stored, sorted.
    fn list(&self) -> StoreResult<Vec<Digest>>;

    /// Scan every entry and report integrity problems.
    fn verify(&self) -> StoreResult<Vec<IntegrityIssue>>;

    /// Number of stored blobs.
    fn len(&self) -> StoreResult<usize> {
        Ok(self.list()?.len())
    }

    /// Returns `true` if nothing is stored.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
