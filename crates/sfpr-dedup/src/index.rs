//! The in-memory deduplication index.
//!
//! [`DedupIndex`] keeps every live record under two keys: its content digest
//! and its device key. Superseded published records and rejected submissions
//! are not live and must be removed by the caller.

use std::collections::HashMap;

use sfpr_types::{DeviceKey, Digest, ModuleRecord};

use crate::classify::{Classification, RecordRef};
use crate::error::{DedupError, DedupResult};

#[derive(Clone, Debug)]
struct Entry {
    digest: Digest,
    key: DeviceKey,
}

/// Digest and device-key lookup over published records and staged
/// submissions.
#[derive(Default)]
pub struct DedupIndex {
    entries: HashMap<RecordRef, Entry>,
    by_digest: HashMap<Digest, Vec<RecordRef>>,
    by_key: HashMap<DeviceKey, Vec<RecordRef>>,
}

impl std::fmt::Debug for DedupIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupIndex")
            .field("entries", &self.entries.len())
            .field("digests", &self.by_digest.len())
            .field("keys", &self.by_key.len())
            .finish()
    }
}

impl DedupIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over the live records of a published snapshot.
    ///
    /// Records named in another record's `supersedes` field are skipped.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ModuleRecord>,
    {
        let records: Vec<&ModuleRecord> = records.into_iter().collect();
        let superseded: std::collections::HashSet<_> =
            records.iter().filter_map(|r| r.supersedes).collect();

        let mut index = Self::new();
        for record in records {
            if superseded.contains(&record.id) {
                continue;
            }
            let reference = RecordRef::Published(record.id);
            if let Err(err) = index.insert(reference, record.sha256, record.device_key()) {
                tracing::warn!(%reference, error = %err, "skipping record in snapshot");
            }
        }
        tracing::debug!(entries = index.len(), "dedup index built from snapshot");
        index
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, reference: &RecordRef) -> bool {
        self.entries.contains_key(reference)
    }

    /// Digest of an indexed record.
    pub fn digest_of(&self, reference: &RecordRef) -> Option<Digest> {
        self.entries.get(reference).map(|e| e.digest)
    }

    /// Classify an incoming `(digest, key)` pair against live records.
    ///
    /// An exact match under the same key wins over a conflict. When several
    /// records qualify, published records are preferred, then the lowest id.
    pub fn classify(&self, digest: &Digest, key: &DeviceKey) -> Classification {
        let Some(refs) = self.by_key.get(key) else {
            return Classification::New;
        };

        let same_digest = refs
            .iter()
            .filter(|r| self.entries.get(*r).is_some_and(|e| e.digest == *digest))
            .min();
        if let Some(existing) = same_digest {
            return Classification::ExactDuplicate(*existing);
        }

        match refs.iter().min() {
            Some(existing) => Classification::MetadataConflict(*existing),
            None => Classification::New,
        }
    }

    /// All live records sharing a device key, published first.
    pub fn records_for_key(&self, key: &DeviceKey) -> Vec<RecordRef> {
        let mut refs = self.by_key.get(key).cloned().unwrap_or_default();
        refs.sort();
        refs
    }

    /// All live records whose blob has this digest, under any key.
    pub fn records_with_digest(&self, digest: &Digest) -> Vec<RecordRef> {
        let mut refs = self.by_digest.get(digest).cloned().unwrap_or_default();
        refs.sort();
        refs
    }

    /// Device keys that currently hold more than one distinct digest.
    pub fn conflicting_keys(&self) -> Vec<DeviceKey> {
        let mut keys: Vec<DeviceKey> = self
            .by_key
            .iter()
            .filter(|(_, refs)| {
                let mut digests = refs.iter().filter_map(|r| self.digest_of(r));
                match digests.next() {
                    Some(first) => digests.any(|d| d != first),
                    None => false,
                }
            })
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Index a record.
    ///
    /// Re-inserting the same reference with the same content is a no-op.
    pub fn insert(
        &mut self,
        reference: RecordRef,
        digest: Digest,
        key: DeviceKey,
    ) -> DedupResult<()> {
        if let Some(existing) = self.entries.get(&reference) {
            if existing.digest == digest && existing.key == key {
                return Ok(());
            }
            return Err(DedupError::Inconsistent(reference));
        }

        self.by_digest.entry(digest).or_default().push(reference);
        self.by_key.entry(key.clone()).or_default().push(reference);
        self.entries.insert(reference, Entry { digest, key });
        tracing::trace!(%reference, digest = %digest.short_hex(), "indexed");
        Ok(())
    }

    /// Drop a record from the live set.
    pub fn remove(&mut self, reference: &RecordRef) -> DedupResult<()> {
        let entry = self
            .entries
            .remove(reference)
            .ok_or(DedupError::UnknownRecord(*reference))?;

        detach(&mut self.by_digest, &entry.digest, reference);
        detach(&mut self.by_key, &entry.key, reference);
        tracing::trace!(%reference, "removed from dedup index");
        Ok(())
    }

    /// Replace a staged reference with its published module id.
    pub fn promote(&mut self, from: RecordRef, to: RecordRef) -> DedupResult<()> {
        let entry = self
            .entries
            .get(&from)
            .cloned()
            .ok_or(DedupError::UnknownRecord(from))?;
        if self.entries.contains_key(&to) {
            return Err(DedupError::Inconsistent(to));
        }
        self.remove(&from)?;
        self.insert(to, entry.digest, entry.key)
    }
}

fn detach<K>(map: &mut HashMap<K, Vec<RecordRef>>, key: &K, reference: &RecordRef)
where
    K: std::hash::Hash + Eq,
{
    if let Some(refs) = map.get_mut(key) {
        refs.retain(|r| r != reference);
        if refs.is_empty() {
            map.remove(key);
        }
    }
}
