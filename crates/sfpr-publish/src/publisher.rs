//! The single-writer publisher.

use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use sfpr_staging::{Submission, SubmissionState};
use sfpr_store::{ContentStore, StoreError};
use sfpr_types::{ModuleId, ModuleRecord, SubmissionId};

use crate::error::{PublishError, PublishResult};
use crate::sink::IndexSink;
use crate::snapshot::IndexSnapshot;

/// A submission that is now part of the published index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedEntry {
    pub submission: SubmissionId,
    pub module: ModuleId,
}

/// Result of one publish call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    /// The index version after the call.
    pub version: u64,
    /// `true` if a new version was committed.
    pub committed: bool,
    pub published: Vec<PublishedEntry>,
}

/// Merges approved submissions into the versioned index.
///
/// Commits are serialized by an internal mutex. The current snapshot sits
/// behind an `Arc` that is swapped only after the sink has accepted the
/// new version, so readers always see a complete, committed index.
pub struct Publisher {
    sink: Arc<dyn IndexSink>,
    store: Arc<dyn ContentStore>,
    blob_base_url: String,
    current: RwLock<Arc<IndexSnapshot>>,
    commit_lock: Mutex<()>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("blob_base_url", &self.blob_base_url)
            .field("version", &self.current().map(|s| s.version).ok())
            .finish_non_exhaustive()
    }
}

impl Publisher {
    /// Start from whatever the sink currently holds, or an empty version 0.
    pub fn open(
        sink: Arc<dyn IndexSink>,
        store: Arc<dyn ContentStore>,
        blob_base_url: impl Into<String>,
    ) -> PublishResult<Self> {
        let snapshot = sink.load()?.unwrap_or_else(IndexSnapshot::empty);
        tracing::info!(
            version = snapshot.version,
            modules = snapshot.len(),
            "published index loaded"
        );
        Ok(Self {
            sink,
            store,
            blob_base_url: blob_base_url.into(),
            current: RwLock::new(Arc::new(snapshot)),
            commit_lock: Mutex::new(()),
        })
    }

    /// The current published snapshot.
    pub fn current(&self) -> PublishResult<Arc<IndexSnapshot>> {
        self.current
            .read()
            .map(|s| Arc::clone(&s))
            .map_err(|e| PublishError::LockPoisoned(e.to_string()))
    }

    pub fn version(&self) -> PublishResult<u64> {
        Ok(self.current()?.version)
    }

    pub fn sink(&self) -> &dyn IndexSink {
        self.sink.as_ref()
    }

    pub fn blob_base_url(&self) -> &str {
        &self.blob_base_url
    }

    /// The record a submission becomes when published under `id`.
    pub fn record_for(&self, submission: &Submission, id: ModuleId) -> ModuleRecord {
        let meta = &submission.metadata;
        ModuleRecord {
            id,
            name: meta.name.clone(),
            vendor: meta.vendor.clone(),
            model: meta.model.clone(),
            serial: meta.serial.clone(),
            sha256: submission.digest,
            size: submission.size,
            blob_url: ModuleRecord::blob_url_for(&self.blob_base_url, &submission.digest),
            submitted_by: submission.submitted_by.clone(),
            created_at: submission.created_at,
            notes: meta.notes.clone(),
            supersedes: submission.supersedes,
        }
    }

    /// Publish a batch of approved submissions as the next index version.
    ///
    /// Submissions whose module id is already in the index are reported as
    /// published without being appended again. An empty (or fully already
    /// published) batch commits nothing. On any error the visible index and
    /// the in-memory pointer are unchanged.
    pub fn publish(&self, batch: &[Submission]) -> PublishResult<PublishReport> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|e| PublishError::LockPoisoned(e.to_string()))?;
        let base = self.current()?;

        let mut published = Vec::with_capacity(batch.len());
        let mut records = Vec::new();
        for submission in batch {
            if submission.state != SubmissionState::Approved {
                return Err(PublishError::NotApproved(submission.id));
            }
            let module = submission.module_id.unwrap_or_default();
            published.push(PublishedEntry {
                submission: submission.id,
                module,
            });
            if base.contains(&module) {
                tracing::debug!(%module, "already in the index");
                continue;
            }
            // Read back through the store so a damaged blob is caught here.
            match self.store.get(&submission.digest) {
                Ok(_) => {}
                Err(StoreError::NotFound(digest)) => return Err(PublishError::MissingBlob(digest)),
                Err(err) => return Err(err.into()),
            }
            records.push(self.record_for(submission, module));
        }

        if records.is_empty() {
            return Ok(PublishReport {
                version: base.version,
                committed: false,
                published,
            });
        }

        let next = base.successor(records);
        next.validate()?;
        self.sink.commit(&next).map_err(|err| {
            tracing::error!(version = next.version, error = %err, "index commit failed");
            PublishError::CommitFailed(err.to_string())
        })?;

        let version = next.version;
        let added = next.len() - base.len();
        *self
            .current
            .write()
            .map_err(|e| PublishError::LockPoisoned(e.to_string()))? = Arc::new(next);
        tracing::info!(version, added, "index version published");

        Ok(PublishReport {
            version,
            committed: true,
            published,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::sink::InMemoryIndexSink;
    use sfpr_dedup::Classification;
    use sfpr_store::InMemoryContentStore;
    use sfpr_types::{Digest, SubmissionMetadata};

    struct FlakySink {
        inner: InMemoryIndexSink,
        fail: AtomicBool,
    }

    impl IndexSink for FlakySink {
        fn load(&self) -> PublishResult<Option<IndexSnapshot>> {
            self.inner.load()
        }

        fn commit(&self, snapshot: &IndexSnapshot) -> PublishResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(PublishError::Io(std::io::Error::other("disk full")));
            }
            self.inner.commit(snapshot)
        }

        fn archived(&self, version: u64) -> PublishResult<Option<IndexSnapshot>> {
            self.inner.archived(version)
        }

        fn archived_versions(&self) -> PublishResult<Vec<u64>> {
            self.inner.archived_versions()
        }
    }

    fn approved(store: &dyn ContentStore, serial: &str, fill: u8) -> Submission {
        let blob = vec![fill; 256];
        let digest = store.put(&blob).unwrap();
        let meta = SubmissionMetadata::new("DAC 1m", "CISCO-OEM", "SFP-H10GB-CU1M", serial);
        let mut s = Submission::received(meta, digest, 256, "alice");
        s.transition(SubmissionState::Validated, None, None).unwrap();
        s.classify(Classification::New).unwrap();
        s.transition(SubmissionState::Approved, None, None).unwrap();
        s.module_id = Some(ModuleId::new());
        s
    }

    fn publisher(sink: Arc<dyn IndexSink>) -> (Publisher, Arc<dyn ContentStore>) {
        let store: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
        let publisher = Publisher::open(sink, store.clone(), "blobs").unwrap();
        (publisher, store)
    }

    #[test]
    fn publish_appends_and_bumps_version() {
        let (publisher, store) = publisher(Arc::new(InMemoryIndexSink::new(true)));
        assert_eq!(publisher.version().unwrap(), 0);

        let s = approved(store.as_ref(), "A", 1);
        let report = publisher.publish(std::slice::from_ref(&s)).unwrap();
        assert!(report.committed);
        assert_eq!(report.version, 1);
        assert_eq!(report.published[0].module, s.module_id.unwrap());

        let current = publisher.current().unwrap();
        let record = &current.modules[0];
        assert_eq!(record.sha256, Digest::of(&[1u8; 256]));
        assert_eq!(record.size, 256);
        assert_eq!(record.blob_url, format!("blobs/{}.bin", record.sha256));
        assert_eq!(record.created_at, s.created_at);

        let t = approved(store.as_ref(), "B", 2);
        assert_eq!(publisher.publish(&[t]).unwrap().version, 2);
        assert_eq!(publisher.current().unwrap().len(), 2);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let sink = Arc::new(InMemoryIndexSink::new(true));
        let (publisher, _) = publisher(sink.clone());
        let report = publisher.publish(&[]).unwrap();
        assert!(!report.committed);
        assert_eq!(report.version, 0);
        assert_eq!(sink.load().unwrap(), None);
    }

    #[test]
    fn failed_commit_leaves_index_intact() {
        let sink = Arc::new(FlakySink {
            inner: InMemoryIndexSink::new(false),
            fail: AtomicBool::new(false),
        });
        let (publisher, store) = publisher(sink.clone());
        publisher.publish(&[approved(store.as_ref(), "A", 1)]).unwrap();
        let before = publisher.current().unwrap();

        sink.fail.store(true, Ordering::SeqCst);
        let batch = vec![approved(store.as_ref(), "B", 2)];
        let err = publisher.publish(&batch).unwrap_err();
        assert!(matches!(err, PublishError::CommitFailed(_)));
        assert_eq!(publisher.current().unwrap(), before);
        assert_eq!(sink.load().unwrap().as_ref(), Some(before.as_ref()));

        sink.fail.store(false, Ordering::SeqCst);
        let report = publisher.publish(&batch).unwrap();
        assert_eq!(report.version, 2);
        assert_eq!(report.published[0].module, batch[0].module_id.unwrap());
    }

    #[test]
    fn retried_batch_is_not_appended_twice() {
        let (publisher, store) = publisher(Arc::new(InMemoryIndexSink::new(false)));
        let batch = vec![approved(store.as_ref(), "A", 1)];
        publisher.publish(&batch).unwrap();
        let again = publisher.publish(&batch).unwrap();
        assert!(!again.committed);
        assert_eq!(again.version, 1);
        assert_eq!(again.published.len(), 1);
        assert_eq!(publisher.current().unwrap().len(), 1);
    }

    #[test]
    fn missing_blob_aborts() {
        let (publisher, store) = publisher(Arc::new(InMemoryIndexSink::new(false)));
        let good = approved(store.as_ref(), "A", 1);
        let mut bad = approved(store.as_ref(), "B", 2);
        bad.digest = Digest::of(b"never stored");

        let err = publisher.publish(&[good, bad]).unwrap_err();
        assert!(matches!(err, PublishError::MissingBlob(_)));
        assert_eq!(publisher.version().unwrap(), 0);
    }

    #[test]
    fn corrupt_blob_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let fs_store = Arc::new(sfpr_store::FsContentStore::open(dir.path()).unwrap());
        let store: Arc<dyn ContentStore> = fs_store.clone();
        let publisher =
            Publisher::open(Arc::new(InMemoryIndexSink::new(false)), store.clone(), "blobs").unwrap();
        let s = approved(store.as_ref(), "A", 1);
        std::fs::write(fs_store.blob_path(&s.digest), b"bit rot").unwrap();

        let err = publisher.publish(std::slice::from_ref(&s)).unwrap_err();
        assert!(matches!(
            err,
            PublishError::Store(StoreError::DigestMismatch { .. })
        ));
        assert_eq!(publisher.version().unwrap(), 0);
    }

    #[test]
    fn stale_publisher_cannot_overwrite_a_newer_index() {
        let dir = tempfile::tempdir().unwrap();
        let open_sink = || -> Arc<dyn IndexSink> {
            Arc::new(crate::sink::FsIndexSink::open(dir.path(), false).unwrap())
        };
        let (first, store) = publisher(open_sink());
        let second = Publisher::open(open_sink(), store.clone(), "blobs").unwrap();

        first.publish(&[approved(store.as_ref(), "A", 1)]).unwrap();
        let err = second
            .publish(&[approved(store.as_ref(), "B", 2)])
            .unwrap_err();
        assert!(matches!(err, PublishError::CommitFailed(_)));
        assert_eq!(second.version().unwrap(), 0);

        let reopened = Publisher::open(open_sink(), store, "blobs").unwrap();
        assert_eq!(reopened.version().unwrap(), 1);
        assert_eq!(reopened.current().unwrap().modules[0].serial, "A");
    }

    #[test]
    fn only_approved_submissions_publish() {
        let (publisher, store) = publisher(Arc::new(InMemoryIndexSink::new(false)));
        let mut s = approved(store.as_ref(), "A", 1);
        s.state = SubmissionState::Classified(sfpr_staging::ClassKind::MetadataConflict);
        assert!(matches!(
            publisher.publish(&[s]),
            Err(PublishError::NotApproved(_))
        ));
    }

    #[test]
    fn reopen_resumes_from_sink() {
        let sink: Arc<dyn IndexSink> = Arc::new(InMemoryIndexSink::new(false));
        let (first, store) = publisher(sink.clone());
        first.publish(&[approved(store.as_ref(), "A", 1)]).unwrap();

        let second = Publisher::open(sink, store, "blobs").unwrap();
        assert_eq!(second.version().unwrap(), 1);
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let (publisher, store) = publisher(Arc::new(InMemoryIndexSink::new(false)));
        let held = publisher.current().unwrap();
        publisher.publish(&[approved(store.as_ref(), "A", 1)]).unwrap();
        assert_eq!(held.version, 0);
        assert!(held.is_empty());
    }
}
