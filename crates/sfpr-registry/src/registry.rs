//! The wired pipeline.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use sfpr_publish::{FsIndexSink, InMemoryIndexSink, IndexSink, IndexSnapshot, PublishReport, Publisher};
use sfpr_staging::{
    Adjudication, ConflictReport, ConflictResolver, FsJournal, InMemoryJournal, Intake,
    IntakeReceipt, IntakeRequest, Journal, StagingArea, Submission, SubmissionState,
};
use sfpr_store::{ContentStore, FsContentStore, InMemoryContentStore, IntegrityIssue};
use sfpr_types::{Digest, SubmissionId};
use sfpr_validate::Validator;

use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::lock::DataDirLock;

/// Counts for dashboards and `sfpr info`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub index_version: u64,
    pub modules: usize,
    pub live_modules: usize,
    pub staged: usize,
    pub awaiting_review: usize,
    pub approved: usize,
    pub rejected: usize,
    pub blobs: usize,
}

/// Result of a consistency check over the store and the published index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsckReport {
    pub blobs_checked: usize,
    pub records_checked: usize,
    pub store_issues: Vec<String>,
    /// Published records whose blob is not in the store.
    pub missing_blobs: Vec<Digest>,
}

impl FsckReport {
    pub fn is_clean(&self) -> bool {
        self.store_issues.is_empty() && self.missing_blobs.is_empty()
    }
}

/// A registry instance: storage backends plus the pipeline on top of them.
pub struct Registry {
    config: RegistryConfig,
    store: Arc<dyn ContentStore>,
    staging: Arc<StagingArea>,
    intake: Intake,
    resolver: ConflictResolver,
    publisher: Publisher,
    publish_lock: Mutex<()>,
    dir_lock: Option<DataDirLock>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("data_dir", &self.config.data_dir)
            .field("publisher", &self.publisher)
            .field("locked", &self.dir_lock.is_some())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Open (creating if needed) a registry under `config.data_dir`.
    ///
    /// The data directory is locked for the lifetime of the registry; a
    /// second `open` of the same directory fails with
    /// [`RegistryError::Locked`].
    pub fn open(config: RegistryConfig) -> RegistryResult<Self> {
        config.check()?;
        let dir_lock = DataDirLock::acquire(&config.data_dir)?;
        let store: Arc<dyn ContentStore> = Arc::new(FsContentStore::open(config.blobs_dir())?);
        let journal: Arc<dyn Journal> = Arc::new(FsJournal::open(config.staging_dir())?);
        let sink: Arc<dyn IndexSink> = Arc::new(FsIndexSink::open(
            config.index_dir(),
            config.publish.keep_history,
        )?);
        tracing::info!(data_dir = %config.data_dir.display(), "opening registry");
        let mut registry = Self::assemble(config, store, journal, sink)?;
        registry.dir_lock = Some(dir_lock);
        Ok(registry)
    }

    /// A registry that lives entirely in memory.
    pub fn in_memory(config: RegistryConfig) -> RegistryResult<Self> {
        config.check()?;
        let keep_history = config.publish.keep_history;
        Self::assemble(
            config,
            Arc::new(InMemoryContentStore::new()),
            Arc::new(InMemoryJournal::new()),
            Arc::new(InMemoryIndexSink::new(keep_history)),
        )
    }

    /// Build a registry from explicit backends.
    pub fn assemble(
        config: RegistryConfig,
        store: Arc<dyn ContentStore>,
        journal: Arc<dyn Journal>,
        sink: Arc<dyn IndexSink>,
    ) -> RegistryResult<Self> {
        let publisher = Publisher::open(sink, store.clone(), config.publish.blob_base_url.clone())?;
        let published = publisher.current()?;
        let staging = Arc::new(StagingArea::open(journal, &published.modules)?);
        let intake = Intake::new(
            Validator::with_default_stages(config.validation.clone()),
            store.clone(),
            staging.clone(),
            config.policy.clone(),
        );
        let resolver = ConflictResolver::new(staging.clone());

        Ok(Self {
            config,
            store,
            staging,
            intake,
            resolver,
            publisher,
            publish_lock: Mutex::new(()),
            dir_lock: None,
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }

    // ---- Intake ----

    pub fn submit(&self, request: IntakeRequest) -> RegistryResult<IntakeReceipt> {
        Ok(self.intake.submit(request)?)
    }

    pub fn submission(&self, id: &SubmissionId) -> RegistryResult<Submission> {
        Ok(self.staging.get(id)?)
    }

    pub fn submissions(&self) -> RegistryResult<Vec<Submission>> {
        Ok(self.staging.list()?)
    }

    // ---- Maintainer decisions ----

    pub fn approve(&self, id: &SubmissionId, actor: Option<&str>) -> RegistryResult<Submission> {
        Ok(self.resolver.approve(id, actor)?)
    }

    pub fn reject(
        &self,
        id: &SubmissionId,
        actor: Option<&str>,
        reason: &str,
    ) -> RegistryResult<Submission> {
        Ok(self.resolver.reject(id, actor, reason)?)
    }

    pub fn adjudicate(
        &self,
        id: &SubmissionId,
        ruling: Adjudication,
        actor: Option<&str>,
        reason: Option<&str>,
    ) -> RegistryResult<Submission> {
        Ok(self.resolver.adjudicate(id, ruling, actor, reason)?)
    }

    pub fn conflicts(&self) -> RegistryResult<Vec<ConflictReport>> {
        Ok(self.resolver.conflicts()?)
    }

    // ---- Publishing ----

    /// Publish every approved submission as one new index version.
    ///
    /// On failure the batch stays approved and the next call retries it.
    pub fn publish(&self) -> RegistryResult<PublishReport> {
        let _guard = self
            .publish_lock
            .lock()
            .map_err(|e| RegistryError::LockPoisoned(e.to_string()))?;

        let batch = self.staging.prepare_batch()?;
        let report = self.publisher.publish(&batch)?;
        let committed: Vec<_> = report
            .published
            .iter()
            .map(|entry| (entry.submission, entry.module))
            .collect();
        self.staging.mark_published(&committed)?;
        Ok(report)
    }

    /// The currently published index.
    pub fn index(&self) -> RegistryResult<Arc<IndexSnapshot>> {
        Ok(self.publisher.current()?)
    }

    /// A specific index version: the current one or an archived one.
    pub fn index_version(&self, version: u64) -> RegistryResult<Option<IndexSnapshot>> {
        let current = self.publisher.current()?;
        if current.version == version {
            return Ok(Some(current.as_ref().clone()));
        }
        Ok(self.publisher.sink().archived(version)?)
    }

    pub fn blob(&self, digest: &Digest) -> RegistryResult<Vec<u8>> {
        Ok(self.store.get(digest)?)
    }

    // ---- Maintenance ----

    pub fn stats(&self) -> RegistryResult<RegistryStats> {
        let index = self.publisher.current()?;
        let submissions = self.staging.list()?;
        let count = |pred: &dyn Fn(&SubmissionState) -> bool| {
            submissions.iter().filter(|s| pred(&s.state)).count()
        };
        Ok(RegistryStats {
            index_version: index.version,
            modules: index.len(),
            live_modules: index.live().count(),
            staged: count(&|s| s.is_live()),
            awaiting_review: count(&|s| s.awaits_review()),
            approved: count(&|s| *s == SubmissionState::Approved),
            rejected: count(&|s| *s == SubmissionState::Rejected),
            blobs: self.store.len()?,
        })
    }

    /// Verify every stored blob and check that every published record's
    /// blob is present.
    pub fn fsck(&self) -> RegistryResult<FsckReport> {
        let issues: Vec<IntegrityIssue> = self.store.verify()?;
        for issue in &issues {
            tracing::error!(%issue, "content store integrity violation");
        }

        let index = self.publisher.current()?;
        let mut missing = Vec::new();
        for record in &index.modules {
            if !self.store.contains(&record.sha256)? {
                tracing::error!(module = %record.id, digest = %record.sha256, "published blob missing");
                missing.push(record.sha256);
            }
        }
        missing.sort();
        missing.dedup();

        Ok(FsckReport {
            blobs_checked: self.store.len()?,
            records_checked: index.len(),
            store_issues: issues.iter().map(ToString::to_string).collect(),
            missing_blobs: missing,
        })
    }
}
