//! The staging area: every live submission plus the deduplication index.
//!
//! One `RwLock` guards the submissions and the dedup index together, so a
//! classification and the insert that follows it are a single step with
//! respect to other intake calls. Reads (listing, lookups) take the shared
//! lock and never wait on each other.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sfpr_dedup::{Classification, DedupError, DedupIndex, RecordRef};
use sfpr_types::{DeviceKey, Digest, ModuleId, ModuleRecord, SubmissionId};

use crate::error::{StagingError, StagingResult};
use crate::journal::{InMemoryJournal, Journal};
use crate::state::SubmissionState;
use crate::submission::Submission;

pub(crate) struct Inner {
    pub(crate) submissions: BTreeMap<SubmissionId, Submission>,
    pub(crate) dedup: DedupIndex,
    pub(crate) confirmations: BTreeMap<ModuleId, u64>,
}

impl Inner {
    pub(crate) fn submission_mut(&mut self, id: &SubmissionId) -> StagingResult<&mut Submission> {
        self.submissions
            .get_mut(id)
            .ok_or(StagingError::NotFound(*id))
    }

    /// Add a classified submission to the live set and persist it.
    pub(crate) fn stage(&mut self, submission: Submission, journal: &dyn Journal) -> StagingResult<()> {
        let reference = submission.reference();
        self.dedup
            .insert(reference, submission.digest, submission.device_key())?;
        if let Err(err) = journal.save(&submission) {
            self.dedup.remove(&reference)?;
            return Err(err);
        }
        self.submissions.insert(submission.id, submission);
        Ok(())
    }

    /// Persist a submission after an in-place change.
    pub(crate) fn persist(&self, id: &SubmissionId, journal: &dyn Journal) -> StagingResult<()> {
        let submission = self.submissions.get(id).ok_or(StagingError::NotFound(*id))?;
        journal.save(submission)
    }

    /// Move a live submission to `Rejected` and drop it from deduplication.
    pub(crate) fn reject(
        &mut self,
        id: &SubmissionId,
        actor: Option<&str>,
        reason: &str,
        journal: &dyn Journal,
    ) -> StagingResult<()> {
        let submission = self.submission_mut(id)?;
        let before = submission.clone();
        submission.transition(SubmissionState::Rejected, actor, Some(reason))?;
        if let Err(err) = self.persist(id, journal) {
            self.submissions.insert(*id, before);
            return Err(err);
        }
        match self.dedup.remove(&RecordRef::Staged(*id)) {
            Ok(()) | Err(DedupError::UnknownRecord(_)) => {}
            Err(err) => return Err(err.into()),
        }
        tracing::info!(submission = %id, reason, "submission rejected");
        Ok(())
    }

    /// Count one more byte-identical submission against `reference`.
    pub(crate) fn confirm(&mut self, reference: RecordRef, journal: &dyn Journal) -> StagingResult<u64> {
        match reference {
            RecordRef::Staged(id) => {
                let submission = self.submission_mut(&id)?;
                submission.confirmations += 1;
                let count = submission.confirmations;
                self.persist(&id, journal)?;
                Ok(count)
            }
            RecordRef::Published(id) => {
                let count = {
                    let entry = self.confirmations.entry(id).or_insert(0);
                    *entry += 1;
                    *entry
                };
                journal.save_confirmations(&self.confirmations)?;
                Ok(count)
            }
        }
    }

    /// Take a published record out of the live set once a staged
    /// submission has been approved to replace it.
    pub(crate) fn retire_superseded(&mut self, old: ModuleId) -> StagingResult<()> {
        match self.dedup.remove(&RecordRef::Published(old)) {
            Ok(()) | Err(DedupError::UnknownRecord(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub(crate) fn confirmations(&self, reference: &RecordRef) -> u64 {
        match reference {
            RecordRef::Staged(id) => self.submissions.get(id).map_or(0, |s| s.confirmations),
            RecordRef::Published(id) => self.confirmations.get(id).copied().unwrap_or(0),
        }
    }
}

/// Staged submissions and the deduplication index they share with the
/// published records.
pub struct StagingArea {
    inner: RwLock<Inner>,
    journal: Arc<dyn Journal>,
}

impl std::fmt::Debug for StagingArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("StagingArea");
        if let Ok(inner) = self.inner.read() {
            s.field("submissions", &inner.submissions.len())
                .field("dedup", &inner.dedup);
        }
        s.finish_non_exhaustive()
    }
}

impl StagingArea {
    /// Rebuild the staging area from a journal and the published records.
    ///
    /// Approved submissions whose module id already appears in `published`
    /// were committed before the process stopped; they are retired here.
    pub fn open(journal: Arc<dyn Journal>, published: &[ModuleRecord]) -> StagingResult<Self> {
        let mut dedup = DedupIndex::from_records(published);
        let published_ids: HashSet<ModuleId> = published.iter().map(|r| r.id).collect();
        let mut confirmations = journal.load_confirmations()?;
        let mut submissions = BTreeMap::new();
        let mut retired = 0usize;

        for submission in journal.load()? {
            let committed = submission
                .module_id
                .is_some_and(|id| published_ids.contains(&id));
            if submission.state == SubmissionState::Published || committed {
                if let Some(id) = submission.module_id {
                    if submission.confirmations > 0 {
                        *confirmations.entry(id).or_insert(0) += submission.confirmations;
                    }
                }
                journal.remove(&submission.id)?;
                retired += 1;
                continue;
            }
            if submission.state.is_live() {
                dedup.insert(
                    submission.reference(),
                    submission.digest,
                    submission.device_key(),
                )?;
            }
            submissions.insert(submission.id, submission);
        }

        let mut inner = Inner {
            submissions,
            dedup,
            confirmations,
        };
        let superseded: Vec<ModuleId> = inner
            .submissions
            .values()
            .filter(|s| s.state == SubmissionState::Approved)
            .filter_map(|s| s.supersedes)
            .collect();
        for old in superseded {
            inner.retire_superseded(old)?;
        }

        if retired > 0 {
            journal.save_confirmations(&inner.confirmations)?;
            tracing::info!(retired, "retired submissions committed before restart");
        }
        tracing::debug!(
            staged = inner.submissions.len(),
            live = inner.dedup.len(),
            "staging area opened"
        );

        Ok(Self {
            inner: RwLock::new(inner),
            journal,
        })
    }

    /// An empty staging area backed by an in-memory journal.
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(Inner {
                submissions: BTreeMap::new(),
                dedup: DedupIndex::new(),
                confirmations: BTreeMap::new(),
            }),
            journal: Arc::new(InMemoryJournal::new()),
        }
    }

    pub(crate) fn read(&self) -> StagingResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| StagingError::LockPoisoned(e.to_string()))
    }

    pub(crate) fn write(&self) -> StagingResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| StagingError::LockPoisoned(e.to_string()))
    }

    pub(crate) fn journal(&self) -> &dyn Journal {
        self.journal.as_ref()
    }

    /// Look up a staged submission.
    pub fn get(&self, id: &SubmissionId) -> StagingResult<Submission> {
        self.read()?
            .submissions
            .get(id)
            .cloned()
            .ok_or(StagingError::NotFound(*id))
    }

    /// All staged submissions, oldest first. Rejected ones are included.
    pub fn list(&self) -> StagingResult<Vec<Submission>> {
        let mut all: Vec<Submission> = self.read()?.submissions.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    /// Submissions waiting for the next publish, oldest first.
    pub fn approved(&self) -> StagingResult<Vec<Submission>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|s| s.state == SubmissionState::Approved)
            .collect())
    }

    /// Number of submissions that still take part in deduplication.
    pub fn live_count(&self) -> StagingResult<usize> {
        Ok(self
            .read()?
            .submissions
            .values()
            .filter(|s| s.state.is_live())
            .count())
    }

    /// Classify without staging anything.
    pub fn classify(&self, digest: &Digest, key: &DeviceKey) -> StagingResult<Classification> {
        Ok(self.read()?.dedup.classify(digest, key))
    }

    /// Informational re-submission count for a published or staged record.
    pub fn confirmations(&self, reference: &RecordRef) -> StagingResult<u64> {
        Ok(self.read()?.confirmations(reference))
    }

    /// Take the approved batch for publishing.
    ///
    /// Module ids are assigned here the first time a submission is batched
    /// and persisted, so a retried publish reuses them.
    pub fn prepare_batch(&self) -> StagingResult<Vec<Submission>> {
        let mut inner = self.write()?;
        let pending: Vec<SubmissionId> = inner
            .submissions
            .values()
            .filter(|s| s.state == SubmissionState::Approved && s.module_id.is_none())
            .map(|s| s.id)
            .collect();

        for id in pending {
            inner.submission_mut(&id)?.module_id = Some(ModuleId::new());
            if let Err(err) = inner.persist(&id, self.journal()) {
                inner.submission_mut(&id)?.module_id = None;
                return Err(err);
            }
        }

        let mut batch: Vec<Submission> = inner
            .submissions
            .values()
            .filter(|s| s.state == SubmissionState::Approved)
            .cloned()
            .collect();
        batch.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(batch)
    }

    /// Retire submissions whose records were committed.
    ///
    /// The in-memory state is updated first. Journal failures after that
    /// are logged; the next [`open`](Self::open) retires the leftovers.
    pub fn mark_published(&self, committed: &[(SubmissionId, ModuleId)]) -> StagingResult<()> {
        let mut inner = self.write()?;
        let mut retired = Vec::with_capacity(committed.len());

        for (submission_id, module_id) in committed {
            let submission = inner.submission_mut(submission_id)?;
            submission.transition(SubmissionState::Published, None, None)?;
            let supersedes = submission.supersedes;
            let confirmations = submission.confirmations;

            inner.dedup.promote(
                RecordRef::Staged(*submission_id),
                RecordRef::Published(*module_id),
            )?;
            if let Some(old) = supersedes {
                inner.retire_superseded(old)?;
            }
            if confirmations > 0 {
                *inner.confirmations.entry(*module_id).or_insert(0) += confirmations;
            }
            inner.submissions.remove(submission_id);
            retired.push(*submission_id);
        }

        for id in &retired {
            if let Err(err) = self.journal.remove(id) {
                tracing::warn!(submission = %id, error = %err, "journal entry not removed");
            }
        }
        if let Err(err) = self.journal.save_confirmations(&inner.confirmations) {
            tracing::warn!(error = %err, "confirmation counters not saved");
        }
        tracing::debug!(count = retired.len(), "submissions retired after publish");
        Ok(())
    }
}
