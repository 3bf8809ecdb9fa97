//! Persistence for staged submissions.
//!
//! The [`FsJournal`] keeps one JSON file per submission under its root
//! directory, written to a temporary file and renamed into place, plus a
//! single counters file for confirmations of published records.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use sfpr_types::{ModuleId, SubmissionId};

use crate::error::{StagingError, StagingResult};
use crate::submission::Submission;

/// Storage for staged submissions.
pub trait Journal: Send + Sync {
    /// Create or replace the entry for a submission.
    fn save(&self, submission: &Submission) -> StagingResult<()>;

    /// Forget a submission. Removing an unknown id is not an error.
    fn remove(&self, id: &SubmissionId) -> StagingResult<()>;

    /// Every stored submission, in id order.
    fn load(&self) -> StagingResult<Vec<Submission>>;

    /// Replace the confirmation counters of published records.
    fn save_confirmations(&self, counts: &BTreeMap<ModuleId, u64>) -> StagingResult<()>;

    fn load_confirmations(&self) -> StagingResult<BTreeMap<ModuleId, u64>>;
}

/// A journal that forgets everything on drop.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    submissions: RwLock<HashMap<SubmissionId, Submission>>,
    confirmations: RwLock<BTreeMap<ModuleId, u64>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StagingError {
    StagingError::LockPoisoned(e.to_string())
}

impl Journal for InMemoryJournal {
    fn save(&self, submission: &Submission) -> StagingResult<()> {
        self.submissions
            .write()
            .map_err(poisoned)?
            .insert(submission.id, submission.clone());
        Ok(())
    }

    fn remove(&self, id: &SubmissionId) -> StagingResult<()> {
        self.submissions.write().map_err(poisoned)?.remove(id);
        Ok(())
    }

    fn load(&self) -> StagingResult<Vec<Submission>> {
        let mut all: Vec<Submission> = self
            .submissions
            .read()
            .map_err(poisoned)?
            .values()
            .cloned()
            .collect();
        all.sort_by_key(|s| s.id);
        Ok(all)
    }

    fn save_confirmations(&self, counts: &BTreeMap<ModuleId, u64>) -> StagingResult<()> {
        *self.confirmations.write().map_err(poisoned)? = counts.clone();
        Ok(())
    }

    fn load_confirmations(&self) -> StagingResult<BTreeMap<ModuleId, u64>> {
        Ok(self.confirmations.read().map_err(poisoned)?.clone())
    }
}

const CONFIRMATIONS_FILE: &str = "_confirmations.json";

/// A directory of `<submission-id>.json` files.
#[derive(Debug, Clone)]
pub struct FsJournal {
    root: PathBuf,
}

impl FsJournal {
    /// Open (creating if needed) a journal directory.
    pub fn open(root: impl Into<PathBuf>) -> StagingResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, id: &SubmissionId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> StagingResult<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".journal-")
            .tempfile_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl Journal for FsJournal {
    fn save(&self, submission: &Submission) -> StagingResult<()> {
        let bytes = serde_json::to_vec_pretty(submission)?;
        self.write_atomic(&self.entry_path(&submission.id), &bytes)
    }

    fn remove(&self, id: &SubmissionId) -> StagingResult<()> {
        match fs::remove_file(self.entry_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self) -> StagingResult<Vec<Submission>> {
        let mut all = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let Some(stem) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
            else {
                continue;
            };
            if stem.parse::<SubmissionId>().is_err() {
                continue;
            }
            let submission: Submission = serde_json::from_slice(&fs::read(&path)?)?;
            all.push(submission);
        }
        all.sort_by_key(|s| s.id);
        tracing::debug!(root = %self.root.display(), entries = all.len(), "journal loaded");
        Ok(all)
    }

    fn save_confirmations(&self, counts: &BTreeMap<ModuleId, u64>) -> StagingResult<()> {
        let bytes = serde_json::to_vec_pretty(counts)?;
        self.write_atomic(&self.root.join(CONFIRMATIONS_FILE), &bytes)
    }

    fn load_confirmations(&self) -> StagingResult<BTreeMap<ModuleId, u64>> {
        match fs::read(self.root.join(CONFIRMATIONS_FILE)) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfpr_types::{Digest, SubmissionMetadata};

    fn sample(serial: &str) -> Submission {
        let meta = SubmissionMetadata::new("1G LX", "FINISAR", "FTLF1318P3BTL", serial);
        Submission::received(meta, Digest::of(serial.as_bytes()), 256, "carol")
    }

    fn exercise(journal: &dyn Journal) {
        let a = sample("A1");
        let mut b = sample("B2");
        journal.save(&a).unwrap();
        journal.save(&b).unwrap();

        b.confirmations = 3;
        journal.save(&b).unwrap();

        let loaded = journal.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.iter().find(|s| s.id == b.id).unwrap().confirmations, 3);

        journal.remove(&a.id).unwrap();
        journal.remove(&a.id).unwrap();
        assert_eq!(journal.load().unwrap(), vec![b]);

        let mut counts = BTreeMap::new();
        counts.insert(ModuleId::new(), 2);
        journal.save_confirmations(&counts).unwrap();
        assert_eq!(journal.load_confirmations().unwrap(), counts);
    }

    #[test]
    fn in_memory_journal() {
        exercise(&InMemoryJournal::new());
    }

    #[test]
    fn fs_journal() {
        let dir = tempfile::tempdir().unwrap();
        let journal = FsJournal::open(dir.path().join("staging")).unwrap();
        assert!(journal.load_confirmations().unwrap().is_empty());
        exercise(&journal);
    }

    #[test]
    fn fs_journal_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let s = sample("Z9");
        FsJournal::open(dir.path()).unwrap().save(&s).unwrap();

        let reopened = FsJournal::open(dir.path()).unwrap();
        assert_eq!(reopened.load().unwrap(), vec![s]);
    }

    #[test]
    fn fs_journal_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.json"), b"{}").unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        let journal = FsJournal::open(dir.path()).unwrap();
        assert!(journal.load().unwrap().is_empty());
    }
}
