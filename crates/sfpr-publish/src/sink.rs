//! Where committed snapshots go.
//!
//! A sink makes a snapshot visible in one step: either the whole new
//! document replaces the old one, or nothing changes.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{PublishError, PublishResult};
use crate::snapshot::IndexSnapshot;

/// File name of the current index.
pub const INDEX_FILE: &str = "index.json";
/// Directory holding archived versions.
pub const HISTORY_DIR: &str = "history";

/// Storage for the published index.
pub trait IndexSink: Send + Sync {
    /// The currently visible snapshot, if anything was ever committed.
    fn load(&self) -> PublishResult<Option<IndexSnapshot>>;

    /// Atomically replace the visible snapshot.
    ///
    /// Fails with [`PublishError::StaleIndex`] unless the visible snapshot
    /// is exactly one version older than `snapshot`.
    fn commit(&self, snapshot: &IndexSnapshot) -> PublishResult<()>;

    /// An archived version, if history is kept.
    fn archived(&self, version: u64) -> PublishResult<Option<IndexSnapshot>>;

    /// Archived versions in ascending order.
    fn archived_versions(&self) -> PublishResult<Vec<u64>>;
}

fn check_successor(visible: Option<&IndexSnapshot>, snapshot: &IndexSnapshot) -> PublishResult<()> {
    let found = visible.map_or(0, |s| s.version);
    if found + 1 != snapshot.version {
        return Err(PublishError::StaleIndex {
            committing: snapshot.version,
            found,
        });
    }
    Ok(())
}

fn history_file_name(version: u64) -> String {
    format!("index-v{version}.json")
}

fn parse_history_file_name(name: &str) -> Option<u64> {
    name.strip_prefix("index-v")?.strip_suffix(".json")?.parse().ok()
}

/// Keeps encoded snapshots in memory.
#[derive(Debug, Default)]
pub struct InMemoryIndexSink {
    current: RwLock<Option<Vec<u8>>>,
    history: RwLock<BTreeMap<u64, Vec<u8>>>,
    keep_history: bool,
}

impl InMemoryIndexSink {
    pub fn new(keep_history: bool) -> Self {
        Self {
            keep_history,
            ..Self::default()
        }
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> PublishError {
    PublishError::LockPoisoned(e.to_string())
}

impl IndexSink for InMemoryIndexSink {
    fn load(&self) -> PublishResult<Option<IndexSnapshot>> {
        let current = self.current.read().map_err(poisoned)?;
        current.as_deref().map(IndexSnapshot::from_json).transpose()
    }

    fn commit(&self, snapshot: &IndexSnapshot) -> PublishResult<()> {
        let mut current = self.current.write().map_err(poisoned)?;
        let visible = current.as_deref().map(IndexSnapshot::from_json).transpose()?;
        check_successor(visible.as_ref(), snapshot)?;

        let bytes = snapshot.to_json()?;
        if self.keep_history {
            self.history
                .write()
                .map_err(poisoned)?
                .insert(snapshot.version, bytes.clone());
        }
        *current = Some(bytes);
        Ok(())
    }

    fn archived(&self, version: u64) -> PublishResult<Option<IndexSnapshot>> {
        let history = self.history.read().map_err(poisoned)?;
        history
            .get(&version)
            .map(|bytes| IndexSnapshot::from_json(bytes))
            .transpose()
    }

    fn archived_versions(&self) -> PublishResult<Vec<u64>> {
        Ok(self.history.read().map_err(poisoned)?.keys().copied().collect())
    }
}

/// Writes `index.json` (and `history/index-v<N>.json`) under a directory.
///
/// Every file is written to a temporary file in the target directory,
/// synced, and renamed over the destination, so readers see either the old
/// or the new document.
#[derive(Debug, Clone)]
pub struct FsIndexSink {
    root: PathBuf,
    keep_history: bool,
}

impl FsIndexSink {
    pub fn open(root: impl Into<PathBuf>, keep_history: bool) -> PublishResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        if keep_history {
            fs::create_dir_all(root.join(HISTORY_DIR))?;
        }
        Ok(Self { root, keep_history })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the current index document.
    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn history_path(&self, version: u64) -> PathBuf {
        self.root.join(HISTORY_DIR).join(history_file_name(version))
    }

    fn replace(dir: &Path, target: &Path, bytes: &[u8]) -> PublishResult<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".index-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(target).map_err(|e| e.error)?;
        Ok(())
    }

    fn read(path: &Path) -> PublishResult<Option<IndexSnapshot>> {
        match fs::read(path) {
            Ok(bytes) => IndexSnapshot::from_json(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl IndexSink for FsIndexSink {
    fn load(&self) -> PublishResult<Option<IndexSnapshot>> {
        Self::read(&self.index_path())
    }

    fn commit(&self, snapshot: &IndexSnapshot) -> PublishResult<()> {
        check_successor(self.load()?.as_ref(), snapshot)?;

        let bytes = snapshot.to_json()?;
        if self.keep_history {
            let dir = self.root.join(HISTORY_DIR);
            Self::replace(&dir, &self.history_path(snapshot.version), &bytes)?;
        }
        Self::replace(&self.root, &self.index_path(), &bytes)?;
        tracing::debug!(
            path = %self.index_path().display(),
            version = snapshot.version,
            bytes = bytes.len(),
            "index written"
        );
        Ok(())
    }

    fn archived(&self, version: u64) -> PublishResult<Option<IndexSnapshot>> {
        if !self.keep_history {
            return Ok(None);
        }
        Self::read(&self.history_path(version))
    }

    fn archived_versions(&self) -> PublishResult<Vec<u64>> {
        let dir = self.root.join(HISTORY_DIR);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut versions = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(version) = entry.file_name().to_str().and_then(parse_history_file_name) {
                versions.push(version);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(version: u64) -> IndexSnapshot {
        IndexSnapshot {
            version,
            modules: Vec::new(),
        }
    }

    #[test]
    fn history_file_names() {
        assert_eq!(history_file_name(7), "index-v7.json");
        assert_eq!(parse_history_file_name("index-v7.json"), Some(7));
        assert_eq!(parse_history_file_name("index.json"), None);
        assert_eq!(parse_history_file_name("index-vX.json"), None);
    }

    #[test]
    fn in_memory_commit_and_history() {
        let sink = InMemoryIndexSink::new(true);
        assert_eq!(sink.load().unwrap(), None);
        sink.commit(&snapshot(1)).unwrap();
        sink.commit(&snapshot(2)).unwrap();
        assert_eq!(sink.load().unwrap().unwrap().version, 2);
        assert_eq!(sink.archived_versions().unwrap(), vec![1, 2]);
        assert_eq!(sink.archived(1).unwrap(), Some(snapshot(1)));
    }

    #[test]
    fn fs_commit_replaces_index() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsIndexSink::open(dir.path(), true).unwrap();
        assert_eq!(sink.load().unwrap(), None);

        sink.commit(&snapshot(1)).unwrap();
        sink.commit(&snapshot(2)).unwrap();

        assert_eq!(sink.load().unwrap(), Some(snapshot(2)));
        assert_eq!(sink.archived_versions().unwrap(), vec![1, 2]);
        assert!(dir.path().join("history/index-v1.json").is_file());

        let stray: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(stray.is_empty());
    }

    #[test]
    fn fs_without_history() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsIndexSink::open(dir.path(), false).unwrap();
        sink.commit(&snapshot(1)).unwrap();
        assert!(sink.archived_versions().unwrap().is_empty());
        assert_eq!(sink.archived(1).unwrap(), None);
    }

    #[test]
    fn commit_requires_the_visible_predecessor() {
        let sink = InMemoryIndexSink::new(false);
        assert!(matches!(
            sink.commit(&snapshot(2)),
            Err(PublishError::StaleIndex { committing: 2, found: 0 })
        ));
        sink.commit(&snapshot(1)).unwrap();
        assert!(matches!(
            sink.commit(&snapshot(1)),
            Err(PublishError::StaleIndex { committing: 1, found: 1 })
        ));
    }

    #[test]
    fn fs_commit_from_a_stale_writer_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let first = FsIndexSink::open(dir.path(), true).unwrap();
        let second = FsIndexSink::open(dir.path(), true).unwrap();

        first.commit(&snapshot(1)).unwrap();
        let err = second.commit(&snapshot(1)).unwrap_err();
        assert!(matches!(err, PublishError::StaleIndex { committing: 1, found: 1 }));

        second.commit(&snapshot(2)).unwrap();
        assert_eq!(first.load().unwrap(), Some(snapshot(2)));
        assert_eq!(first.archived_versions().unwrap(), vec![1, 2]);
    }

    #[test]
    fn corrupt_index_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(INDEX_FILE), b"{\"version\": 3, \"modules\": [").unwrap();
        let sink = FsIndexSink::open(dir.path(), false).unwrap();
        assert!(matches!(sink.load(), Err(PublishError::Serialization(_))));
    }
}
