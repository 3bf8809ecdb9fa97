//! Flat-directory blob store.
//!
//! Each blob lives at `{root}/{digest}.bin`. There are no subdirectories and
//! no other naming is valid.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use sfpr_types::Digest;
use tracing::{debug, error, warn};

use crate::error::{IntegrityIssue, StoreError, StoreResult};
use crate::traits::ContentStore;

const TEMP_PREFIX: &str = ".incoming-";

/// File-based content store with a flat `<digest>.bin` layout.
///
/// Writes are atomic: bytes go to a temporary file in the same directory
/// which is then linked into place without clobbering. A racing writer of
/// the same digest finds the target present and treats that as success.
/// A present blob whose bytes no longer hash to its name is replaced.
#[derive(Debug)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The directory holding the blobs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the blob for `digest`.
    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.root.join(digest.blob_file_name())
    }

    fn read_verified(&self, digest: &Digest) -> StoreResult<Vec<u8>> {
        let path = self.blob_path(digest);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(*digest));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        let computed = Digest::of(&data);
        if computed != *digest {
            error!(expected = %digest, actual = %computed, "blob corruption detected on read");
            return Err(StoreError::DigestMismatch {
                expected: *digest,
                computed,
            });
        }
        Ok(data)
    }

    fn entry_names(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

impl ContentStore for FsContentStore {
    fn put(&self, data: &[u8]) -> StoreResult<Digest> {
        let digest = Digest::of(data);
        let path = self.blob_path(&digest);
        match self.read_verified(&digest) {
            Ok(_) => {
                debug!(digest = %digest.short_hex(), "blob already present");
                return Ok(digest);
            }
            Err(StoreError::NotFound(_)) => {}
            Err(StoreError::DigestMismatch { computed, .. }) => {
                warn!(digest = %digest, found = %computed, "replacing corrupt blob");
            }
            Err(e) => return Err(e),
        }

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.root)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                debug!(digest = %digest.short_hex(), size = data.len(), "stored blob");
                Ok(digest)
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                if self.read_verified(&digest).is_ok() {
                    debug!(digest = %digest.short_hex(), "blob written concurrently");
                    return Ok(digest);
                }
                // The present file is damaged: overwrite it atomically.
                e.file.persist(&path).map_err(|e| StoreError::Io(e.error))?;
                warn!(digest = %digest, "corrupt blob replaced");
                Ok(digest)
            }
            Err(e) => Err(StoreError::Io(e.error)),
        }
    }

    fn get(&self, digest: &Digest) -> StoreResult<Vec<u8>> {
        self.read_verified(digest)
    }

    fn contains(&self, digest: &Digest) -> StoreResult<bool> {
        match fs::metadata(self.blob_path(digest)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn list(&self) -> StoreResult<Vec<Digest>> {
        let mut digests = Vec::new();
        for name in self.entry_names()? {
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            match Digest::from_blob_file_name(&name) {
                Ok(digest) => digests.push(digest),
                Err(_) => warn!(%name, "ignoring entry with non-digest name"),
            }
        }
        digests.sort();
        Ok(digests)
    }

    fn verify(&self) -> StoreResult<Vec<IntegrityIssue>> {
        let mut issues = Vec::new();
        for name in self.entry_names()? {
            if name.starts_with(TEMP_PREFIX) {
                issues.push(IntegrityIssue::StrayTemp(name));
                continue;
            }
            let Ok(expected) = Digest::from_blob_file_name(&name) else {
                issues.push(IntegrityIssue::BadName(name));
                continue;
            };
            let data = fs::read(self.root.join(&name))?;
            let computed = Digest::of(&data);
            if computed != expected {
                issues.push(IntegrityIssue::DigestMismatch { expected, computed });
            }
        }
        Ok(issues)
    }
}
