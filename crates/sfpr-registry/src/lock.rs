//! Exclusive ownership of a data directory.
//!
//! Only one [`Registry`](crate::Registry) may write a data directory at a
//! time. The staging area and the publisher cache state in memory, so a
//! second writer would publish from a stale index.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{RegistryError, RegistryResult};

/// Lock file created at the top of the data directory.
pub const LOCK_FILE: &str = ".lock";

/// An advisory lock held for as long as this value lives.
#[derive(Debug)]
pub struct DataDirLock {
    file: File,
    path: PathBuf,
}

impl DataDirLock {
    /// Take the lock without waiting.
    ///
    /// Fails with [`RegistryError::Locked`] if another registry holds it.
    pub fn acquire(data_dir: &Path) -> RegistryResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        if let Err(err) = file.try_lock_exclusive() {
            let contended = err.kind() == std::io::ErrorKind::WouldBlock
                || err.raw_os_error() == fs2::lock_contended_error().raw_os_error();
            return Err(if contended {
                RegistryError::Locked(data_dir.to_path_buf())
            } else {
                RegistryError::Io(err)
            });
        }
        tracing::debug!(path = %path.display(), "data directory locked");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %err, "cannot release data directory lock");
        }
    }
}
