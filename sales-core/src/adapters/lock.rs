//! Store run lock
//!
//! One pipeline run per store at a time. The lock is an exclusive advisory
//! lock on `<store>.lock` (flock on Unix, LockFileEx on Windows), held for
//! the life of the guard and released when it is dropped.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::domain::result::{Error, Result};

/// Held lock on a store; dropping it releases the lock
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Lock file path for a store file
    pub fn path_for(db_path: &Path) -> PathBuf {
        let mut name = db_path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Take the lock without waiting. A lock already held is a state error.
    pub fn acquire(db_path: &Path) -> Result<Self> {
        let path = Self::path_for(db_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        file.try_lock_exclusive().map_err(|_| {
            Error::state(format!(
                "another run is already using the store ({} is locked)",
                path.display()
            ))
        })?;

        tracing::debug!(path = %path.display(), "acquired run lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}
