//! Advisory locks on repository lock files: exclusive for writers,
//! shared for readers.

use anyhow::{Context, Result};
use fs4::FileExt;
use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use super::RealRuntime;

/// Guard for an advisory lock. Released on drop.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    file: Option<File>,
}

impl FileLock {
    /// A guard that holds no OS lock, for runtimes that do not touch the
    /// real filesystem.
    #[cfg(test)]
    pub fn detached(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            debug!("Releasing lock {:?}", self.path);
            if let Err(e) = FileExt::unlock(&file) {
                warn!("Failed to release lock {:?}: {}", self.path, e);
            }
        }
    }
}

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn lock_exclusive_impl(&self, path: &Path) -> Result<FileLock> {
        let file = open_lock_file(path)?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock {:?}", path))?;
        debug!("Acquired exclusive lock {:?}", path);
        Ok(FileLock {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn lock_shared_impl(&self, path: &Path) -> Result<FileLock> {
        let file = open_lock_file(path)?;
        file.lock_shared()
            .with_context(|| format!("Failed to lock {:?} for reading", path))?;
        debug!("Acquired shared lock {:?}", path);
        Ok(FileLock {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create lock directory {:?}", parent))?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open lock file {:?}", path))
}
