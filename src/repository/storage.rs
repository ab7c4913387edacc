//! Persistence of the manifest and of package directories.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   .expath-pkg/
//!     packages.txt        flat manifest
//!     packages.xml        structured manifest
//!     .lock               advisory lock: exclusive for writers, shared for readers
//!     staging/<dir>/      content being prepared
//!     trash/<dir>/        directories retired by a running commit
//!   <dir>/                one directory per manifest entry
//! ```
//!
//! # Commit protocol
//!
//! 1. write `packages.xml.tmp`, then `packages.txt.tmp`
//! 2. move retired directories into `trash/`, staged directories into place
//! 3. rename `packages.xml.tmp` over `packages.xml` (the commit point)
//! 4. rename `packages.txt.tmp` over `packages.txt`
//! 5. empty `trash/`
//!
//! A leftover `packages.xml.tmp` therefore means the commit never reached
//! its commit point, while a lone `packages.txt.tmp` means it did. A failed
//! commit whose undo is incomplete keeps `packages.xml.tmp` so the next
//! transaction restores `trash/`.

use anyhow::{Context, anyhow, bail};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use super::format::{FLAT_FILE, XML_FILE, parse_flat, parse_xml, render_flat, render_xml};
use super::manifest::is_safe_dir_name;
use super::staging::{CleanupFailure, StagingArea};
use super::{Manifest, ManifestEntry};
use crate::error::{RepoError, Result};
use crate::runtime::{FileLock, Runtime};

/// Reserved metadata directory at the repository root.
pub const METADATA_DIR: &str = ".expath-pkg";

const LOCK_FILE: &str = ".lock";
const STAGING_DIR: &str = "staging";
const TRASH_DIR: &str = "trash";
const PENDING_SUFFIX: &str = ".tmp";

/// Change to package directories performed as part of a commit.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentOperation {
    /// Move a staged directory to a new, unused directory name.
    Place { staged: PathBuf, dir: String },
    /// Move a staged directory over an existing package directory.
    Replace { staged: PathBuf, dir: String },
    /// Delete an existing package directory.
    Retire { dir: String },
}

/// Content operations already applied by a commit in progress.
enum Applied {
    Retired { dir: String },
    Placed { staged: PathBuf, dir: String },
}

/// Exclusive hold on a repository, from `begin_transaction` until it is
/// committed, rolled back or dropped.
pub struct StorageTransaction<'a, R: Runtime> {
    staging: StagingArea<'a, R>,
    // Declared last so it is released after the staging area is cleaned.
    _lock: FileLock,
}

/// Binds a manifest to the files of one repository root.
pub struct Storage<'a, R: Runtime> {
    runtime: &'a R,
    root: PathBuf,
}

impl<'a, R: Runtime> Storage<'a, R> {
    pub fn new(runtime: &'a R, root: PathBuf) -> Self {
        Self { runtime, root }
    }

    pub fn runtime(&self) -> &'a R {
        self.runtime
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR)
    }

    /// Directory of an installed package.
    pub fn package_dir(&self, dir: &str) -> PathBuf {
        self.root.join(dir)
    }

    pub fn flat_path(&self) -> PathBuf {
        self.metadata_dir().join(FLAT_FILE)
    }

    pub fn xml_path(&self) -> PathBuf {
        self.metadata_dir().join(XML_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.metadata_dir().join(LOCK_FILE)
    }

    fn staging_root(&self) -> PathBuf {
        self.metadata_dir().join(STAGING_DIR)
    }

    fn trash_root(&self) -> PathBuf {
        self.metadata_dir().join(TRASH_DIR)
    }

    /// Whether `name` cannot be used for a new package directory.
    pub fn is_name_taken(&self, name: &str) -> bool {
        name == METADATA_DIR || self.runtime.exists(&self.package_dir(name))
    }

    /// Create empty manifest files if the repository has none. Idempotent.
    pub fn init(&self) -> Result<()> {
        let mut tx = self.begin_transaction()?;
        if !self.runtime.exists(&self.flat_path()) && !self.runtime.exists(&self.xml_path()) {
            self.commit(&mut tx, &Manifest::default(), &[])?;
            info!("Initialized repository at {:?}", self.root);
        }
        Ok(())
    }

    /// Read both manifest files and check that they agree.
    ///
    /// Holds a shared lock while reading, so a writer never commits in
    /// between. The result may be outdated as soon as it is returned.
    #[tracing::instrument(skip(self), fields(root = ?self.root))]
    pub fn load(&self) -> Result<Manifest> {
        if !self.runtime.is_dir(&self.metadata_dir()) {
            return Ok(Manifest::default());
        }
        let lock_path = self.lock_path();
        let _lock = self
            .runtime
            .lock_shared(&lock_path)
            .map_err(|e| RepoError::io(&lock_path, e))?;
        self.read_manifest()
    }

    /// Read the manifest on behalf of `tx`, which already holds the lock.
    pub fn load_in(&self, _tx: &StorageTransaction<'a, R>) -> Result<Manifest> {
        self.read_manifest()
    }

    fn read_manifest(&self) -> Result<Manifest> {
        let xml_path = self.xml_path();
        let flat_path = {
            let pending = pending_path(&self.flat_path());
            // A lone pending flat file belongs to a commit past its commit point.
            if !self.runtime.exists(&pending_path(&xml_path)) && self.runtime.exists(&pending) {
                debug!("Reading pending flat manifest {:?}", pending);
                pending
            } else {
                self.flat_path()
            }
        };

        match (self.runtime.exists(&flat_path), self.runtime.exists(&xml_path)) {
            (false, false) => return Ok(Manifest::default()),
            (true, false) => {
                return Err(self.corrupt(format!("{} exists but {} is missing", FLAT_FILE, XML_FILE)));
            }
            (false, true) => {
                return Err(self.corrupt(format!("{} exists but {} is missing", XML_FILE, FLAT_FILE)));
            }
            (true, true) => {}
        }

        let flat = self.read(&flat_path)?;
        let xml = self.read(&xml_path)?;
        let flat_entries = parse_flat(&flat).map_err(|reason| self.corrupt(reason))?;
        let xml_entries = parse_xml(&xml).map_err(|reason| self.corrupt(reason))?;

        if !same_entries(&flat_entries, &xml_entries) {
            return Err(self.corrupt(describe_mismatch(&flat_entries, &xml_entries)));
        }

        Manifest::from_entries(flat_entries).map_err(|reason| self.corrupt(reason))
    }

    /// Take the exclusive lock and repair any interrupted commit.
    pub fn begin_transaction(&self) -> Result<StorageTransaction<'a, R>> {
        let lock_path = self.lock_path();
        let lock = self
            .runtime
            .lock_exclusive(&lock_path)
            .map_err(|e| RepoError::io(&lock_path, e))?;

        self.recover()?;

        Ok(StorageTransaction {
            staging: StagingArea::new(self.runtime),
            _lock: lock,
        })
    }

    /// Reserve a staging location for the content of package directory
    /// `dir`. The location is removed unless the transaction commits.
    pub fn stage_dir(&self, tx: &mut StorageTransaction<'a, R>, dir: &str) -> Result<PathBuf> {
        let staging_root = self.staging_root();
        let staged = staging_root.join(dir);
        if self.runtime.exists(&staged) {
            self.runtime
                .remove_dir_all(&staged)
                .map_err(|e| RepoError::io(&staged, e))?;
        }
        self.runtime
            .create_dir_all(&staging_root)
            .map_err(|e| RepoError::io(&staging_root, e))?;
        tx.staging.add(staged.clone());
        Ok(staged)
    }

    /// Persist `manifest` and apply `operations` as one unit.
    ///
    /// On success both manifest files describe exactly `manifest`. On
    /// failure the previously committed state is left in place.
    #[tracing::instrument(skip(self, tx, manifest), fields(root = ?self.root))]
    pub fn commit(
        &self,
        tx: &mut StorageTransaction<'a, R>,
        manifest: &Manifest,
        operations: &[ContentOperation],
    ) -> Result<()> {
        self.write_manifest(manifest, operations)
            .map_err(|source| RepoError::Persist {
                root: self.root.clone(),
                source,
            })?;
        tx.staging.release_all();
        debug!("Committed {} entries to {:?}", manifest.len(), self.root);
        Ok(())
    }

    /// Abandon a transaction, removing everything it staged. Cleanup is
    /// best-effort; failures are reported, never raised.
    pub fn rollback(&self, mut tx: StorageTransaction<'a, R>) -> Vec<CleanupFailure> {
        let failures = tx.staging.cleanup();
        debug!("Rolled back transaction on {:?}", self.root);
        failures
    }

    fn write_manifest(
        &self,
        manifest: &Manifest,
        operations: &[ContentOperation],
    ) -> anyhow::Result<()> {
        let flat_pending = pending_path(&self.flat_path());
        let xml_pending = pending_path(&self.xml_path());

        // The structured file is written first: its pending copy is what
        // marks a commit as not yet done.
        let written = self
            .runtime
            .create_dir_all(&self.metadata_dir())
            .and_then(|_| self.runtime.write(&xml_pending, render_xml(manifest).as_bytes()))
            .and_then(|_| self.runtime.write(&flat_pending, render_flat(manifest).as_bytes()));
        if let Err(e) = written {
            self.discard_pending();
            return Err(e.context("Failed to write pending manifest"));
        }

        let mut applied = Vec::new();
        for operation in operations {
            if let Err(e) = self.apply(operation, &mut applied) {
                self.abort(applied);
                return Err(e);
            }
        }

        if let Err(e) = self.runtime.rename(&xml_pending, &self.xml_path()) {
            self.abort(applied);
            return Err(e.context("Failed to replace structured manifest"));
        }

        // Committed from here on.
        if let Err(e) = self.runtime.rename(&flat_pending, &self.flat_path()) {
            warn!(
                "Failed to replace {:?}, the next transaction will finish it: {:#}",
                self.flat_path(),
                e
            );
        }
        if let Err(e) = self.clear_dir(&self.trash_root()) {
            warn!("Failed to empty {:?}: {:#}", self.trash_root(), e);
        }
        Ok(())
    }

    fn apply(&self, operation: &ContentOperation, applied: &mut Vec<Applied>) -> anyhow::Result<()> {
        match operation {
            ContentOperation::Place { staged, dir } => self.place(staged, dir, applied),
            ContentOperation::Replace { staged, dir } => {
                self.retire(dir, applied)?;
                self.place(staged, dir, applied)
            }
            ContentOperation::Retire { dir } => self.retire(dir, applied),
        }
    }

    fn place(&self, staged: &Path, dir: &str, applied: &mut Vec<Applied>) -> anyhow::Result<()> {
        let live = self.package_dir(dir);
        if self.runtime.exists(&live) {
            bail!("Package directory {:?} already exists", live);
        }
        self.runtime.rename(staged, &live)?;
        applied.push(Applied::Placed {
            staged: staged.to_path_buf(),
            dir: dir.to_string(),
        });
        Ok(())
    }

    fn retire(&self, dir: &str, applied: &mut Vec<Applied>) -> anyhow::Result<()> {
        let live = self.package_dir(dir);
        if !self.runtime.exists(&live) {
            debug!("Nothing to retire at {:?}", live);
            return Ok(());
        }
        let trash = self.trash_root();
        self.runtime.create_dir_all(&trash)?;
        let retired = trash.join(dir);
        if self.runtime.exists(&retired) {
            self.runtime.remove_dir_all(&retired)?;
        }
        self.runtime.rename(&live, &retired)?;
        applied.push(Applied::Retired {
            dir: dir.to_string(),
        });
        Ok(())
    }

    /// Revert the content operations of a failed commit. The pending
    /// manifest stays behind when an undo step fails, so the next
    /// transaction recovers the directories still in `trash/`.
    fn abort(&self, applied: Vec<Applied>) {
        if self.undo(applied) {
            self.discard_pending();
        } else {
            warn!(
                "Leaving {:?} for the next transaction to recover",
                pending_path(&self.xml_path())
            );
        }
    }

    /// Returns whether every step was reverted.
    fn undo(&self, applied: Vec<Applied>) -> bool {
        let mut complete = true;
        for step in applied.into_iter().rev() {
            let result = match &step {
                Applied::Placed { staged, dir } => {
                    self.runtime.rename(&self.package_dir(dir), staged)
                }
                Applied::Retired { dir } => self
                    .runtime
                    .rename(&self.trash_root().join(dir), &self.package_dir(dir)),
            };
            if let Err(e) = result {
                warn!("Failed to undo content operation: {:#}", e);
                complete = false;
            }
        }
        complete
    }

    fn discard_pending(&self) {
        for path in [pending_path(&self.xml_path()), pending_path(&self.flat_path())] {
            if self.runtime.exists(&path)
                && let Err(e) = self.runtime.remove_file(&path)
            {
                warn!("Failed to remove {:?}: {:#}", path, e);
            }
        }
    }

    /// Bring the repository back to a committed state after a crash.
    /// Runs with the exclusive lock held.
    fn recover(&self) -> Result<()> {
        let xml_pending = pending_path(&self.xml_path());
        let flat_pending = pending_path(&self.flat_path());

        if self.runtime.exists(&xml_pending) {
            warn!("Rolling back an interrupted commit in {:?}", self.root);
            let committed = self.read_manifest()?;
            let pending_entries = self
                .runtime
                .read_to_string(&xml_pending)
                .map_err(|e| e.to_string())
                .and_then(|xml| parse_xml(&xml))
                .unwrap_or_else(|reason| {
                    warn!("Ignoring unreadable pending manifest: {}", reason);
                    Vec::new()
                });

            let restored = self
                .restore_trash()
                .map_err(|e| RepoError::io(self.trash_root(), e))?;

            for entry in pending_entries {
                if committed.contains_dir(&entry.dir)
                    || restored.contains(&entry.dir)
                    || !is_safe_dir_name(&entry.dir)
                {
                    continue;
                }
                let orphan = self.package_dir(&entry.dir);
                if self.runtime.exists(&orphan) {
                    warn!("Removing uncommitted package directory {:?}", orphan);
                    self.runtime
                        .remove_dir_all(&orphan)
                        .map_err(|e| RepoError::io(&orphan, e))?;
                }
            }
            self.discard_pending();
        } else if self.runtime.exists(&flat_pending) {
            warn!("Finishing an interrupted commit in {:?}", self.root);
            self.runtime
                .rename(&flat_pending, &self.flat_path())
                .map_err(|e| RepoError::io(&flat_pending, e))?;
        }

        for dir in [self.trash_root(), self.staging_root()] {
            self.clear_dir(&dir).map_err(|e| RepoError::io(&dir, e))?;
        }
        Ok(())
    }

    /// Move every trash entry back to its package directory name.
    fn restore_trash(&self) -> anyhow::Result<Vec<String>> {
        let trash = self.trash_root();
        if !self.runtime.is_dir(&trash) {
            return Ok(Vec::new());
        }

        let mut restored = Vec::new();
        for retired in self.runtime.read_dir(&trash)? {
            let name = retired
                .file_name()
                .and_then(|n| n.to_str())
                .map(String::from)
                .ok_or_else(|| anyhow!("Unexpected entry {:?} in trash", retired))?;
            let live = self.package_dir(&name);
            if self.runtime.exists(&live) {
                self.runtime.remove_dir_all(&live)?;
            }
            self.runtime
                .rename(&retired, &live)
                .with_context(|| format!("Failed to restore {:?}", live))?;
            warn!("Restored package directory {:?}", live);
            restored.push(name);
        }
        Ok(restored)
    }

    fn clear_dir(&self, dir: &Path) -> anyhow::Result<()> {
        if self.runtime.is_dir(dir) {
            self.runtime.remove_dir_all(dir)?;
        }
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<String> {
        self.runtime
            .read_to_string(path)
            .map_err(|e| RepoError::io(path, e))
    }

    fn corrupt(&self, reason: impl Into<String>) -> RepoError {
        RepoError::corrupt(&self.root, reason)
    }
}

fn pending_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(PENDING_SUFFIX);
    path.with_file_name(name)
}

fn same_entries(flat: &[ManifestEntry], xml: &[ManifestEntry]) -> bool {
    let mut flat = flat.to_vec();
    let mut xml = xml.to_vec();
    flat.sort();
    xml.sort();
    flat == xml
}

fn describe_mismatch(flat: &[ManifestEntry], xml: &[ManifestEntry]) -> String {
    let missing = |entries: &[ManifestEntry], other: &[ManifestEntry]| {
        entries.iter().find(|e| !other.contains(e)).cloned()
    };
    if let Some(e) = missing(flat, xml) {
        return format!(
            "{} ({} {}) is listed in {} but not in {}",
            e.dir, e.uri, e.version, FLAT_FILE, XML_FILE
        );
    }
    if let Some(e) = missing(xml, flat) {
        return format!(
            "{} ({} {}) is listed in {} but not in {}",
            e.dir, e.uri, e.version, XML_FILE, FLAT_FILE
        );
    }
    format!("{} and {} list a different number of entries", FLAT_FILE, XML_FILE)
}
