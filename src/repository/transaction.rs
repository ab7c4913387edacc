//! Installation of one package version as a single transaction.

use anyhow::anyhow;
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::manifest::is_safe_dir_name;
use super::storage::{ContentOperation, Storage, StorageTransaction};
use super::{Manifest, ManifestEntry};
use crate::error::{RepoError, Result};
use crate::interaction::UserInteraction;
use crate::package::PackageSource;
use crate::runtime::Runtime;

/// Progress of an [`InstallTransaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Started,
    Validated,
    Resolved,
    Staged,
    Committed,
    RolledBack,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallState::Started => "started",
            InstallState::Validated => "validated",
            InstallState::Resolved => "resolved",
            InstallState::Staged => "staged",
            InstallState::Committed => "committed",
            InstallState::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

/// Shared flag used to abandon an install before its commit.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Reinstall an already installed version without asking.
    pub force: bool,
    pub cancel: CancelToken,
}

/// Result of an install that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallOutcome {
    Installed {
        entry: ManifestEntry,
        manifest: Manifest,
        /// An entry with the same URI and version was replaced.
        replaced: bool,
    },
    /// The user refused to reinstall an existing version.
    Declined,
    /// The cancel token fired before the commit.
    Cancelled,
}

impl InstallOutcome {
    /// Whether the repository was left untouched.
    pub fn is_noop(&self) -> bool {
        !matches!(self, InstallOutcome::Installed { .. })
    }
}

/// Drives one package source through validation, dependency resolution,
/// staging and commit.
pub struct InstallTransaction<'s, 'a, R: Runtime> {
    storage: &'s Storage<'a, R>,
    interaction: &'s dyn UserInteraction,
    options: InstallOptions,
    state: InstallState,
}

impl<'s, 'a, R: Runtime> InstallTransaction<'s, 'a, R> {
    pub fn new(
        storage: &'s Storage<'a, R>,
        interaction: &'s dyn UserInteraction,
        options: InstallOptions,
    ) -> Self {
        Self {
            storage,
            interaction,
            options,
            state: InstallState::Started,
        }
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    /// Install `source`. Every outcome other than
    /// [`InstallOutcome::Installed`] leaves the repository as it was.
    pub fn run(&mut self, source: &dyn PackageSource) -> Result<InstallOutcome> {
        let descriptor = source.describe();
        debug!(
            "Installing {} {} into {:?}",
            descriptor.uri(),
            descriptor.version(),
            self.storage.root()
        );

        let mut tx = match self.storage.begin_transaction() {
            Ok(tx) => tx,
            Err(e) => {
                self.state = InstallState::RolledBack;
                return Err(e);
            }
        };

        let result = self.execute(&mut tx, source);
        match &result {
            Ok(InstallOutcome::Installed { .. }) => {}
            Ok(_) | Err(_) => {
                self.state = InstallState::RolledBack;
                self.abandon(tx);
            }
        }
        result
    }

    fn execute(
        &mut self,
        tx: &mut StorageTransaction<'a, R>,
        source: &dyn PackageSource,
    ) -> Result<InstallOutcome> {
        let descriptor = source.describe();
        let uri = descriptor.uri();
        let version = descriptor.version();

        // Validate
        let manifest = self.storage.load_in(tx)?;
        let existing = manifest.find(uri, version).cloned();
        if existing.is_some() && !self.options.force {
            let prompt = format!("Package {} {} is already installed. Reinstall it?", uri, version);
            if !self
                .interaction
                .confirm(&prompt, false)
                .map_err(RepoError::Interaction)?
            {
                debug!("Reinstall of {} {} declined", uri, version);
                return Ok(InstallOutcome::Declined);
            }
        }
        self.state = InstallState::Validated;
        if self.cancelled() {
            return Ok(InstallOutcome::Cancelled);
        }

        // Resolve
        for (dependency, constraint) in descriptor.dependencies() {
            let satisfied = manifest
                .versions_of(dependency)
                .any(|entry| constraint.is_compatible(&entry.version));
            if !satisfied {
                return Err(RepoError::UnresolvedDependency {
                    package: uri.to_string(),
                    dependency: dependency.clone(),
                    constraint: constraint.clone(),
                });
            }
        }
        for processor in descriptor.processors() {
            self.interaction
                .log(&format!("{} {} requires processor {}", uri, version, processor))
                .map_err(RepoError::Interaction)?;
        }
        self.state = InstallState::Resolved;
        if self.cancelled() {
            return Ok(InstallOutcome::Cancelled);
        }

        // Stage
        let dir = match &existing {
            Some(entry) => entry.dir.clone(),
            None => manifest.assign_directory_name(descriptor.abbrev(), version, |name| {
                self.storage.is_name_taken(name)
            }),
        };
        if !is_safe_dir_name(&dir) {
            return Err(RepoError::InvalidDescriptor(format!(
                "{} {} cannot be stored in directory '{}'",
                uri, version, dir
            )));
        }
        let staged = self.storage.stage_dir(tx, &dir)?;
        let extraction_error = |source: anyhow::Error| RepoError::Extraction {
            package: format!("{} {}", uri, version),
            target: staged.clone(),
            source,
        };
        source.materialize(&staged).map_err(extraction_error)?;
        let content = staged.join(descriptor.content_subdir());
        if !self.storage.runtime().is_dir(&content) {
            return Err(extraction_error(anyhow!(
                "archive has no {:?} directory",
                descriptor.content_subdir()
            )));
        }
        self.state = InstallState::Staged;
        if self.cancelled() {
            return Ok(InstallOutcome::Cancelled);
        }

        // Commit
        let entry = ManifestEntry::new(&dir, uri, version);
        let mut updated = manifest;
        let replaced = updated.upsert(entry.clone()).is_some();
        let operation = if replaced {
            ContentOperation::Replace {
                staged,
                dir: dir.clone(),
            }
        } else {
            ContentOperation::Place {
                staged,
                dir: dir.clone(),
            }
        };
        self.storage.commit(tx, &updated, &[operation])?;
        self.state = InstallState::Committed;
        info!("Installed {} {} into {:?}", uri, version, self.storage.package_dir(&dir));

        if let Err(e) = self
            .interaction
            .info(&format!("Installed {} {} in {}", uri, version, dir))
        {
            warn!("Failed to report installation: {:#}", e);
        }

        Ok(InstallOutcome::Installed {
            entry,
            manifest: updated,
            replaced,
        })
    }

    fn cancelled(&self) -> bool {
        let cancelled = self.options.cancel.is_cancelled();
        if cancelled {
            debug!("Install cancelled after state {}", self.state);
        }
        cancelled
    }

    fn abandon(&self, tx: StorageTransaction<'a, R>) {
        for failure in self.storage.rollback(tx) {
            let message = format!(
                "Failed to remove staged files {:?}: {:#}",
                failure.path, failure.error
            );
            if let Err(e) = self.interaction.error(&message) {
                warn!("{} ({:#})", message, e);
            }
        }
    }
}
