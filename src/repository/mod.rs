//! A package repository on disk and the operations that change it.

pub mod format;
mod manifest;
mod staging;
mod storage;
mod transaction;

use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};
use crate::interaction::UserInteraction;
use crate::package::descriptor::{CONTENT_DIR, DESCRIPTOR_FILE};
use crate::package::{DependencyConstraint, LayoutRevision, PackageDescriptor, PackageSource};
use crate::runtime::Runtime;

pub use manifest::{Manifest, ManifestEntry};
pub use staging::CleanupFailure;
pub use storage::{ContentOperation, METADATA_DIR, Storage, StorageTransaction};
pub use transaction::{
    CancelToken, InstallOptions, InstallOutcome, InstallState, InstallTransaction,
};

/// Result of a removal that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoveOutcome {
    Removed {
        entries: Vec<ManifestEntry>,
        manifest: Manifest,
    },
    /// The user refused the removal.
    Declined,
}

pub struct Repository<'a, R: Runtime> {
    storage: Storage<'a, R>,
}

impl<'a, R: Runtime> Repository<'a, R> {
    pub fn new(runtime: &'a R, root: PathBuf) -> Self {
        Self {
            storage: Storage::new(runtime, root),
        }
    }

    pub fn root(&self) -> &Path {
        self.storage.root()
    }

    pub fn storage(&self) -> &Storage<'a, R> {
        &self.storage
    }

    /// Create the metadata directory and empty manifests if missing.
    pub fn init(&self) -> Result<()> {
        self.storage.init()
    }

    /// Snapshot of the installed packages, read under a shared lock.
    pub fn packages(&self) -> Result<Manifest> {
        self.storage.load()
    }

    /// Install one package version.
    pub fn install(
        &self,
        source: &dyn PackageSource,
        force: bool,
        interaction: &dyn UserInteraction,
    ) -> Result<InstallOutcome> {
        let options = InstallOptions {
            force,
            ..Default::default()
        };
        self.install_with(source, options, interaction)
    }

    pub fn install_with(
        &self,
        source: &dyn PackageSource,
        options: InstallOptions,
        interaction: &dyn UserInteraction,
    ) -> Result<InstallOutcome> {
        InstallTransaction::new(&self.storage, interaction, options).run(source)
    }

    /// Uninstall `version` of `uri`, or every installed version of it.
    ///
    /// Unless `force` is set, asks for confirmation and refuses to break
    /// the dependencies of the packages that stay installed.
    pub fn remove(
        &self,
        uri: &str,
        version: Option<&str>,
        force: bool,
        interaction: &dyn UserInteraction,
    ) -> Result<RemoveOutcome> {
        let mut tx = self.storage.begin_transaction()?;
        let manifest = self.storage.load_in(&tx)?;

        let targets: Vec<ManifestEntry> = match version {
            Some(v) => manifest.find(uri, v).cloned().into_iter().collect(),
            None => manifest.versions_of(uri).cloned().collect(),
        };
        if targets.is_empty() {
            return Err(RepoError::NotInstalled {
                uri: uri.to_string(),
                version: version.map(String::from),
            });
        }
        let versions = targets
            .iter()
            .map(|e| e.version.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        if !force {
            let dependents = self.dependents(&manifest, &targets, interaction)?;
            if !dependents.is_empty() {
                return Err(RepoError::HasDependents {
                    uri: uri.to_string(),
                    version: versions,
                    dependents,
                });
            }

            let prompt = format!("Remove {} {}?", uri, versions);
            if !interaction
                .confirm(&prompt, false)
                .map_err(RepoError::Interaction)?
            {
                debug!("Removal of {} declined", uri);
                return Ok(RemoveOutcome::Declined);
            }
        }

        let mut updated = manifest;
        let mut operations = Vec::new();
        for target in &targets {
            updated.remove_dir(&target.dir);
            operations.push(ContentOperation::Retire {
                dir: target.dir.clone(),
            });
        }
        self.storage.commit(&mut tx, &updated, &operations)?;

        if let Err(e) = interaction.info(&format!("Removed {} {}", uri, versions)) {
            warn!("Failed to report removal: {:#}", e);
        }
        Ok(RemoveOutcome::Removed {
            entries: targets,
            manifest: updated,
        })
    }

    /// Descriptor of an installed package, read from its directory.
    pub fn installed_descriptor(&self, entry: &ManifestEntry) -> Result<PackageDescriptor> {
        let runtime = self.storage.runtime();
        let dir = self.storage.package_dir(&entry.dir);
        let path = dir.join(DESCRIPTOR_FILE);
        let xml = runtime
            .read_to_string(&path)
            .map_err(|e| RepoError::io(&path, e))?;
        let layout = if runtime.is_dir(&dir.join(CONTENT_DIR)) {
            LayoutRevision::Current
        } else {
            LayoutRevision::Legacy
        };
        PackageDescriptor::parse(&xml, layout)
    }

    /// Directory holding the content files of an installed package.
    pub fn content_dir(&self, entry: &ManifestEntry) -> Result<PathBuf> {
        let descriptor = self.installed_descriptor(entry)?;
        Ok(self
            .storage
            .package_dir(&entry.dir)
            .join(descriptor.content_subdir()))
    }

    /// Installed packages whose dependencies hold now but would not once
    /// `targets` are gone.
    fn dependents(
        &self,
        manifest: &Manifest,
        targets: &[ManifestEntry],
        interaction: &dyn UserInteraction,
    ) -> Result<Vec<String>> {
        let remaining: Vec<&ManifestEntry> = manifest
            .entries()
            .iter()
            .filter(|e| !targets.contains(*e))
            .collect();

        let mut dependents = Vec::new();
        for entry in &remaining {
            let descriptor = match self.installed_descriptor(entry) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    interaction
                        .log(&format!("Skipping dependency check of {}: {}", entry.dir, e))
                        .map_err(RepoError::Interaction)?;
                    continue;
                }
            };
            for (dependency, constraint) in descriptor.dependencies() {
                let breaks = satisfies(targets.iter(), dependency, constraint)
                    && !satisfies(remaining.iter().copied(), dependency, constraint);
                if breaks {
                    dependents.push(format!("{} {}", entry.uri, entry.version));
                    break;
                }
            }
        }
        Ok(dependents)
    }
}

fn satisfies<'e>(
    mut entries: impl Iterator<Item = &'e ManifestEntry>,
    uri: &str,
    constraint: &DependencyConstraint,
) -> bool {
    entries.any(|e| e.uri == uri && constraint.is_compatible(&e.version))
}
