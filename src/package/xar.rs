//! Package archives (`.xar`): zip files with a descriptor at their root.

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use super::descriptor::{CONTENT_DIR, DESCRIPTOR_FILE};
use super::{LayoutRevision, PackageDescriptor, PackageSource};
use crate::error::RepoError;
use crate::runtime::Runtime;

/// Package source backed by a `.xar` file.
pub struct XarFileSource<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
    archive: Vec<u8>,
    descriptor: PackageDescriptor,
}

impl<'a, R: Runtime> XarFileSource<'a, R> {
    /// Open an archive and read its descriptor.
    ///
    /// The layout revision is derived from the archive: a top-level
    /// `content/` directory means the current layout.
    #[tracing::instrument(skip(runtime))]
    pub fn open(runtime: &'a R, path: &Path) -> crate::Result<Self> {
        let mut archive = Vec::new();
        runtime
            .open(path)
            .and_then(|mut file| {
                file.read_to_end(&mut archive)
                    .with_context(|| format!("Failed to read archive {:?}", path))
            })
            .map_err(|e| RepoError::io(path, e))?;

        let descriptor = read_descriptor(&archive).map_err(|e| match e.downcast::<RepoError>() {
            Ok(repo_error) => repo_error,
            Err(other) => RepoError::InvalidDescriptor(format!("{:?}: {:#}", path, other)),
        })?;
        debug!(
            "Opened {} {} from {:?} ({:?} layout)",
            descriptor.uri(),
            descriptor.version(),
            path,
            descriptor.layout()
        );

        Ok(Self {
            runtime,
            path: path.to_path_buf(),
            archive,
            descriptor,
        })
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: Runtime> PackageSource for XarFileSource<'_, R> {
    fn describe(&self) -> &PackageDescriptor {
        &self.descriptor
    }

    #[tracing::instrument(skip(self), fields(archive = ?self.path))]
    fn materialize(&self, target: &Path) -> Result<()> {
        debug!("Extracting {:?} to {:?}...", self.path, target);
        let mut archive = ZipArchive::new(Cursor::new(self.archive.as_slice()))
            .with_context(|| format!("Failed to parse archive {:?}", self.path))?;

        self.runtime.create_dir_all(target)?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .with_context(|| format!("Failed to read archive entry {}", i))?;

            let entry_path = match entry.enclosed_name() {
                Some(path) => path.to_path_buf(),
                None => {
                    debug!("Skipping entry with invalid path: {}", entry.name());
                    continue;
                }
            };

            let full_path = target.join(&entry_path);

            if entry.is_dir() {
                self.runtime.create_dir_all(&full_path)?;
            } else {
                if let Some(parent) = full_path.parent() {
                    self.runtime.create_dir_all(parent)?;
                }
                let mut dest_file = self.runtime.create_file(&full_path)?;
                std::io::copy(&mut entry, &mut dest_file)
                    .with_context(|| format!("Failed to extract file {:?}", full_path))?;

                #[cfg(unix)]
                if let Some(mode) = entry.unix_mode()
                    && let Err(e) = self.runtime.set_permissions(&full_path, mode)
                {
                    debug!("Failed to set permissions on {:?}: {}", full_path, e);
                }
            }
        }

        info!("Extraction complete.");
        Ok(())
    }
}

fn read_descriptor(bytes: &[u8]) -> Result<PackageDescriptor> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("Failed to parse ZIP archive")?;

    let mut has_content_dir = false;
    for name in archive.file_names() {
        let top = name.split('/').next().unwrap_or_default();
        if top == CONTENT_DIR && name.len() > CONTENT_DIR.len() {
            has_content_dir = true;
            break;
        }
    }
    let layout = if has_content_dir {
        LayoutRevision::Current
    } else {
        LayoutRevision::Legacy
    };

    let mut xml = String::new();
    archive
        .by_name(DESCRIPTOR_FILE)
        .map_err(|_| anyhow!("archive has no {}", DESCRIPTOR_FILE))?
        .read_to_string(&mut xml)
        .with_context(|| format!("Failed to read {}", DESCRIPTOR_FILE))?;

    Ok(PackageDescriptor::parse(&xml, layout)?)
}
