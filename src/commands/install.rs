use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::interaction::{ConsoleInteraction, UserInteraction};
use crate::package::{PackageSource, XarFileSource};
use crate::repository::{CancelToken, InstallOptions, InstallOutcome, Repository};
use crate::runtime::Runtime;

use super::paths::resolve_repo_root;

/// Install a package archive, abandoning it on Ctrl-C.
///
/// The install runs on a blocking thread; an interrupt only sets the
/// cancel token, so an install that already reached its commit finishes.
#[tracing::instrument(skip(runtime, repo_root))]
pub async fn install<R: Runtime + 'static>(
    runtime: R,
    archive: PathBuf,
    force: bool,
    yes: bool,
    repo_root: Option<PathBuf>,
) -> Result<InstallOutcome> {
    let root = resolve_repo_root(&runtime, repo_root)?;
    let cancel = CancelToken::new();
    let cancel_clone = cancel.clone();

    // Register Ctrl-C handler
    let ctrl_c_handler = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, abandoning installation...");
            cancel_clone.cancel();
        }
    });

    let result = tokio::task::spawn_blocking(move || {
        let interaction = ConsoleInteraction::new(yes);
        install_archive(&runtime, &archive, force, &root, cancel, &interaction)
    })
    .await
    .context("Install task failed");

    ctrl_c_handler.abort();
    result?
}

/// Install the archive at `archive` into the repository at `root`.
pub fn install_archive<R: Runtime>(
    runtime: &R,
    archive: &Path,
    force: bool,
    root: &Path,
    cancel: CancelToken,
    interaction: &dyn UserInteraction,
) -> Result<InstallOutcome> {
    let source = XarFileSource::open(runtime, archive)?;
    let descriptor = source.describe();
    debug!(
        "Archive {:?} holds {} {}",
        archive,
        descriptor.uri(),
        descriptor.version()
    );

    let repo = Repository::new(runtime, root.to_path_buf());
    let options = InstallOptions { force, cancel };
    let outcome = repo.install_with(&source, options, interaction)?;

    match &outcome {
        InstallOutcome::Installed { entry, .. } => {
            debug!("Installed into {:?}", root.join(&entry.dir));
        }
        InstallOutcome::Declined => println!("Reinstall declined."),
        InstallOutcome::Cancelled => warn!("Installation of {:?} was interrupted", archive),
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::BatchInteraction;
    use crate::runtime::RealRuntime;
    use crate::test_utils::descriptor_xml;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::ZipWriter;
    use zip::write::FileOptions;

    fn write_xar(path: &Path, files: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options: FileOptions<()> = FileOptions::default();
        for (name, content) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_install_archive() {
        let dir = tempdir().unwrap();
        let xar = dir.path().join("hello.xar");
        let root = dir.path().join("repo");
        let xml = descriptor_xml("urn:hello", "hello", "1.0", "");
        write_xar(&xar, &[("expath-pkg.xml", &xml), ("content/hello.xql", "1")]);

        let outcome = install_archive(
            &RealRuntime,
            &xar,
            false,
            &root,
            CancelToken::new(),
            &BatchInteraction,
        )
        .unwrap();

        assert!(!outcome.is_noop());
        assert!(root.join("hello/content/hello.xql").is_file());
        assert!(root.join("hello/expath-pkg.xml").is_file());
    }

    #[test]
    fn test_install_archive_without_descriptor() {
        let dir = tempdir().unwrap();
        let xar = dir.path().join("broken.xar");
        write_xar(&xar, &[("content/hello.xql", "1")]);

        let err = install_archive(
            &RealRuntime,
            &xar,
            false,
            &dir.path().join("repo"),
            CancelToken::new(),
            &BatchInteraction,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid package descriptor"));
    }

    #[tokio::test]
    async fn test_install_with_explicit_root() {
        let dir = tempdir().unwrap();
        let xar = dir.path().join("hello.xar");
        let root = dir.path().join("repo");
        let xml = descriptor_xml("urn:hello", "hello", "1.0", "");
        write_xar(&xar, &[("expath-pkg.xml", &xml), ("hello/hello.xql", "1")]);

        let outcome = install(RealRuntime, xar, false, true, Some(root.clone()))
            .await
            .unwrap();
        assert!(matches!(outcome, InstallOutcome::Installed { .. }));
        assert!(root.join("hello/hello/hello.xql").is_file());
    }
}
