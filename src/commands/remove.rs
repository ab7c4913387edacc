use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::interaction::ConsoleInteraction;
use crate::repository::{ManifestEntry, RemoveOutcome, Repository};
use crate::runtime::Runtime;

use super::paths::resolve_repo_root;

/// Remove one version of a package, or all of its versions
#[tracing::instrument(skip(runtime, repo_root))]
pub fn remove<R: Runtime>(
    runtime: &R,
    uri: &str,
    version: Option<&str>,
    force: bool,
    yes: bool,
    repo_root: Option<PathBuf>,
) -> Result<RemoveOutcome> {
    debug!("Removing {} version={:?} force={}", uri, version, force);
    let root = resolve_repo_root(runtime, repo_root)?;
    let repo = Repository::new(runtime, root);
    let interaction = ConsoleInteraction::new(yes);

    if !force && !yes {
        show_removal_plan(&repo, uri, version)?;
    }

    let outcome = repo.remove(uri, version, force, &interaction)?;
    if outcome == RemoveOutcome::Declined {
        println!("Removal cancelled.");
    }
    Ok(outcome)
}

fn show_removal_plan<R: Runtime>(
    repo: &Repository<'_, R>,
    uri: &str,
    version: Option<&str>,
) -> Result<()> {
    let manifest = repo.packages()?;
    let targets: Vec<&ManifestEntry> = manifest
        .versions_of(uri)
        .filter(|e| version.is_none_or(|v| e.version == v))
        .collect();
    if targets.is_empty() {
        // The removal itself reports the missing package.
        return Ok(());
    }

    println!();
    println!("=== Removal Plan ===");
    println!();
    println!("Package: {}", uri);
    println!();
    println!("Directories to remove:");
    for entry in targets {
        println!("  [DEL] {} ({})", repo.root().join(&entry.dir).display(), entry.version);
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::BatchInteraction;
    use crate::package::LayoutRevision;
    use crate::runtime::RealRuntime;
    use crate::test_utils::{FakeSource, descriptor_xml};
    use tempfile::tempdir;

    #[test]
    fn test_remove_with_yes() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let source =
            FakeSource::new(&descriptor_xml("urn:a", "a", "1.0", ""), LayoutRevision::Current)
                .with_file("content/a.xql", "a");
        Repository::new(&RealRuntime, root.clone())
            .install(&source, false, &BatchInteraction)
            .unwrap();

        let outcome = remove(&RealRuntime, "urn:a", None, false, true, Some(root.clone())).unwrap();

        assert!(matches!(outcome, RemoveOutcome::Removed { .. }));
        assert!(!root.join("a").exists());
    }

    #[test]
    fn test_remove_unknown_fails() {
        let dir = tempdir().unwrap();
        let result = remove(
            &RealRuntime,
            "urn:missing",
            Some("1.0"),
            true,
            true,
            Some(dir.path().to_path_buf()),
        );
        assert!(result.unwrap_err().to_string().contains("not installed"));
    }
}
