//! Command-line entry points. Each command resolves the repository root,
//! runs one repository operation and prints its result.

use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::repository::Repository;
use crate::runtime::Runtime;

mod install;
mod list;
mod paths;
mod remove;

pub use install::{install, install_archive};
pub use list::{list, render_list};
pub use paths::{default_repo_root, resolve_repo_root};
pub use remove::remove;

/// Create an empty repository
#[tracing::instrument(skip(runtime, repo_root))]
pub fn init<R: Runtime>(runtime: &R, repo_root: Option<PathBuf>) -> Result<()> {
    let root = resolve_repo_root(runtime, repo_root)?;
    debug!("Initializing {:?}", root);
    Repository::new(runtime, root.clone()).init()?;
    println!("Initialized repository at {}", root.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_manifests() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("repo");

        init(&RealRuntime, Some(root.clone())).unwrap();

        assert!(root.join(".expath-pkg/packages.txt").is_file());
        assert!(root.join(".expath-pkg/packages.xml").is_file());
    }
}
