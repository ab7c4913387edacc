use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use crate::runtime::Runtime;

/// The repository to operate on: `repo_root` when given, else the default.
#[tracing::instrument(skip(runtime, repo_root))]
pub fn resolve_repo_root<R: Runtime>(runtime: &R, repo_root: Option<PathBuf>) -> Result<PathBuf> {
    let root = match repo_root {
        Some(path) => path,
        None => default_repo_root(runtime)?,
    };
    info!("Using repository: {}", root.display());
    Ok(root)
}

/// Get the default repository location (`~/.pkgrepo`)
#[tracing::instrument(skip(runtime))]
pub fn default_repo_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    let home_dir = runtime
        .home_dir()
        .context("Could not find home directory")?;
    Ok(home_dir.join(".pkgrepo"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;

    #[test]
    fn test_default_repo_root() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_home_dir()
            .returning(|| Some(PathBuf::from("/home/user")));

        assert_eq!(
            default_repo_root(&runtime).unwrap(),
            PathBuf::from("/home/user/.pkgrepo")
        );
    }

    #[test]
    fn test_default_repo_root_without_home() {
        let mut runtime = MockRuntime::new();
        runtime.expect_home_dir().returning(|| None);

        let err = default_repo_root(&runtime).unwrap_err();
        assert!(err.to_string().contains("home directory"));
    }

    #[test]
    fn test_explicit_root_bypasses_default() {
        // No expectations: the home directory must not be consulted.
        let runtime = MockRuntime::new();
        let root = resolve_repo_root(&runtime, Some(PathBuf::from("/custom"))).unwrap();
        assert_eq!(root, PathBuf::from("/custom"));
    }
}
