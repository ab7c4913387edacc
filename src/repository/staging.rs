use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// A path that could not be removed while abandoning staged work.
#[derive(Debug)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: anyhow::Error,
}

/// Tracks staged paths that must disappear unless the work is committed.
///
/// Paths still registered when the area is dropped are removed, so an
/// early return or a panic never leaves staged content behind.
pub struct StagingArea<'a, R: Runtime> {
    runtime: &'a R,
    paths: Vec<PathBuf>,
}

impl<'a, R: Runtime> StagingArea<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self {
            runtime,
            paths: Vec::new(),
        }
    }

    /// Register a path to be cleaned up
    pub fn add(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// Forget every path (e.g., when the operation succeeds)
    pub fn release_all(&mut self) {
        self.paths.clear();
    }

    #[cfg(test)]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Remove all registered paths, reporting those that could not be removed.
    pub fn cleanup(&mut self) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();
        for path in self.paths.drain(..) {
            if let Err(error) = remove_path(self.runtime, &path) {
                failures.push(CleanupFailure { path, error });
            }
        }
        failures
    }
}

impl<R: Runtime> Drop for StagingArea<'_, R> {
    fn drop(&mut self) {
        for failure in self.cleanup() {
            warn!("Failed to clean up {:?}: {:#}", failure.path, failure.error);
        }
    }
}

fn remove_path<R: Runtime>(runtime: &R, path: &Path) -> anyhow::Result<()> {
    debug!("Cleaning up: {:?}", path);
    if runtime.is_dir(path) {
        runtime.remove_dir_all(path)
    } else if runtime.exists(path) {
        runtime.remove_file(path)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_cleanup_removes_files_and_dirs() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("packages.txt.tmp");
        let sub_dir = dir.path().join("hello");
        fs::write(&file_path, "test").unwrap();
        fs::create_dir(&sub_dir).unwrap();
        fs::write(sub_dir.join("file.txt"), "test").unwrap();

        let mut area = StagingArea::new(&RealRuntime);
        area.add(file_path.clone());
        area.add(sub_dir.clone());
        assert!(area.cleanup().is_empty());

        assert!(!file_path.exists());
        assert!(!sub_dir.exists());
        assert!(area.paths().is_empty());
    }

    #[test]
    fn test_drop_cleans_up_unreleased_paths() {
        let dir = tempdir().unwrap();
        let staged = dir.path().join("staged");
        fs::create_dir(&staged).unwrap();

        {
            let mut area = StagingArea::new(&RealRuntime);
            area.add(staged.clone());
        }

        assert!(!staged.exists());
    }

    #[test]
    fn test_release_all_keeps_paths() {
        let dir = tempdir().unwrap();
        let staged = dir.path().join("staged");
        fs::create_dir(&staged).unwrap();

        {
            let mut area = StagingArea::new(&RealRuntime);
            area.add(staged.clone());
            area.release_all();
        }

        assert!(staged.exists());
    }

    #[test]
    fn test_cleanup_reports_failures() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/repo/.expath-pkg/staging/hello");

        runtime
            .expect_is_dir()
            .with(eq(path.clone()))
            .returning(|_| true);
        runtime
            .expect_remove_dir_all()
            .with(eq(path.clone()))
            .returning(|_| Err(anyhow::anyhow!("permission denied")));

        let mut area = StagingArea::new(&runtime);
        area.add(path.clone());
        let failures = area.cleanup();

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, path);
        assert!(failures[0].error.to_string().contains("permission denied"));
    }
}
