//! Error taxonomy for repository operations.

use std::path::PathBuf;
use thiserror::Error;

use crate::package::DependencyConstraint;

/// Failure kinds of repository operations.
///
/// A declined confirmation is not an error; see
/// [`InstallOutcome`](crate::repository::InstallOutcome).
#[derive(Error, Debug)]
pub enum RepoError {
    /// The two persisted manifest representations disagree, or one of them
    /// is unreadable.
    #[error("Repository at {} is corrupt: {reason}", root.display())]
    RepositoryCorrupt { root: PathBuf, reason: String },

    /// No installed version satisfies a declared dependency.
    #[error("Package {package} requires {dependency} ({constraint}), which is not installed")]
    UnresolvedDependency {
        package: String,
        dependency: String,
        constraint: DependencyConstraint,
    },

    /// The package source failed to materialize its content.
    #[error("Failed to extract {package} into {}", target.display())]
    Extraction {
        package: String,
        target: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Storage failed to commit. The previously committed state is intact.
    #[error("Failed to commit repository at {}", root.display())]
    Persist {
        root: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid package descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Package {uri}{} is not installed", version.as_deref().map(|v| format!(" {}", v)).unwrap_or_default())]
    NotInstalled { uri: String, version: Option<String> },

    /// Removing the package would break packages that depend on it.
    #[error("Package {uri} {version} is required by {}", dependents.join(", "))]
    HasDependents {
        uri: String,
        version: String,
        dependents: Vec<String>,
    },

    /// The interaction capability itself failed.
    #[error("User interaction failed")]
    Interaction(#[source] anyhow::Error),

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl RepoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        RepoError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(root: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        RepoError::RepositoryCorrupt {
            root: root.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;
