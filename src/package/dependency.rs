//! Dependency version constraints.
//!
//! A constraint only answers one question: is this installed version
//! acceptable? Resolution code never looks at the variant.

use semver::Version;
use std::fmt;

use crate::error::{RepoError, Result};

/// Which versions of a dependency satisfy a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyConstraint {
    /// No version requirement.
    Any,
    /// Exact version strings, compared without normalization.
    Versions(Vec<String>),
    /// A version template: `1.2` accepts `1.2`, `1.2.0`, `1.2.7`, ...
    Semver(String),
    /// Inclusive bounds, either of which may be open.
    Range {
        min: Option<Version>,
        max: Option<Version>,
    },
}

impl DependencyConstraint {
    /// Build the exact-versions variant from a whitespace-separated list.
    /// Duplicates are dropped; an empty list accepts nothing.
    pub fn versions(list: &str) -> Self {
        let mut versions: Vec<String> = Vec::new();
        for token in list.split_whitespace() {
            if !versions.iter().any(|v| v == token) {
                versions.push(token.to_string());
            }
        }
        DependencyConstraint::Versions(versions)
    }

    pub fn semver(template: &str) -> Result<Self> {
        let template = template.trim();
        if template.is_empty() || template.split('.').any(str::is_empty) {
            return Err(RepoError::InvalidDescriptor(format!(
                "invalid semver template '{}'",
                template
            )));
        }
        Ok(DependencyConstraint::Semver(template.to_string()))
    }

    pub fn range(min: Option<&str>, max: Option<&str>) -> Result<Self> {
        let parse_bound = |bound: &str| {
            parse_lenient(bound).ok_or_else(|| {
                RepoError::InvalidDescriptor(format!("invalid version bound '{}'", bound))
            })
        };
        let min = min.map(parse_bound).transpose()?;
        let max = max.map(parse_bound).transpose()?;
        if let (Some(lo), Some(hi)) = (&min, &max)
            && lo > hi
        {
            return Err(RepoError::InvalidDescriptor(format!(
                "empty version range {} - {}",
                lo, hi
            )));
        }
        Ok(DependencyConstraint::Range { min, max })
    }

    /// Build a constraint from the version attributes of a `<dependency>`
    /// element. At most one style may be used.
    pub fn from_attributes(
        versions: Option<&str>,
        semver: Option<&str>,
        semver_min: Option<&str>,
        semver_max: Option<&str>,
    ) -> Result<Self> {
        let has_range = semver_min.is_some() || semver_max.is_some();
        match (versions, semver, has_range) {
            (None, None, false) => Ok(DependencyConstraint::Any),
            (Some(list), None, false) => {
                if list.trim().is_empty() {
                    return Err(RepoError::InvalidDescriptor(
                        "empty versions attribute".to_string(),
                    ));
                }
                Ok(Self::versions(list))
            }
            (None, Some(template), false) => Self::semver(template),
            (None, None, true) => Self::range(semver_min, semver_max),
            _ => Err(RepoError::InvalidDescriptor(
                "dependency mixes versions, semver and semver-min/max".to_string(),
            )),
        }
    }

    /// Whether `version` satisfies this constraint. Pure and total.
    pub fn is_compatible(&self, version: &str) -> bool {
        match self {
            DependencyConstraint::Any => true,
            DependencyConstraint::Versions(versions) => versions.iter().any(|v| v == version),
            DependencyConstraint::Semver(template) => {
                version == template
                    || version
                        .strip_prefix(template.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            }
            DependencyConstraint::Range { min, max } => match parse_lenient(version) {
                Some(candidate) => {
                    min.as_ref().is_none_or(|lo| &candidate >= lo)
                        && max.as_ref().is_none_or(|hi| &candidate <= hi)
                }
                None => false,
            },
        }
    }
}

impl fmt::Display for DependencyConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyConstraint::Any => write!(f, "any version"),
            DependencyConstraint::Versions(versions) => write!(f, "versions {}", versions.join(" ")),
            DependencyConstraint::Semver(template) => write!(f, "semver {}", template),
            DependencyConstraint::Range { min, max } => match (min, max) {
                (Some(lo), Some(hi)) => write!(f, "semver {} - {}", lo, hi),
                (Some(lo), None) => write!(f, "semver >= {}", lo),
                (None, Some(hi)) => write!(f, "semver <= {}", hi),
                (None, None) => write!(f, "any version"),
            },
        }
    }
}

/// Parse a version, padding a short core (`1`, `1.2`) with `.0`.
fn parse_lenient(version: &str) -> Option<Version> {
    let version = version.trim();
    let split = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(split);
    let components = core.split('.').count();
    if core.is_empty() || components > 3 {
        return None;
    }
    let padding = ".0".repeat(3 - components);
    Version::parse(&format!("{}{}{}", core, padding, suffix)).ok()
}
