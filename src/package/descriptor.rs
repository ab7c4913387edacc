//! Package descriptors (`expath-pkg.xml`).

use std::collections::BTreeMap;

use super::DependencyConstraint;
use crate::error::{RepoError, Result};
use crate::xml::parse_elements;

/// Namespace of the package descriptor document.
pub const PKG_NS: &str = "http://expath.org/ns/pkg";

/// File name of the descriptor at the root of an archive and of an
/// installed package directory.
pub const DESCRIPTOR_FILE: &str = "expath-pkg.xml";

/// Name of the content subdirectory in the current layout.
pub const CONTENT_DIR: &str = "content";

/// On-disk convention for the files of one package version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutRevision {
    /// Files live under a subdirectory named after the abbreviation.
    Legacy,
    /// Files live under `content/`.
    Current,
}

impl LayoutRevision {
    /// Subdirectory of the package directory holding the content files.
    pub fn content_subdir<'a>(&self, abbrev: &'a str) -> &'a str {
        match self {
            LayoutRevision::Legacy => abbrev,
            LayoutRevision::Current => CONTENT_DIR,
        }
    }
}

/// Identity, layout and dependencies of one package version.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    uri: String,
    abbrev: String,
    version: String,
    title: Option<String>,
    layout: LayoutRevision,
    dependencies: BTreeMap<String, DependencyConstraint>,
    processors: Vec<String>,
}

impl PackageDescriptor {
    pub fn new(uri: &str, abbrev: &str, version: &str, layout: LayoutRevision) -> Result<Self> {
        if uri.trim().is_empty() {
            return Err(RepoError::InvalidDescriptor("package name is empty".into()));
        }
        if version.trim().is_empty() {
            return Err(RepoError::InvalidDescriptor(format!(
                "package {} has an empty version",
                uri
            )));
        }
        validate_abbrev(abbrev)?;
        for (field, value) in [("name", uri), ("version", version)] {
            if value.chars().any(char::is_whitespace) {
                return Err(RepoError::InvalidDescriptor(format!(
                    "package {} '{}' contains whitespace",
                    field, value
                )));
            }
        }
        Ok(Self {
            uri: uri.to_string(),
            abbrev: abbrev.to_string(),
            version: version.to_string(),
            title: None,
            layout,
            dependencies: BTreeMap::new(),
            processors: Vec::new(),
        })
    }

    /// Parse a descriptor document. The layout is not part of the document;
    /// the caller derives it from the archive.
    pub fn parse(xml: &str, layout: LayoutRevision) -> Result<Self> {
        let elements = parse_elements(xml).map_err(RepoError::InvalidDescriptor)?;
        let root = &elements[0];
        if !root.is(PKG_NS, "package") {
            return Err(RepoError::InvalidDescriptor(format!(
                "root element must be {{{}}}package",
                PKG_NS
            )));
        }

        let required = |name: &str| {
            root.attr(name).ok_or_else(|| {
                RepoError::InvalidDescriptor(format!("missing attribute '{}' on package", name))
            })
        };
        let mut descriptor =
            Self::new(required("name")?, required("abbrev")?, required("version")?, layout)?;

        for element in elements.iter().skip(1).filter(|e| e.depth == 1) {
            if element.namespace.as_deref() != Some(PKG_NS) {
                continue;
            }
            match element.name.as_str() {
                "title" => descriptor.title = Some(element.text.clone()),
                "dependency" => {
                    if let Some(processor) = element.attr("processor") {
                        descriptor.processors.push(processor.to_string());
                        continue;
                    }
                    let package = element.attr("package").ok_or_else(|| {
                        RepoError::InvalidDescriptor(
                            "dependency has neither 'package' nor 'processor'".into(),
                        )
                    })?;
                    let constraint = DependencyConstraint::from_attributes(
                        element.attr("versions"),
                        element.attr("semver"),
                        element.attr("semver-min"),
                        element.attr("semver-max"),
                    )?;
                    if descriptor.dependencies.contains_key(package) {
                        return Err(RepoError::InvalidDescriptor(format!(
                            "duplicate dependency on {}",
                            package
                        )));
                    }
                    descriptor.dependencies.insert(package.to_string(), constraint);
                }
                _ => {}
            }
        }

        Ok(descriptor)
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn abbrev(&self) -> &str {
        &self.abbrev
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn layout(&self) -> LayoutRevision {
        self.layout
    }

    /// Subdirectory of an installed package directory holding its files.
    pub fn content_subdir(&self) -> &str {
        self.layout.content_subdir(&self.abbrev)
    }

    /// Dependencies on other packages, keyed by package URI.
    pub fn dependencies(&self) -> &BTreeMap<String, DependencyConstraint> {
        &self.dependencies
    }

    /// Processor requirements. Not resolved against the repository.
    pub fn processors(&self) -> &[String] {
        &self.processors
    }
}

fn validate_abbrev(abbrev: &str) -> Result<()> {
    let invalid = abbrev.is_empty()
        || abbrev == "."
        || abbrev == ".."
        || abbrev.starts_with('.')
        || abbrev
            .chars()
            .any(|c| c == '/' || c == '\\' || c == ':' || c.is_whitespace() || c.is_control());
    if invalid {
        return Err(RepoError::InvalidDescriptor(format!(
            "abbreviation '{}' is not a valid directory name",
            abbrev
        )));
    }
    Ok(())
}
