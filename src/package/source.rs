use anyhow::Result;
use std::path::Path;

use super::PackageDescriptor;

/// A package archive ready to be installed.
pub trait PackageSource {
    /// Descriptor read from the archive.
    fn describe(&self) -> &PackageDescriptor;

    /// Unpack the archive content into `target`, which is created if
    /// missing. May leave `target` partially populated on failure.
    fn materialize(&self, target: &Path) -> Result<()>;
}
