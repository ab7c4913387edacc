//! Packages: descriptors, dependency constraints and installable sources.

mod dependency;
pub mod descriptor;
mod source;
mod xar;

pub use dependency::DependencyConstraint;
pub use descriptor::{LayoutRevision, PackageDescriptor};
pub use source::PackageSource;
pub use xar::XarFileSource;
