pub mod commands;
pub mod error;
pub mod interaction;
pub mod package;
pub mod repository;
pub mod runtime;
mod xml;

pub use error::{RepoError, Result};

/// Fixtures shared by unit tests.
#[cfg(test)]
pub mod test_utils {
    use anyhow::{Result, bail};
    use std::io::{Read, Write};
    use std::path::{Path, PathBuf};

    use crate::package::descriptor::DESCRIPTOR_FILE;
    use crate::package::{LayoutRevision, PackageDescriptor, PackageSource};
    use crate::runtime::{FileLock, RealRuntime, Runtime};

    /// Descriptor document for a package, with `children` spliced into the
    /// root element.
    pub fn descriptor_xml(uri: &str, abbrev: &str, version: &str, children: &str) -> String {
        format!(
            r#"<package xmlns="http://expath.org/ns/pkg" name="{}" abbrev="{}" version="{}" spec="1.0">
   <title>{} package</title>
   {}
</package>"#,
            uri, abbrev, version, abbrev, children
        )
    }

    /// In-memory package source. Writes its descriptor and files on
    /// `materialize`, or fails halfway when built with [`FakeSource::failing`].
    pub struct FakeSource {
        xml: String,
        descriptor: PackageDescriptor,
        files: Vec<(String, String)>,
        fail: bool,
    }

    impl FakeSource {
        pub fn new(xml: &str, layout: LayoutRevision) -> Self {
            Self {
                xml: xml.to_string(),
                descriptor: PackageDescriptor::parse(xml, layout).unwrap(),
                files: Vec::new(),
                fail: false,
            }
        }

        /// Add a file, replacing any earlier one at the same path.
        pub fn with_file(mut self, path: &str, content: &str) -> Self {
            self.files.retain(|(p, _)| p != path);
            self.files.push((path.to_string(), content.to_string()));
            self
        }

        pub fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    impl PackageSource for FakeSource {
        fn describe(&self) -> &PackageDescriptor {
            &self.descriptor
        }

        fn materialize(&self, target: &Path) -> Result<()> {
            std::fs::create_dir_all(target)?;
            std::fs::write(target.join(DESCRIPTOR_FILE), &self.xml)?;
            if self.fail {
                bail!("archive truncated");
            }
            for (path, content) in &self.files {
                let full = target.join(path);
                if let Some(parent) = full.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(full, content)?;
            }
            Ok(())
        }
    }

    /// Real filesystem, except for injected rename failures: onto a file
    /// called `fail_rename_to`, or out of a directory named in
    /// `fail_rename_out_of`.
    #[derive(Default)]
    pub struct FaultyRuntime {
        fail_rename_to: Option<String>,
        fail_rename_out_of: Vec<String>,
    }

    impl FaultyRuntime {
        pub fn failing_rename_to(name: &str) -> Self {
            Self {
                fail_rename_to: Some(name.to_string()),
                ..Default::default()
            }
        }

        pub fn failing_rename_out_of(mut self, dir: &str) -> Self {
            self.fail_rename_out_of.push(dir.to_string());
            self
        }

        fn fails(&self, from: &Path, to: &Path) -> bool {
            let name = |path: Option<&Path>| {
                path.and_then(|p| p.file_name())
                    .and_then(|n| n.to_str())
                    .map(String::from)
            };
            let onto = name(Some(to));
            let out_of = name(from.parent());
            (onto.is_some() && onto == self.fail_rename_to)
                || out_of.is_some_and(|dir| self.fail_rename_out_of.contains(&dir))
        }
    }

    impl Runtime for FaultyRuntime {
        fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
            RealRuntime.write(path, contents)
        }

        fn read_to_string(&self, path: &Path) -> Result<String> {
            RealRuntime.read_to_string(path)
        }

        fn rename(&self, from: &Path, to: &Path) -> Result<()> {
            if self.fails(from, to) {
                bail!("injected failure renaming {:?} to {:?}", from, to);
            }
            RealRuntime.rename(from, to)
        }

        fn create_dir_all(&self, path: &Path) -> Result<()> {
            RealRuntime.create_dir_all(path)
        }

        fn remove_file(&self, path: &Path) -> Result<()> {
            RealRuntime.remove_file(path)
        }

        fn remove_dir_all(&self, path: &Path) -> Result<()> {
            RealRuntime.remove_dir_all(path)
        }

        fn exists(&self, path: &Path) -> bool {
            RealRuntime.exists(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            RealRuntime.is_dir(path)
        }

        fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
            RealRuntime.read_dir(path)
        }

        fn create_file(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
            RealRuntime.create_file(path)
        }

        fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
            RealRuntime.open(path)
        }

        fn set_permissions(&self, path: &Path, mode: u32) -> Result<()> {
            RealRuntime.set_permissions(path, mode)
        }

        fn lock_exclusive(&self, path: &Path) -> Result<FileLock> {
            RealRuntime.lock_exclusive(path)
        }

        fn lock_shared(&self, path: &Path) -> Result<FileLock> {
            RealRuntime.lock_shared(path)
        }

        fn home_dir(&self) -> Option<PathBuf> {
            RealRuntime.home_dir()
        }
    }
}
