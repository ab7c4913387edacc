//! In-memory record of installed packages.

use serde::Serialize;
use std::collections::BTreeMap;

/// One installed package version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ManifestEntry {
    /// Directory holding the package, relative to the repository root.
    pub dir: String,
    pub uri: String,
    pub version: String,
}

impl ManifestEntry {
    pub fn new(dir: &str, uri: &str, version: &str) -> Self {
        Self {
            dir: dir.to_string(),
            uri: uri.to_string(),
            version: version.to_string(),
        }
    }
}

/// Ordered sequence of entries plus an index by package URI.
///
/// Directory names are unique, and a URI never appears twice with the
/// same version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    by_uri: BTreeMap<String, Vec<usize>>,
}

impl Manifest {
    /// Build a manifest, checking its invariants. The error names the
    /// first violation found.
    pub fn from_entries(entries: Vec<ManifestEntry>) -> Result<Self, String> {
        let mut manifest = Manifest::default();
        for entry in entries {
            if !is_safe_dir_name(&entry.dir) {
                return Err(format!("'{}' is not a valid package directory", entry.dir));
            }
            if manifest.contains_dir(&entry.dir) {
                return Err(format!("directory '{}' is used twice", entry.dir));
            }
            if manifest.find(&entry.uri, &entry.version).is_some() {
                return Err(format!(
                    "package {} {} is listed twice",
                    entry.uri, entry.version
                ));
            }
            manifest.entries.push(entry);
            manifest.reindex();
        }
        Ok(manifest)
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Installed versions of `uri`, in manifest order.
    pub fn versions_of<'a>(
        &'a self,
        uri: &str,
    ) -> impl Iterator<Item = &'a ManifestEntry> + use<'a> {
        self.by_uri
            .get(uri)
            .into_iter()
            .flatten()
            .map(|&index| &self.entries[index])
    }

    pub fn find(&self, uri: &str, version: &str) -> Option<&ManifestEntry> {
        self.versions_of(uri).find(|entry| entry.version == version)
    }

    pub fn find_by_dir(&self, dir: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|entry| entry.dir == dir)
    }

    pub fn contains_dir(&self, dir: &str) -> bool {
        self.find_by_dir(dir).is_some()
    }

    /// Replace the entry with the same URI and version in place, or append.
    /// Returns the replaced entry.
    pub fn upsert(&mut self, entry: ManifestEntry) -> Option<ManifestEntry> {
        let position = self
            .entries
            .iter()
            .position(|e| e.uri == entry.uri && e.version == entry.version);
        let replaced = match position {
            Some(index) => Some(std::mem::replace(&mut self.entries[index], entry)),
            None => {
                self.entries.push(entry);
                None
            }
        };
        self.reindex();
        replaced
    }

    pub fn remove_dir(&mut self, dir: &str) -> Option<ManifestEntry> {
        let index = self.entries.iter().position(|e| e.dir == dir)?;
        let removed = self.entries.remove(index);
        self.reindex();
        Some(removed)
    }

    /// Pick the directory for a new package version: the abbreviation when
    /// free, else `abbrev-version`, else `abbrev-version-N` for the first
    /// free N starting at 2. `taken` reports names in use outside the
    /// manifest (e.g. existing files).
    pub fn assign_directory_name<F>(&self, abbrev: &str, version: &str, taken: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        let is_free = |name: &str| !self.contains_dir(name) && !taken(name);

        if is_free(abbrev) {
            return abbrev.to_string();
        }
        let versioned = format!("{}-{}", abbrev, version);
        if is_free(&versioned) {
            return versioned;
        }
        (2..)
            .map(|n| format!("{}-{}", versioned, n))
            .find(|name| is_free(name))
            .unwrap_or(versioned)
    }

    fn reindex(&mut self) {
        self.by_uri.clear();
        for (index, entry) in self.entries.iter().enumerate() {
            self.by_uri.entry(entry.uri.clone()).or_default().push(index);
        }
    }
}

/// Whether `name` can be a package directory directly under the
/// repository root.
pub(crate) fn is_safe_dir_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.chars().any(|c| c.is_whitespace() || c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "http://example.org/lib/hello";

    fn sample() -> Manifest {
        Manifest::from_entries(vec![
            ManifestEntry::new("hello", HELLO, "1.1"),
            ManifestEntry::new("other", "http://example.org/lib/other", "3.0"),
            ManifestEntry::new("hello-1.2", HELLO, "1.2"),
        ])
        .unwrap()
    }

    #[test]
    fn test_versions_of_keeps_order() {
        let manifest = sample();
        let versions: Vec<&str> = manifest
            .versions_of(HELLO)
            .map(|e| e.version.as_str())
            .collect();
        assert_eq!(versions, vec!["1.1", "1.2"]);
        assert_eq!(manifest.versions_of("urn:none").count(), 0);
    }

    #[test]
    fn test_duplicate_dir_is_rejected() {
        let err = Manifest::from_entries(vec![
            ManifestEntry::new("hello", HELLO, "1.1"),
            ManifestEntry::new("hello", HELLO, "1.2"),
        ])
        .unwrap_err();
        assert!(err.contains("hello"));
    }

    #[test]
    fn test_unsafe_dir_is_rejected() {
        for dir in ["", "..", ".expath-pkg", "a/b", "a\\b"] {
            assert!(
                Manifest::from_entries(vec![ManifestEntry::new(dir, HELLO, "1.1")]).is_err(),
                "expected '{}' to be rejected",
                dir
            );
        }
    }

    #[test]
    fn test_duplicate_version_is_rejected() {
        assert!(
            Manifest::from_entries(vec![
                ManifestEntry::new("hello", HELLO, "1.1"),
                ManifestEntry::new("hello-1.1", HELLO, "1.1"),
            ])
            .is_err()
        );
    }

    #[test]
    fn test_upsert_appends_new_version() {
        let mut manifest = sample();
        let replaced = manifest.upsert(ManifestEntry::new("hello-1.3", HELLO, "1.3"));
        assert!(replaced.is_none());
        assert_eq!(manifest.len(), 4);
        assert_eq!(manifest.entries()[3].dir, "hello-1.3");
        assert_eq!(manifest.versions_of(HELLO).count(), 3);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut manifest = sample();
        let replaced = manifest.upsert(ManifestEntry::new("hello", HELLO, "1.1"));
        assert_eq!(replaced, Some(ManifestEntry::new("hello", HELLO, "1.1")));
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.entries()[0].dir, "hello");
    }

    #[test]
    fn test_remove_dir_updates_index() {
        let mut manifest = sample();
        let removed = manifest.remove_dir("hello").unwrap();
        assert_eq!(removed.version, "1.1");
        assert!(manifest.find(HELLO, "1.1").is_none());
        assert_eq!(manifest.find(HELLO, "1.2").unwrap().dir, "hello-1.2");
        assert!(manifest.remove_dir("hello").is_none());
    }

    #[test]
    fn test_assign_directory_name() {
        let empty = Manifest::default();
        assert_eq!(empty.assign_directory_name("hello", "1.1", |_| false), "hello");

        let manifest = sample();
        assert_eq!(manifest.assign_directory_name("hello", "1.3", |_| false), "hello-1.3");
        // hello-1.2 is taken by the manifest.
        assert_eq!(manifest.assign_directory_name("hello", "1.2", |_| false), "hello-1.2-2");
        // names taken on disk but unknown to the manifest are skipped too
        assert_eq!(
            empty.assign_directory_name("hello", "1.1", |name| name == "hello"),
            "hello-1.1"
        );
    }
}
