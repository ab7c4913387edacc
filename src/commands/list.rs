use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::repository::{Manifest, Repository};
use crate::runtime::Runtime;

use super::paths::resolve_repo_root;

/// List installed packages
#[tracing::instrument(skip(runtime, repo_root))]
pub fn list<R: Runtime>(runtime: &R, repo_root: Option<PathBuf>, json: bool) -> Result<()> {
    let root = resolve_repo_root(runtime, repo_root)?;
    let manifest = Repository::new(runtime, root).packages()?;
    debug!("Found {} package(s)", manifest.len());
    print!("{}", render_list(&manifest, json)?);
    Ok(())
}

/// Text printed by `list`: one `uri version (dir)` line per package, or a
/// JSON array of manifest entries.
pub fn render_list(manifest: &Manifest, json: bool) -> Result<String> {
    if json {
        let mut out = serde_json::to_string_pretty(manifest.entries())?;
        out.push('\n');
        return Ok(out);
    }
    if manifest.is_empty() {
        return Ok("No packages installed.\n".to_string());
    }
    Ok(manifest
        .entries()
        .iter()
        .map(|e| format!("{} {} ({})\n", e.uri, e.version, e.dir))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::ManifestEntry;

    fn sample() -> Manifest {
        Manifest::from_entries(vec![
            ManifestEntry::new("hello", "http://example.org/lib/hello", "1.1"),
            ManifestEntry::new("hello-1.2", "http://example.org/lib/hello", "1.2"),
        ])
        .unwrap()
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(
            render_list(&Manifest::default(), false).unwrap(),
            "No packages installed.\n"
        );
        assert_eq!(render_list(&Manifest::default(), true).unwrap(), "[]\n");
    }

    #[test]
    fn test_render_text() {
        assert_eq!(
            render_list(&sample(), false).unwrap(),
            "http://example.org/lib/hello 1.1 (hello)\nhttp://example.org/lib/hello 1.2 (hello-1.2)\n"
        );
    }

    #[test]
    fn test_render_json() {
        let out = render_list(&sample(), true).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[1]["dir"], "hello-1.2");
        assert_eq!(parsed[0]["uri"], "http://example.org/lib/hello");
        assert_eq!(parsed[0]["version"], "1.1");
    }
}
