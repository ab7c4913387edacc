//! Flat (`packages.txt`) and structured (`packages.xml`) manifest files.
//!
//! Both files list the same entries in the same order. The flat file has
//! one `<dir> <uri> <version>` line per entry; the structured file has one
//! `<package name=".." dir=".." version=".."/>` element per entry.

use super::{Manifest, ManifestEntry};
use crate::xml::{escape, parse_elements};

pub const FLAT_FILE: &str = "packages.txt";
pub const XML_FILE: &str = "packages.xml";

/// Namespace of the structured manifest.
pub const PACKAGES_NS: &str = "http://expath.org/ns/repo/packages";

pub fn render_flat(manifest: &Manifest) -> String {
    manifest
        .entries()
        .iter()
        .map(|e| format!("{} {} {}\n", e.dir, e.uri, e.version))
        .collect()
}

pub fn parse_flat(content: &str) -> Result<Vec<ManifestEntry>, String> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [dir, uri, version] => Ok(ManifestEntry::new(dir, uri, version)),
                _ => Err(format!(
                    "{} line {}: expected '<dir> <uri> <version>', found '{}'",
                    FLAT_FILE,
                    number + 1,
                    line
                )),
            }
        })
        .collect()
}

pub fn render_xml(manifest: &Manifest) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!("<packages xmlns=\"{}\">\n", PACKAGES_NS));
    for e in manifest.entries() {
        out.push_str(&format!(
            "   <package name=\"{}\" dir=\"{}\" version=\"{}\"/>\n",
            escape(&e.uri),
            escape(&e.dir),
            escape(&e.version)
        ));
    }
    out.push_str("</packages>\n");
    out
}

pub fn parse_xml(content: &str) -> Result<Vec<ManifestEntry>, String> {
    let elements = parse_elements(content).map_err(|e| format!("{}: {}", XML_FILE, e))?;
    if !elements[0].is(PACKAGES_NS, "packages") {
        return Err(format!(
            "{}: root element must be {{{}}}packages",
            XML_FILE, PACKAGES_NS
        ));
    }

    elements
        .iter()
        .filter(|e| e.depth == 1 && e.is(PACKAGES_NS, "package"))
        .map(|e| {
            let attr = |name: &str| {
                e.attr(name)
                    .ok_or_else(|| format!("{}: package element lacks '{}'", XML_FILE, name))
            };
            Ok(ManifestEntry::new(attr("dir")?, attr("name")?, attr("version")?))
        })
        .collect()
}
