//! Minimal namespace-aware element walker over `quick-xml` events.
//!
//! Both the package descriptor and the structured manifest are shallow
//! documents, so they are read into a flat list of elements (document
//! order, with depth) instead of a tree.

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct XmlElement {
    /// 0 for the root element.
    pub depth: usize,
    pub namespace: Option<String>,
    pub name: String,
    /// Attributes other than namespace declarations, values unescaped.
    pub attributes: Vec<(String, String)>,
    /// Concatenated direct text content, trimmed.
    pub text: String,
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.name == name
    }
}

pub(crate) fn parse_elements(xml: &str) -> Result<Vec<XmlElement>, String> {
    let mut reader = NsReader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut elements: Vec<XmlElement> = Vec::new();
    // indices into `elements` of the open elements
    let mut open: Vec<usize> = Vec::new();

    loop {
        let event = match reader.read_resolved_event_into(&mut buf) {
            Ok(event) => event,
            Err(e) => {
                return Err(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                ));
            }
        };
        match event {
            (ns, Event::Start(e)) => {
                elements.push(read_element(&e, ns, open.len())?);
                open.push(elements.len() - 1);
            }
            (ns, Event::Empty(e)) => {
                elements.push(read_element(&e, ns, open.len())?);
            }
            (_, Event::End(_)) => {
                open.pop();
            }
            (_, Event::Text(t)) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                append_text(&mut elements, &open, &text);
            }
            (_, Event::CData(t)) => {
                let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                append_text(&mut elements, &open, &text);
            }
            (_, Event::Eof) => break,
            _ => {}
        }
        buf.clear();
    }

    if !open.is_empty() {
        return Err("unexpected end of document".to_string());
    }
    if elements.is_empty() {
        return Err("document has no root element".to_string());
    }
    Ok(elements)
}

pub(crate) fn escape(value: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(value)
}

fn append_text(elements: &mut [XmlElement], open: &[usize], text: &str) {
    if let Some(&index) = open.last() {
        let element = &mut elements[index];
        if !element.text.is_empty() {
            element.text.push(' ');
        }
        element.text.push_str(text.trim());
    }
}

fn utf8(bytes: &[u8]) -> Result<String, String> {
    std::str::from_utf8(bytes)
        .map(String::from)
        .map_err(|e| e.to_string())
}

fn read_element(
    e: &BytesStart<'_>,
    namespace: ResolveResult<'_>,
    depth: usize,
) -> Result<XmlElement, String> {
    let namespace = match namespace {
        ResolveResult::Bound(ns) => Some(utf8(ns.as_ref())?),
        ResolveResult::Unbound => None,
        ResolveResult::Unknown(prefix) => {
            return Err(format!("unknown namespace prefix '{}'", utf8(&prefix)?));
        }
    };

    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|err| err.to_string())?
            .into_owned();
        attributes.push((utf8(attr.key.as_ref())?, value));
    }

    Ok(XmlElement {
        depth,
        namespace,
        name: utf8(e.local_name().as_ref())?,
        attributes,
        text: String::new(),
    })
}
