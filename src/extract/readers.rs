//! Format readers for lock file text
//!
//! Each reader turns raw text into `(name, version)` pairs. Malformed input
//! yields no pairs rather than an error.

use crate::config::{ExtractionCfg, LockFormat};
use regex::Regex;
use roxmltree::{Document, Node};
use serde_json::Value;

const DEFAULT_NAME_ATTR: &str = "id";
const DEFAULT_VERSION_ATTR: &str = "version";

/// Which XML elements and attributes carry lock entries
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlSelect<'a> {
    /// Slash-separated element path; every element is considered when absent
    pub path: Option<&'a str>,
    /// Name attribute, `id` when absent
    pub name_attr: Option<&'a str>,
    /// Version attribute, `version` when absent
    pub version_attr: Option<&'a str>,
}

impl<'a> XmlSelect<'a> {
    /// Selection configured on an extraction spec
    pub fn from_cfg(cfg: &'a ExtractionCfg) -> Self {
        let non_empty = |v: &'a Option<String>| v.as_deref().map(str::trim).filter(|v| !v.is_empty());
        Self {
            path: non_empty(&cfg.path),
            name_attr: non_empty(&cfg.name_attr),
            version_attr: non_empty(&cfg.version_attr),
        }
    }
}

/// Read `(name, version)` pairs from lock text, first occurrence wins
pub fn read_entries(format: LockFormat, content: &str, pattern: Option<&Regex>) -> Vec<(String, String)> {
    read_entries_with(format, content, pattern, XmlSelect::default())
}

/// `read_entries` with an explicit XML selection
pub fn read_entries_with(
    format: LockFormat,
    content: &str,
    pattern: Option<&Regex>,
    xml: XmlSelect<'_>,
) -> Vec<(String, String)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let raw = match (format, pattern) {
        (LockFormat::Text | LockFormat::Json | LockFormat::Xml, Some(re)) => capture_all(re, content),
        (LockFormat::Lines, Some(re)) => content
            .lines()
            .flat_map(|line| capture_all(re, line))
            .collect(),
        (LockFormat::Json, None) => read_json(content),
        (LockFormat::Xml, None) => read_xml(content, xml),
        (_, None) => Vec::new(),
    };

    let mut entries: Vec<(String, String)> = Vec::new();
    for (name, version) in raw {
        let name = normalize_name(&name);
        let version = normalize_version(&version);
        if name.is_empty() || version.is_empty() {
            continue;
        }
        if !entries.iter().any(|(n, _)| *n == name) {
            entries.push((name, version));
        }
    }
    entries
}

fn capture_all(re: &Regex, text: &str) -> Vec<(String, String)> {
    re.captures_iter(text)
        .filter_map(|caps| {
            let name = caps
                .name("name")
                .or_else(|| caps.name("n"))
                .map(|m| m.as_str().to_string())?;
            let version = caps.name("version").map(|m| m.as_str().to_string())?;
            Some((name, version))
        })
        .collect()
}

/// Structured JSON lock reading
///
/// Recognizes, in order: a flat `{name: version}` object, an array of
/// `{name, version}` objects, and nested `dependencies`/`packages` trees.
fn read_json(content: &str) -> Vec<(String, String)> {
    let Ok(value) = serde_json::from_str::<Value>(content) else {
        return Vec::new();
    };
    let mut entries = Vec::new();

    match &value {
        Value::Object(map) if !map.is_empty() && map.values().all(Value::is_string) => {
            for (name, version) in map {
                if let Some(version) = version.as_str() {
                    entries.push((name.clone(), version.to_string()));
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                let name = item.get("name").and_then(Value::as_str);
                let version = item.get("version").and_then(Value::as_str);
                if let (Some(name), Some(version)) = (name, version) {
                    entries.push((name.to_string(), version.to_string()));
                }
                for key in ["dependencies", "devDependencies"] {
                    if let Some(deps) = item.get(key) {
                        collect_nested(deps, &mut entries);
                    }
                }
            }
        }
        Value::Object(map) => {
            if let Some(packages) = map.get("packages").and_then(Value::as_object) {
                for (path, info) in packages {
                    if path.is_empty() {
                        continue;
                    }
                    if let Some(version) = info.get("version").and_then(Value::as_str) {
                        entries.push((path.clone(), version.to_string()));
                    }
                }
            }
            if let Some(deps) = map.get("dependencies") {
                collect_nested(deps, &mut entries);
            }
        }
        _ => {}
    }

    entries
}

fn collect_nested(deps: &Value, entries: &mut Vec<(String, String)>) {
    let Some(deps) = deps.as_object() else {
        return;
    };
    for (name, info) in deps {
        if let Some(version) = info.get("version").and_then(Value::as_str) {
            entries.push((name.clone(), version.to_string()));
        }
        if let Some(nested) = info.get("dependencies") {
            collect_nested(nested, entries);
        }
    }
}

/// Structured XML lock reading
///
/// Elements under `path` (or anywhere) that carry both attributes become
/// entries. When nothing matches, MSBuild `PackageReference` items are read
/// from `Include` and a `Version` attribute or child element.
fn read_xml(content: &str, select: XmlSelect<'_>) -> Vec<(String, String)> {
    let Ok(doc) = Document::parse(content) else {
        return Vec::new();
    };
    let name_attr = select.name_attr.unwrap_or(DEFAULT_NAME_ATTR);
    let version_attr = select.version_attr.unwrap_or(DEFAULT_VERSION_ATTR);

    let nodes: Vec<Node<'_, '_>> = match select.path {
        Some(path) => find_elements(doc.root_element(), path),
        None => doc.descendants().filter(Node::is_element).collect(),
    };
    let entries: Vec<(String, String)> = nodes
        .iter()
        .filter_map(|node| {
            let name = xml_value(node, name_attr)?;
            let version = xml_value(node, version_attr)?;
            Some((name, version))
        })
        .collect();
    if !entries.is_empty() {
        return entries;
    }

    doc.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "PackageReference")
        .filter_map(|node| {
            let name = xml_value(&node, "Include")?;
            let version = xml_value(&node, "Version")?;
            Some((name, version))
        })
        .collect()
}

/// Elements reached by a slash-separated path; the root name may lead the path
pub(crate) fn find_elements<'a, 'i>(root: Node<'a, 'i>, path: &str) -> Vec<Node<'a, 'i>> {
    let segments: Vec<&str> = path
        .split(['/', '.'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let rest = match segments.split_first() {
        Some((first, rest)) if *first == root.tag_name().name() => rest,
        _ => &segments[..],
    };
    rest.iter().fold(vec![root], |current, segment| {
        current
            .iter()
            .flat_map(|node| node.children())
            .filter(|child| child.is_element() && child.tag_name().name() == *segment)
            .collect()
    })
}

/// Attribute value, or the text of a child element of that name
fn xml_value(node: &Node<'_, '_>, name: &str) -> Option<String> {
    node.attribute(name)
        .or_else(|| {
            node.children()
                .find(|c| c.is_element() && c.tag_name().name() == name)
                .and_then(|c| c.text())
        })
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Strip `node_modules/` prefixes and a `/go.mod` suffix
pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    let trimmed = match trimmed.rfind("node_modules/") {
        Some(idx) => &trimmed[idx + "node_modules/".len()..],
        None => trimmed,
    };
    trimmed.trim_end_matches("/go.mod").to_string()
}

/// Trim whitespace and a `/go.mod` suffix
pub fn normalize_version(version: &str) -> String {
    version.trim().trim_end_matches("/go.mod").to_string()
}
