//! Version list parsing
//!
//! Turns the stdout of an outdated command into raw version strings, in the
//! order the command printed them.

use crate::config::{OutputExtractionCfg, VersionListFormat};
use crate::error::ResolveError;
use crate::extract::find_elements;
use regex::Regex;
use roxmltree::{Document, Node};
use serde_json::Value;
use std::sync::LazyLock;

static VERSION_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[vV]?\d").unwrap());

/// Parse command output into a list of version strings
///
/// Empty output is an empty list, not an error.
pub fn parse_version_list(
    output: &str,
    format: VersionListFormat,
    extraction: &OutputExtractionCfg,
) -> Result<Vec<String>, ResolveError> {
    let output = output.strip_prefix('\u{feff}').unwrap_or(output);
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }

    match format {
        VersionListFormat::Json => {
            let value: Value = serde_json::from_str(output)
                .map_err(|e| ResolveError::parse(format!("invalid JSON: {}", e)))?;
            versions_from_value(&value, extraction.json_key.as_deref())
        }
        VersionListFormat::Yaml => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(output)
                .map_err(|e| ResolveError::parse(format!("invalid YAML: {}", e)))?;
            let value = serde_json::to_value(yaml)
                .map_err(|e| ResolveError::parse(format!("unsupported YAML: {}", e)))?;
            versions_from_value(&value, extraction.json_key.as_deref())
        }
        VersionListFormat::Xml => parse_xml(output, extraction.json_key.as_deref()),
        VersionListFormat::Raw => parse_raw(output, extraction.pattern.as_deref()),
    }
}

/// Text of the elements at `path`, or of every `<version>` element
///
/// A matched element without text contributes the text of its children, so
/// `metadata/versioning/versions` lists each nested `<version>`.
fn parse_xml(output: &str, path: Option<&str>) -> Result<Vec<String>, ResolveError> {
    let doc = Document::parse(output)
        .map_err(|e| ResolveError::parse(format!("invalid XML: {}", e)))?;
    let nodes: Vec<Node<'_, '_>> = match path.map(str::trim).filter(|p| !p.is_empty()) {
        Some(path) => {
            let found = find_elements(doc.root_element(), path);
            if found.is_empty() {
                return Err(ResolveError::parse(format!("element '{}' not found", path)));
            }
            found
        }
        None => doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "version")
            .collect(),
    };

    Ok(nodes
        .iter()
        .flat_map(|node| match element_text(node) {
            Some(text) => vec![text],
            None => node
                .children()
                .filter(Node::is_element)
                .filter_map(|child| element_text(&child))
                .collect(),
        })
        .collect())
}

fn element_text(node: &Node<'_, '_>) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn parse_raw(output: &str, pattern: Option<&str>) -> Result<Vec<String>, ResolveError> {
    match pattern {
        Some(pattern) => {
            let re = Regex::new(pattern)
                .map_err(|e| ResolveError::parse(format!("invalid extraction pattern: {}", e)))?;
            Ok(re
                .captures_iter(output)
                .filter_map(|caps| caps.name("version").or_else(|| caps.get(1)))
                .map(|m| m.as_str().trim().to_string())
                .filter(|v| !v.is_empty())
                .collect())
        }
        None => Ok(output
            .split(|c: char| c.is_whitespace() || c == ',')
            .map(|t| t.trim_matches(|c| c == '"' || c == '\''))
            .filter(|t| VERSION_TOKEN.is_match(t))
            .map(str::to_string)
            .collect()),
    }
}

fn versions_from_value(value: &Value, key: Option<&str>) -> Result<Vec<String>, ResolveError> {
    let target = match key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(path) => lookup_path(value, path)
            .ok_or_else(|| ResolveError::parse(format!("key '{}' not found", path)))?,
        None => value,
    };

    match target {
        Value::Array(items) => Ok(items.iter().filter_map(version_of).collect()),
        Value::Object(map) => Ok(map.keys().cloned().collect()),
        Value::String(s) => Ok(vec![s.trim().to_string()]),
        Value::Number(n) => Ok(vec![n.to_string()]),
        Value::Null => Ok(Vec::new()),
        Value::Bool(_) => Err(ResolveError::parse("expected a list of versions")),
    }
}

fn version_of(item: &Value) -> Option<String> {
    let version = match item {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("version").and_then(version_of),
        _ => None,
    };
    version.filter(|v| !v.is_empty())
}

fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
