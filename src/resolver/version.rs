//! Version parsing and ordering
//!
//! Provides `VersionScheme`, which parses raw version strings according to a
//! rule's `SortStrategy` and compares them. The comparison is a total order
//! for a given scheme, so sorting and "highest wins" selection are
//! reproducible for identical inputs.

use crate::config::{SortOrder, SortStrategy};
use crate::error::ResolveError;
use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

/// Default pattern for numeric version parts
pub const DEFAULT_VERSION_REGEX: &str =
    r"(?i)(?P<major>\d+)(?:[._-]?(?P<minor>\d+))?(?:[._-]?(?P<patch>\d+))?";

static DEFAULT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_VERSION_REGEX).unwrap());

/// A version string parsed under a scheme
#[derive(Debug, Clone)]
pub struct ParsedVersion {
    /// Original text (trimmed)
    pub raw: String,
    /// Normalized key used for deduplication
    pub key: String,
    /// Strict semantic version, when the text is semver-like
    pub semver: Option<semver::Version>,
    /// Numeric major/minor/patch
    pub parts: Option<(u64, u64, u64)>,
    /// Position in the command output (ordered strategy)
    pub position: Option<usize>,
}

impl ParsedVersion {
    /// Major version number
    pub fn major(&self) -> Option<u64> {
        self.parts.map(|p| p.0)
    }

    /// Major and minor version numbers
    pub fn major_minor(&self) -> Option<(u64, u64)> {
        self.parts.map(|p| (p.0, p.1))
    }

    /// Returns true if numeric parts are known
    pub fn has_numbers(&self) -> bool {
        self.parts.is_some()
    }
}

/// Parsing and ordering rules for one rule's versions
#[derive(Debug, Clone)]
pub struct VersionScheme {
    strategy: SortStrategy,
    regex: Option<Regex>,
    order: SortOrder,
}

impl VersionScheme {
    /// Build a scheme, compiling the optional custom regex
    pub fn new(
        strategy: SortStrategy,
        custom_regex: Option<&str>,
        order: SortOrder,
    ) -> Result<Self, ResolveError> {
        let regex = match custom_regex.map(str::trim).filter(|r| !r.is_empty()) {
            Some(pattern) => Some(
                Regex::new(pattern)
                    .map_err(|e| ResolveError::parse(format!("invalid version regex: {}", e)))?,
            ),
            None => None,
        };
        Ok(Self {
            strategy,
            regex,
            order,
        })
    }

    /// Scheme for a strategy with default parsing
    pub fn for_strategy(strategy: SortStrategy) -> Self {
        Self {
            strategy,
            regex: None,
            order: SortOrder::Desc,
        }
    }

    /// The strategy in use
    pub fn strategy(&self) -> SortStrategy {
        self.strategy
    }

    /// Returns true if candidates must carry numeric parts to be comparable
    pub fn requires_numbers(&self) -> bool {
        matches!(self.strategy, SortStrategy::Semver | SortStrategy::Numeric)
    }

    /// Parse a version; `None` for empty or placeholder text
    pub fn parse(&self, raw: &str) -> Option<ParsedVersion> {
        self.parse_at(raw, None)
    }

    /// Parse a version found at `position` in the command output
    pub fn parse_at(&self, raw: &str, position: Option<usize>) -> Option<ParsedVersion> {
        let cleaned = raw.trim();
        if cleaned.is_empty() || cleaned == "#N/A" {
            return None;
        }

        let semver = match self.strategy {
            SortStrategy::Semver | SortStrategy::Ordered if self.regex.is_none() => {
                loose_semver(cleaned)
            }
            _ => None,
        };
        let parts = match &semver {
            Some(v) => Some((v.major, v.minor, v.patch)),
            None => self.extract_parts(cleaned),
        };
        let key = match &semver {
            Some(v) => v.to_string(),
            None => normalize_loose(cleaned),
        };

        Some(ParsedVersion {
            raw: cleaned.to_string(),
            key,
            semver,
            parts,
            position,
        })
    }

    fn extract_parts(&self, version: &str) -> Option<(u64, u64, u64)> {
        let regex = self.regex.as_ref().unwrap_or(&DEFAULT_REGEX);

        let mut best: Option<(usize, usize, regex::Captures<'_>)> = None;
        for caps in regex.captures_iter(version) {
            let score = ["major", "minor", "patch"]
                .iter()
                .filter(|g| caps.name(g).is_some())
                .count();
            let len = caps.get(0).map(|m| m.len()).unwrap_or(0);
            let better = match &best {
                None => true,
                Some((s, l, _)) => score > *s || (score == *s && len > *l),
            };
            if better {
                best = Some((score, len, caps));
            }
        }

        let (_, _, caps) = best?;
        let group = |name: &str, index: usize| -> Option<u64> {
            caps.name(name)
                .or_else(|| caps.get(index))
                .and_then(|m| m.as_str().parse().ok())
        };
        let major = group("major", 1)?;
        Some((major, group("minor", 2).unwrap_or(0), group("patch", 3).unwrap_or(0)))
    }

    /// Total order between two parsed versions (greater = newer)
    pub fn compare(&self, a: &ParsedVersion, b: &ParsedVersion) -> Ordering {
        match self.strategy {
            SortStrategy::Lexical => a.key.cmp(&b.key),
            SortStrategy::Ordered => match (a.position, b.position) {
                (Some(pa), Some(pb)) => match self.order {
                    SortOrder::Desc => pb.cmp(&pa),
                    SortOrder::Asc => pa.cmp(&pb),
                },
                _ => compare_numeric(a, b),
            },
            SortStrategy::Semver | SortStrategy::Numeric => compare_numeric(a, b),
        }
    }
}

fn compare_numeric(a: &ParsedVersion, b: &ParsedVersion) -> Ordering {
    if let (Some(va), Some(vb)) = (&a.semver, &b.semver) {
        return va.cmp_precedence(vb).then_with(|| a.key.cmp(&b.key));
    }
    if let (Some(pa), Some(pb)) = (a.parts, b.parts) {
        let ordering = pa.cmp(&pb);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.key.cmp(&b.key)
}

/// Parse `v1.2`, `1.2.3-rc.1+build` and friends into a semantic version
pub fn loose_semver(raw: &str) -> Option<semver::Version> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    if let Ok(version) = semver::Version::parse(stripped) {
        return Some(version);
    }

    let (without_build, build) = match stripped.split_once('+') {
        Some((v, b)) => (v, Some(b)),
        None => (stripped, None),
    };
    let (core, pre) = match without_build.split_once('-') {
        Some((c, p)) => (c, Some(p)),
        None => (without_build, None),
    };

    let numbers: Vec<&str> = core.split('.').collect();
    if numbers.is_empty()
        || numbers.len() > 3
        || numbers
            .iter()
            .any(|n| n.is_empty() || !n.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let mut padded = numbers
        .iter()
        .map(|n| n.trim_start_matches('0'))
        .map(|n| if n.is_empty() { "0" } else { n })
        .collect::<Vec<_>>();
    while padded.len() < 3 {
        padded.push("0");
    }

    let mut text = padded.join(".");
    if let Some(pre) = pre {
        text.push('-');
        text.push_str(pre);
    }
    if let Some(build) = build {
        text.push('+');
        text.push_str(build);
    }
    semver::Version::parse(&text).ok()
}

/// Lowercase and strip a `v` prefix that precedes a digit
pub fn normalize_loose(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    let stripped = match (chars.next(), chars.next()) {
        (Some('v' | 'V'), Some(d)) if d.is_ascii_digit() => &trimmed[1..],
        _ => trimmed,
    };
    stripped.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn semver_scheme() -> VersionScheme {
        VersionScheme::for_strategy(SortStrategy::Semver)
    }

    #[test]
    fn test_loose_semver() {
        assert_eq!(loose_semver("1.2.3").unwrap().to_string(), "1.2.3");
        assert_eq!(loose_semver("v1.2").unwrap().to_string(), "1.2.0");
        assert_eq!(loose_semver("2").unwrap().to_string(), "2.0.0");
        assert_eq!(loose_semver("1.02.3").unwrap().to_string(), "1.2.3");
        assert_eq!(
            loose_semver("1.0-rc.1+build.5").unwrap().to_string(),
            "1.0.0-rc.1+build.5"
        );
        assert!(loose_semver("1.2.3.4").is_none());
        assert!(loose_semver("latest").is_none());
    }

    #[test]
    fn test_parse_semver_key() {
        let parsed = semver_scheme().parse("v1.2").unwrap();
        assert_eq!(parsed.key, "1.2.0");
        assert_eq!(parsed.parts, Some((1, 2, 0)));
    }

    #[test]
    fn test_parse_empty_and_placeholder() {
        assert!(semver_scheme().parse("  ").is_none());
        assert!(semver_scheme().parse("#N/A").is_none());
    }

    #[test]
    fn test_parse_four_part_version_falls_back_to_regex() {
        let parsed = semver_scheme().parse("6.0.0.1").unwrap();
        assert!(parsed.semver.is_none());
        assert_eq!(parsed.parts, Some((6, 0, 0)));
    }

    #[test]
    fn test_semver_compare() {
        let scheme = semver_scheme();
        let a = scheme.parse("1.9.0").unwrap();
        let b = scheme.parse("1.10.0").unwrap();
        assert_eq!(scheme.compare(&a, &b), Ordering::Less);

        let rc = scheme.parse("2.0.0-rc.1").unwrap();
        let release = scheme.parse("2.0.0").unwrap();
        assert_eq!(scheme.compare(&rc, &release), Ordering::Less);
    }

    #[test]
    fn test_semver_equivalent_forms_compare_equal() {
        let scheme = semver_scheme();
        let a = scheme.parse("v1.2.0").unwrap();
        let b = scheme.parse("1.2").unwrap();
        assert_eq!(scheme.compare(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_numeric_custom_regex() {
        let scheme = VersionScheme::new(
            SortStrategy::Numeric,
            Some(r"release-(?P<major>\d+)_(?P<minor>\d+)"),
            SortOrder::Desc,
        )
        .unwrap();
        let a = scheme.parse("release-3_10").unwrap();
        let b = scheme.parse("release-3_9").unwrap();
        assert_eq!(a.parts, Some((3, 10, 0)));
        assert_eq!(scheme.compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_invalid_custom_regex() {
        let err = VersionScheme::new(SortStrategy::Numeric, Some("(?P<major>"), SortOrder::Desc)
            .unwrap_err();
        assert!(matches!(err, ResolveError::ParseError { .. }));
    }

    #[test]
    fn test_lexical_compare() {
        let scheme = VersionScheme::for_strategy(SortStrategy::Lexical);
        let a = scheme.parse("2024-01").unwrap();
        let b = scheme.parse("2023-12").unwrap();
        assert_eq!(scheme.compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_ordered_compare_desc() {
        let scheme = VersionScheme::for_strategy(SortStrategy::Ordered);
        let newest = scheme.parse_at("jammy", Some(0)).unwrap();
        let older = scheme.parse_at("focal", Some(1)).unwrap();
        assert_eq!(scheme.compare(&newest, &older), Ordering::Greater);
    }

    #[test]
    fn test_ordered_compare_asc() {
        let scheme =
            VersionScheme::new(SortStrategy::Ordered, None, SortOrder::Asc).unwrap();
        let first = scheme.parse_at("a", Some(0)).unwrap();
        let second = scheme.parse_at("b", Some(1)).unwrap();
        assert_eq!(scheme.compare(&second, &first), Ordering::Greater);
    }

    #[test]
    fn test_normalize_loose() {
        assert_eq!(normalize_loose("V2-Beta"), "2-beta");
        assert_eq!(normalize_loose("version"), "version");
    }
}
