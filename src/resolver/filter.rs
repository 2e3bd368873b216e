//! Candidate filters
//!
//! Exclusions, the constraint filter and the bump filter. Every filter keeps
//! the relative order of its input.

use super::constraint::Constraint;
use super::version::{ParsedVersion, VersionScheme};
use crate::config::AllowedBump;
use crate::context::LogContext;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

/// Pre-release pattern applied unless a rule opts in to pre-releases
pub const DEFAULT_PRERELEASE_PATTERN: &str = r"(?i)(?:^|[._\-/])((?:alpha|beta|rc|canary|dev|snapshot|nightly|preview)(?:[._\-/]?[0-9A-Za-z]+)*)(?:\+[^\s]*)?$";

static PRERELEASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_PRERELEASE_PATTERN).unwrap());

/// Compiled exclusion rules for one rule
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    exact: Vec<String>,
    patterns: Vec<Regex>,
    skip_prereleases: bool,
}

impl Exclusions {
    /// Compile exclusions; invalid patterns are reported and skipped
    pub fn new(
        exact: impl IntoIterator<Item = String>,
        patterns: &[String],
        include_prereleases: bool,
        ctx: &LogContext,
    ) -> Self {
        let compiled = patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    ctx.warn(&format!("ignoring invalid exclusion pattern '{}': {}", p, e));
                    None
                }
            })
            .collect();
        Self {
            exact: exact.into_iter().map(|v| v.trim().to_string()).collect(),
            patterns: compiled,
            skip_prereleases: !include_prereleases,
        }
    }

    /// Returns true if the raw version is excluded
    pub fn excludes(&self, raw: &str) -> bool {
        let raw = raw.trim();
        self.exact.iter().any(|e| e == raw)
            || self.patterns.iter().any(|re| re.is_match(raw))
            || (self.skip_prereleases && is_prerelease(raw))
    }

    /// Drop excluded versions, logging before/after counts
    pub fn apply(&self, versions: Vec<String>, ctx: &LogContext) -> Vec<String> {
        let before = versions.len();
        let kept: Vec<String> = versions.into_iter().filter(|v| !self.excludes(v)).collect();
        debug!(before, after = kept.len(), "version exclusions applied");
        if before != kept.len() {
            ctx.verbose(&format!(
                "Exclusions: {} -> {} candidate versions",
                before,
                kept.len()
            ));
        }
        kept
    }
}

/// Returns true if the version carries a pre-release marker
pub fn is_prerelease(raw: &str) -> bool {
    PRERELEASE.is_match(raw.trim())
}

/// Parse, drop unusable entries and dedupe by normalized key
pub fn parse_candidates(raw: &[String], scheme: &VersionScheme) -> Vec<ParsedVersion> {
    let mut seen = HashSet::new();
    raw.iter()
        .enumerate()
        .filter_map(|(i, v)| scheme.parse_at(v, Some(i)))
        .filter(|v| !scheme.requires_numbers() || v.has_numbers())
        .filter(|v| seen.insert(v.key.clone()))
        .collect()
}

/// Keep candidates allowed by the declared constraint
///
/// An exact pin is a floor: the pinned version and anything newer pass.
pub fn constraint_filter(
    candidates: Vec<ParsedVersion>,
    constraint: &Constraint,
    scheme: &VersionScheme,
) -> Vec<ParsedVersion> {
    if constraint.is_any() {
        return candidates;
    }
    if let Some(pin) = constraint.exact_pin() {
        let Some(floor) = scheme.parse(pin) else {
            return candidates;
        };
        return candidates
            .into_iter()
            .filter(|c| scheme.compare(c, &floor) != Ordering::Less)
            .collect();
    }
    candidates
        .into_iter()
        .filter(|c| constraint.matches(c, scheme))
        .collect()
}

/// How far a candidate moves from the base version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bump {
    /// Higher major
    Major,
    /// Same major, higher minor
    Minor,
    /// Same major.minor
    Patch,
}

/// Classify the move from `base` to a newer `candidate`
pub fn bump_between(base: &ParsedVersion, candidate: &ParsedVersion) -> Bump {
    match (base.parts, candidate.parts) {
        (Some((bm, bn, _)), Some((cm, cn, _))) => {
            if cm != bm {
                Bump::Major
            } else if cn != bn {
                Bump::Minor
            } else {
                Bump::Patch
            }
        }
        _ => Bump::Major,
    }
}

/// Drop candidates whose bump from `base` is not allowed
///
/// Candidates not newer than `base` are kept; selection discards them later.
pub fn bump_filter(
    candidates: Vec<ParsedVersion>,
    base: Option<&ParsedVersion>,
    allowed: AllowedBump,
    scheme: &VersionScheme,
) -> Vec<ParsedVersion> {
    let Some(base) = base else {
        return candidates;
    };
    if allowed.major && allowed.minor && allowed.patch {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|c| {
            if scheme.compare(c, base) != Ordering::Greater {
                return true;
            }
            match bump_between(base, c) {
                Bump::Major => allowed.major,
                Bump::Minor => allowed.minor,
                Bump::Patch => allowed.patch,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SortStrategy;

    fn scheme() -> VersionScheme {
        VersionScheme::for_strategy(SortStrategy::Semver)
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn raws(v: &[ParsedVersion]) -> Vec<&str> {
        v.iter().map(|p| p.raw.as_str()).collect()
    }

    #[test]
    fn test_prerelease_detection() {
        for v in ["1.0.0-rc.1", "2.0.0-beta", "3.0.0.dev1", "4.0-SNAPSHOT", "5.0.0-canary.3+sha"] {
            assert!(is_prerelease(v), "expected prerelease: {v}");
        }
        for v in ["1.0.0", "2.1", "v3.0.0", "1.0.0+build.7"] {
            assert!(!is_prerelease(v), "expected release: {v}");
        }
    }

    #[test]
    fn test_exclusions() {
        let ctx = LogContext::silent();
        let exclusions = Exclusions::new(
            strings(&["1.0.1"]),
            &strings(&[r"^2\."]),
            false,
            &ctx,
        );
        let kept = exclusions.apply(
            strings(&["1.0.0", "1.0.1", "2.0.0", "1.1.0-beta.1", "1.1.0"]),
            &ctx,
        );
        assert_eq!(kept, strings(&["1.0.0", "1.1.0"]));
    }

    #[test]
    fn test_include_prereleases() {
        let ctx = LogContext::silent();
        let exclusions = Exclusions::new(Vec::new(), &[], true, &ctx);
        assert!(!exclusions.excludes("1.1.0-beta.1"));
    }

    #[test]
    fn test_invalid_exclusion_pattern_is_warned_and_skipped() {
        let buffer = crate::context::SharedBuffer::default();
        let ctx = LogContext::new(buffer.clone(), crate::context::Verbosity::Normal);
        let exclusions = Exclusions::new(Vec::new(), &strings(&["(unclosed"]), true, &ctx);
        assert!(!exclusions.excludes("1.0.0"));
        assert!(buffer.contents().contains("invalid exclusion pattern"));
    }

    #[test]
    fn test_parse_candidates_dedupes_first_seen() {
        let parsed = parse_candidates(&strings(&["v1.2", "1.2.0", "latest", "1.3.0"]), &scheme());
        assert_eq!(raws(&parsed), vec!["v1.2", "1.3.0"]);
    }

    #[test]
    fn test_exact_pin_is_floor() {
        let s = scheme();
        let candidates = parse_candidates(&strings(&["1.0.0", "1.2.3", "1.4.0", "2.0.0"]), &s);
        let constraint = Constraint::parse("1.2.3").unwrap();
        let kept = constraint_filter(candidates, &constraint, &s);
        assert_eq!(raws(&kept), vec!["1.2.3", "1.4.0", "2.0.0"]);
    }

    #[test]
    fn test_caret_filter() {
        let s = scheme();
        let candidates = parse_candidates(&strings(&["1.0.0", "1.5.0", "2.0.0"]), &s);
        let constraint = Constraint::parse("^1.2.0").unwrap();
        let kept = constraint_filter(candidates, &constraint, &s);
        assert_eq!(raws(&kept), vec!["1.5.0"]);
    }

    #[test]
    fn test_bump_filter() {
        let s = scheme();
        let base = s.parse("1.2.3").unwrap();
        let candidates = parse_candidates(&strings(&["1.2.4", "1.3.0", "2.0.0", "1.0.0"]), &s);

        let kept = bump_filter(candidates.clone(), Some(&base), AllowedBump::patch_only(), &s);
        assert_eq!(raws(&kept), vec!["1.2.4", "1.0.0"]);

        let kept = bump_filter(
            candidates.clone(),
            Some(&base),
            AllowedBump::minor_and_patch(),
            &s,
        );
        assert_eq!(raws(&kept), vec!["1.2.4", "1.3.0", "1.0.0"]);

        let no_patch = AllowedBump {
            major: true,
            minor: true,
            patch: false,
        };
        let kept = bump_filter(candidates, Some(&base), no_patch, &s);
        assert_eq!(raws(&kept), vec!["1.3.0", "2.0.0", "1.0.0"]);
    }

    #[test]
    fn test_bump_between() {
        let s = scheme();
        let base = s.parse("1.2.3").unwrap();
        assert_eq!(bump_between(&base, &s.parse("2.0.0").unwrap()), Bump::Major);
        assert_eq!(bump_between(&base, &s.parse("1.3.0").unwrap()), Bump::Minor);
        assert_eq!(bump_between(&base, &s.parse("1.2.9").unwrap()), Bump::Patch);
    }
}
