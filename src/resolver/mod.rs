//! Constraint resolver
//!
//! This module provides:
//! - Floating constraint detection and constraint parsing (`constraint`)
//! - Version parsing and ordering strategies (`version`)
//! - Exclusion, constraint and bump filters (`filter`)
//! - Version list parsing of command output (`output`)
//! - Bump-level summary and target selection (`summary`)
//! - `resolve`: picks the target version for one package
//!
//! The pipeline is: exclusions, dedupe, constraint filter, bump filter,
//! then the newer candidates are summarized per bump level and the target
//! is taken from the levels the bump policy allows. Incremental packages
//! take the nearest newer version instead of the newest. Ties keep the order
//! of the command output, so identical inputs always resolve identically.

pub mod constraint;
pub mod filter;
pub mod output;
pub mod summary;
pub mod version;

pub use constraint::{is_floating, is_floating_with, Constraint};
pub use filter::{is_prerelease, Exclusions, DEFAULT_PRERELEASE_PATTERN};
pub use output::parse_version_list;
pub use summary::{summarize, Selection, UpdateScope};
pub use version::{ParsedVersion, VersionScheme};

use crate::config::{
    compile_package_pattern, AllowedBump, Config, OutputExtractionCfg, Rule, VersionListFormat,
};
use crate::context::LogContext;
use crate::domain::{UpdateStatus, VersionSummary};
use crate::error::ResolveError;
use regex::Regex;
use std::cmp::Ordering;
use tracing::debug;

/// Everything the resolver needs from a rule, compiled once per rule
#[derive(Debug, Clone)]
pub struct VersioningPolicy {
    scheme: VersionScheme,
    exclusions: Exclusions,
    allowed_bump: AllowedBump,
    floating_exceptions: Vec<String>,
    format: VersionListFormat,
    extraction: OutputExtractionCfg,
    incremental: Vec<Regex>,
}

impl VersioningPolicy {
    /// Compile the policy of `rule`, merging global exclusions from `config`
    pub fn from_rule(rule: &Rule, config: &Config, ctx: &LogContext) -> Result<Self, ResolveError> {
        let outdated = rule.outdated.clone().unwrap_or_default();
        let scheme = VersionScheme::new(
            rule.sort_strategy,
            outdated.versioning.regex.as_deref(),
            outdated.versioning.sort,
        )?;
        let exact = config
            .exclude_versions
            .iter()
            .chain(rule.exclude_versions.iter())
            .cloned();
        let exclusions = Exclusions::new(
            exact,
            &rule.exclude_version_patterns,
            rule.include_prereleases,
            ctx,
        );

        Ok(Self {
            scheme,
            exclusions,
            allowed_bump: rule.allowed_bump,
            floating_exceptions: rule.floating_exceptions.clone(),
            format: outdated.format,
            extraction: outdated.extraction,
            incremental: compile_incremental(config.incremental_patterns(rule), ctx),
        })
    }

    /// Semver policy with default exclusions, for tests and simple callers
    pub fn semver(ctx: &LogContext) -> Self {
        Self {
            scheme: VersionScheme::for_strategy(Default::default()),
            exclusions: Exclusions::new(Vec::new(), &[], false, ctx),
            allowed_bump: AllowedBump::default(),
            floating_exceptions: Vec::new(),
            format: VersionListFormat::Raw,
            extraction: OutputExtractionCfg::default(),
            incremental: Vec::new(),
        }
    }

    /// Sets the scheme (builder pattern)
    pub fn with_scheme(mut self, scheme: VersionScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sets the bump policy (builder pattern)
    pub fn with_allowed_bump(mut self, allowed_bump: AllowedBump) -> Self {
        self.allowed_bump = allowed_bump;
        self
    }

    /// Sets the exclusions (builder pattern)
    pub fn with_exclusions(mut self, exclusions: Exclusions) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Sets the output format (builder pattern)
    pub fn with_format(mut self, format: VersionListFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the incremental package patterns (builder pattern)
    pub fn with_incremental(mut self, patterns: &[String], ctx: &LogContext) -> Self {
        self.incremental = compile_incremental(patterns.iter(), ctx);
        self
    }

    /// Version scheme in use
    pub fn scheme(&self) -> &VersionScheme {
        &self.scheme
    }

    /// How `package` picks among newer versions
    pub fn selection_for(&self, package: &str) -> Selection {
        if self.incremental.iter().any(|re| re.is_match(package)) {
            Selection::Nearest
        } else {
            Selection::Newest
        }
    }

    /// Returns true if `constraint` is floating under this policy
    pub fn is_floating(&self, constraint: &str) -> bool {
        is_floating_with(constraint, &self.floating_exceptions)
    }

    /// Parse the stdout of the outdated command
    pub fn parse_output(&self, stdout: &str) -> Result<Vec<String>, ResolveError> {
        parse_version_list(stdout, self.format, &self.extraction)
    }
}

/// Invalid patterns are reported and skipped; config validation rejects them first
fn compile_incremental<'a>(patterns: impl Iterator<Item = &'a String>, ctx: &LogContext) -> Vec<Regex> {
    patterns
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .filter_map(|p| match compile_package_pattern(p) {
            Ok(re) => Some(re),
            Err(e) => {
                ctx.warn(&format!("ignoring invalid incremental pattern '{}': {}", p, e));
                None
            }
        })
        .collect()
}

/// What the resolver decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Nothing newer is acceptable
    UpToDate,
    /// A newer acceptable version exists
    UpdateAvailable,
    /// The declared constraint excludes every candidate
    Unsatisfiable,
    /// No installed version to compare against
    NoBaseline,
}

impl ResolveOutcome {
    /// Update status implied by the outcome
    pub fn update_status(&self) -> Option<UpdateStatus> {
        match self {
            ResolveOutcome::UpToDate => Some(UpdateStatus::UpToDate),
            ResolveOutcome::UpdateAvailable | ResolveOutcome::Unsatisfiable => {
                Some(UpdateStatus::Outdated)
            }
            ResolveOutcome::NoBaseline => None,
        }
    }
}

/// Resolver result for one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Selected version (installed when nothing newer applies)
    pub target: Option<String>,
    /// The declared constraint is floating
    pub is_floating: bool,
    /// Decision
    pub outcome: ResolveOutcome,
    /// Newer versions per bump level
    pub summary: VersionSummary,
}

impl Resolution {
    /// Returns true if an automatic update to `target` makes sense
    pub fn has_update(&self) -> bool {
        self.outcome == ResolveOutcome::UpdateAvailable && self.target.is_some()
    }
}

/// Pick the newest acceptable target version for one package
pub fn resolve(
    constraint: &str,
    installed: Option<&str>,
    candidates: &[String],
    policy: &VersioningPolicy,
    ctx: &LogContext,
) -> Resolution {
    resolve_with(constraint, installed, candidates, policy, Selection::Newest, ctx)
}

/// Pick the target version for one package with an explicit selection
pub fn resolve_with(
    constraint: &str,
    installed: Option<&str>,
    candidates: &[String],
    policy: &VersioningPolicy,
    selection: Selection,
    ctx: &LogContext,
) -> Resolution {
    let scheme = &policy.scheme;
    let mut is_floating = policy.is_floating(constraint);
    let parsed_constraint = match Constraint::parse(constraint) {
        Ok(c) => c,
        Err(e) => {
            debug!(constraint, error = %e, "malformed constraint treated as floating");
            ctx.verbose(&format!("{}; treating as floating", e));
            is_floating = true;
            Constraint::any()
        }
    };
    let installed = installed.map(str::trim).filter(|v| !v.is_empty());

    if candidates.is_empty() {
        return Resolution {
            target: installed.map(str::to_string),
            is_floating,
            outcome: ResolveOutcome::UpToDate,
            summary: VersionSummary::default(),
        };
    }

    let kept = policy.exclusions.apply(candidates.to_vec(), ctx);
    let parsed = filter::parse_candidates(&kept, scheme);
    let base = installed.and_then(|v| parse_installed(v, &kept, scheme));

    if parsed.is_empty() {
        return Resolution {
            target: installed.map(str::to_string),
            is_floating,
            outcome: ResolveOutcome::UpToDate,
            summary: VersionSummary::default(),
        };
    }

    let satisfying = filter::constraint_filter(parsed, &parsed_constraint, scheme);
    if satisfying.is_empty() {
        debug!(constraint, "no candidate satisfies the constraint");
        return Resolution {
            target: None,
            is_floating,
            outcome: ResolveOutcome::Unsatisfiable,
            summary: VersionSummary::default(),
        };
    }

    let allowed = filter::bump_filter(satisfying, base.as_ref(), policy.allowed_bump, scheme);

    let Some(base) = base else {
        return Resolution {
            target: highest(&allowed, scheme).map(|b| b.raw.clone()),
            is_floating,
            outcome: ResolveOutcome::NoBaseline,
            summary: VersionSummary::default(),
        };
    };

    let levels = summarize(&base, &allowed, scheme, selection);
    let summary = levels.to_summary();
    let scope = UpdateScope::from_allowed(policy.allowed_bump);
    debug!(
        constraint,
        %scope,
        ?selection,
        major = ?summary.major,
        minor = ?summary.minor,
        patch = ?summary.patch,
        "version candidates"
    );

    match levels.select(scope, selection) {
        Ok(target) => Resolution {
            target: Some(target.raw.clone()),
            is_floating,
            outcome: ResolveOutcome::UpdateAvailable,
            summary,
        },
        Err(e) => {
            debug!(error = %e, "no newer candidate");
            Resolution {
                target: Some(base.raw),
                is_floating,
                outcome: ResolveOutcome::UpToDate,
                summary,
            }
        }
    }
}

/// Highest candidate; the first seen wins among equals
fn highest<'a>(candidates: &'a [ParsedVersion], scheme: &VersionScheme) -> Option<&'a ParsedVersion> {
    candidates.iter().fold(None, |best, candidate| match best {
        Some(b) if scheme.compare(candidate, b) != Ordering::Greater => Some(b),
        _ => Some(candidate),
    })
}

/// Parse the installed version, locating it in the output for ordered lists
fn parse_installed(installed: &str, listed: &[String], scheme: &VersionScheme) -> Option<ParsedVersion> {
    let key = version::normalize_loose(installed);
    let position = listed
        .iter()
        .position(|v| version::normalize_loose(v) == key);
    scheme.parse_at(installed, position)
}
