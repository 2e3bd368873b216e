//! Bump-level candidate summary
//!
//! Newer candidates are split into major, minor and patch moves relative to
//! the base version. Each level keeps one representative: the newest, or the
//! nearest for packages updated incrementally. Target selection then walks
//! the levels the update scope allows.

use super::filter::{bump_between, Bump};
use super::version::{ParsedVersion, VersionScheme};
use crate::config::AllowedBump;
use crate::domain::VersionSummary;
use crate::error::ResolveError;
use std::cmp::Ordering;
use std::fmt;

/// How a package picks among newer versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    /// Jump to the newest allowed version
    #[default]
    Newest,
    /// Move to the nearest newer version
    Nearest,
}

/// Widest move a target may make
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateScope {
    Patch,
    Minor,
    Major,
}

impl UpdateScope {
    /// Scope implied by a bump policy
    pub fn from_allowed(allowed: AllowedBump) -> Self {
        if allowed.major {
            UpdateScope::Major
        } else if allowed.minor {
            UpdateScope::Minor
        } else {
            UpdateScope::Patch
        }
    }

    /// Levels tried in order; nearest selection starts with the smallest step
    fn levels(self, selection: Selection) -> &'static [Bump] {
        match (self, selection) {
            (UpdateScope::Major, Selection::Newest) => &[Bump::Major, Bump::Minor, Bump::Patch],
            (UpdateScope::Major, Selection::Nearest) => &[Bump::Patch, Bump::Minor, Bump::Major],
            (UpdateScope::Minor, Selection::Newest) => &[Bump::Minor, Bump::Patch],
            (UpdateScope::Minor, Selection::Nearest) => &[Bump::Patch, Bump::Minor],
            (UpdateScope::Patch, _) => &[Bump::Patch],
        }
    }
}

impl fmt::Display for UpdateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateScope::Patch => write!(f, "patch"),
            UpdateScope::Minor => write!(f, "minor"),
            UpdateScope::Major => write!(f, "major"),
        }
    }
}

/// Representatives per level, borrowed from the candidate list
#[derive(Debug, Clone, Default)]
pub struct LevelCandidates<'a> {
    major: Option<&'a ParsedVersion>,
    minor: Option<&'a ParsedVersion>,
    patch: Option<&'a ParsedVersion>,
}

impl<'a> LevelCandidates<'a> {
    fn slot(&mut self, level: Bump) -> &mut Option<&'a ParsedVersion> {
        match level {
            Bump::Major => &mut self.major,
            Bump::Minor => &mut self.minor,
            Bump::Patch => &mut self.patch,
        }
    }

    /// Representative of one level
    pub fn get(&self, level: Bump) -> Option<&'a ParsedVersion> {
        match level {
            Bump::Major => self.major,
            Bump::Minor => self.minor,
            Bump::Patch => self.patch,
        }
    }

    /// First representative found walking the scope's levels
    pub fn select(
        &self,
        scope: UpdateScope,
        selection: Selection,
    ) -> Result<&'a ParsedVersion, ResolveError> {
        scope
            .levels(selection)
            .iter()
            .find_map(|level| self.get(*level))
            .ok_or_else(|| ResolveError::NoSuitableVersion {
                scope: scope.to_string(),
            })
    }

    /// Raw versions for reporting
    pub fn to_summary(&self) -> VersionSummary {
        VersionSummary {
            major: self.major.map(|v| v.raw.clone()),
            minor: self.minor.map(|v| v.raw.clone()),
            patch: self.patch.map(|v| v.raw.clone()),
        }
    }
}

/// Group candidates newer than `base` by bump level
///
/// Among equals the first seen is kept, so ties follow the command output.
pub fn summarize<'a>(
    base: &ParsedVersion,
    candidates: &'a [ParsedVersion],
    scheme: &VersionScheme,
    selection: Selection,
) -> LevelCandidates<'a> {
    let wanted = match selection {
        Selection::Newest => Ordering::Greater,
        Selection::Nearest => Ordering::Less,
    };
    let mut levels = LevelCandidates::default();
    for candidate in candidates {
        if scheme.compare(candidate, base) != Ordering::Greater {
            continue;
        }
        let slot = levels.slot(bump_between(base, candidate));
        let replace = match *slot {
            Some(current) => scheme.compare(candidate, current) == wanted,
            None => true,
        };
        if replace {
            *slot = Some(candidate);
        }
    }
    levels
}
