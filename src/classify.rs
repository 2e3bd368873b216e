//! Status classifier
//!
//! This module provides the package state machine:
//! - Install classification from the extraction outcome, the declared
//!   constraint and the rule's `self_pinning` flag
//! - Update classification from the resolver outcome and the run mode
//! - Terminal transitions for list and update failures
//!
//! The install status is always assigned before the update status.

use crate::config::Rule;
use crate::domain::{InstallStatus, Package, UpdateStatus};
use crate::extract::ExtractionOutcome;
use crate::resolver::{is_floating_with, Resolution, ResolveOutcome};
use serde::{Deserialize, Serialize};

/// What the run does with outdated packages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Report only
    #[default]
    Check,
    /// Report what would be updated
    DryRun,
    /// Run update commands
    Update,
}

/// Assign the install status and installed version
///
/// A version already present on the package (from the input list) counts as
/// installed when the lock files have nothing better.
pub fn classify_install(pkg: &mut Package, rule: &Rule, extraction: &ExtractionOutcome) {
    if let Some(version) = extraction.version() {
        pkg.installed_version = Some(version.to_string());
    }

    if is_floating_with(&pkg.declared_constraint, &rule.floating_exceptions) {
        pkg.install_status = InstallStatus::Floating;
        return;
    }

    if pkg.current_version().is_some() {
        pkg.install_status = InstallStatus::Installed;
        return;
    }

    if rule.self_pinning {
        pkg.installed_version = Some(pinned_version(&pkg.declared_constraint));
        pkg.install_status = InstallStatus::SelfPinned;
        return;
    }

    pkg.install_status = match extraction {
        ExtractionOutcome::NotConfigured => InstallStatus::NotConfigured,
        _ => InstallStatus::VersionMissing,
    };
}

/// Operand of an exact pin (`==1.2.3` -> `1.2.3`)
pub fn pinned_version(constraint: &str) -> String {
    constraint.trim().trim_start_matches('=').trim().to_string()
}

/// Returns true if the package needs the list-versions command
///
/// Floating packages are left to the unsupported tracker and never reach a
/// command.
pub fn needs_resolution(pkg: &Package) -> bool {
    pkg.update_status.is_none() && pkg.install_status.has_version()
}

/// Assign the update status from a resolution
pub fn classify_update(pkg: &mut Package, resolution: &Resolution, mode: RunMode) {
    pkg.latest_version = resolution.target.clone();
    pkg.available = Some(resolution.summary.clone()).filter(|s| !s.is_empty());

    let status = match resolution.outcome.update_status() {
        Some(status) => status,
        None => {
            pkg.update_status = None;
            return;
        }
    };

    // Floating packages are reported, never planned or updated
    if pkg.install_status == InstallStatus::Floating || resolution.is_floating {
        pkg.update_status = Some(status);
        return;
    }

    pkg.update_status = match (status, resolution.outcome, mode) {
        (UpdateStatus::Outdated, ResolveOutcome::UpdateAvailable, RunMode::DryRun) => {
            Some(UpdateStatus::Planned)
        }
        _ => Some(status),
    };
}

/// Returns true if an update command should run for the package
pub fn wants_update(pkg: &Package) -> bool {
    pkg.update_status == Some(UpdateStatus::Outdated)
        && pkg.install_status.has_version()
        && pkg.latest_version.is_some()
        && pkg.latest_version != pkg.installed_version
}

/// Record the result of an update command
pub fn apply_update_result(pkg: &mut Package, result: Result<(), String>) {
    match result {
        Ok(()) => {
            pkg.update_status = Some(UpdateStatus::Updated);
            pkg.error = None;
        }
        Err(message) => pkg.fail(UpdateStatus::Failed, message),
    }
}

/// Outcome of the list-versions step for one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOutcome {
    /// Candidate versions, in output order
    Listed(Vec<String>),
    /// The command exited non-zero or could not be started
    CommandFailed(String),
    /// The command exceeded its timeout
    TimedOut(String),
    /// The output could not be parsed
    ParseFailed(String),
}

/// Apply list failures for the packages of one rule
///
/// When the command failed for every package of the rule, the failure is
/// rule-level and each package gets `SummarizeError`; otherwise failing
/// packages get `Failed`. A timeout is always `Failed` and keeps the rule
/// from being treated as failed as a whole. Parse failures are always
/// `SummarizeError`.
/// Returns the packages whose versions were listed, with their versions.
pub fn apply_list_outcomes<'a>(
    entries: Vec<(&'a mut Package, ListOutcome)>,
) -> Vec<(&'a mut Package, Vec<String>)> {
    let rule_failed = !entries.is_empty()
        && entries
            .iter()
            .all(|(_, outcome)| matches!(outcome, ListOutcome::CommandFailed(_)));

    let mut listed = Vec::new();
    for (pkg, outcome) in entries {
        match outcome {
            ListOutcome::Listed(versions) => listed.push((pkg, versions)),
            ListOutcome::CommandFailed(message) if rule_failed => {
                pkg.fail(UpdateStatus::SummarizeError, message)
            }
            ListOutcome::CommandFailed(message) | ListOutcome::TimedOut(message) => {
                pkg.fail(UpdateStatus::Failed, message)
            }
            ListOutcome::ParseFailed(message) => pkg.fail(UpdateStatus::SummarizeError, message),
        }
    }
    listed
}
