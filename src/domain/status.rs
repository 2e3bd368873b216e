//! Package status enums
//!
//! `InstallStatus` describes what could be learned about the installed
//! version. `UpdateStatus` is the outcome of the update decision and is
//! only assigned once the install status is known.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the installed version of a package was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    /// A concrete version was extracted from a lock file
    Installed,
    /// The manifest pins the version itself (no separate lock file)
    SelfPinned,
    /// No lock extraction is configured for the rule
    NotConfigured,
    /// The declared constraint does not pin one exact version
    Floating,
    /// No concrete version was recoverable from manifest or lock file
    VersionMissing,
}

impl InstallStatus {
    /// Returns true if an installed version is known
    pub fn has_version(&self) -> bool {
        matches!(self, InstallStatus::Installed | InstallStatus::SelfPinned)
    }

    /// Returns true for statuses routed to the unsupported tracker
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            InstallStatus::NotConfigured | InstallStatus::Floating | InstallStatus::VersionMissing
        )
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            InstallStatus::Installed => "Installed",
            InstallStatus::SelfPinned => "SelfPinned",
            InstallStatus::NotConfigured => "NotConfigured",
            InstallStatus::Floating => "Floating",
            InstallStatus::VersionMissing => "VersionMissing",
        }
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of the update decision for a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    /// No newer acceptable version exists
    UpToDate,
    /// A newer acceptable version exists (or the constraint is unsatisfiable)
    Outdated,
    /// An update would be applied (dry run)
    Planned,
    /// The update command succeeded
    Updated,
    /// A command failed or timed out
    Failed,
    /// The rule cannot be used for this package
    ConfigError,
    /// The version list for the rule could not be obtained or parsed
    SummarizeError,
}

impl UpdateStatus {
    /// All statuses, in reporting order
    pub const ALL: [UpdateStatus; 7] = [
        UpdateStatus::UpToDate,
        UpdateStatus::Outdated,
        UpdateStatus::Planned,
        UpdateStatus::Updated,
        UpdateStatus::Failed,
        UpdateStatus::ConfigError,
        UpdateStatus::SummarizeError,
    ];

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            UpdateStatus::UpToDate => "UpToDate",
            UpdateStatus::Outdated => "Outdated",
            UpdateStatus::Planned => "Planned",
            UpdateStatus::Updated => "Updated",
            UpdateStatus::Failed => "Failed",
            UpdateStatus::ConfigError => "ConfigError",
            UpdateStatus::SummarizeError => "SummarizeError",
        }
    }

    /// Returns true if this status makes the run exit non-zero
    pub fn is_failure(&self) -> bool {
        matches!(self, UpdateStatus::Failed | UpdateStatus::ConfigError)
    }

    /// Returns true if a group failure must not overwrite this status
    pub fn is_sticky(&self) -> bool {
        matches!(self, UpdateStatus::ConfigError | UpdateStatus::SummarizeError)
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
