//! Package records evaluated during a run

use super::{InstallStatus, UpdateStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One dependency instance under evaluation
///
/// Discovery collaborators fill in `name`, `rule`, `package_type` and
/// `declared_constraint`; the run fills in everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package name
    pub name: String,
    /// Name of the rule that governs this package
    pub rule: String,
    /// Ecosystem tag (e.g. "js", "golang")
    #[serde(default, rename = "type")]
    pub package_type: String,
    /// Raw version specifier from the manifest
    #[serde(default, rename = "constraint")]
    pub declared_constraint: String,
    /// Resolved concrete installed version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,
    /// How the installed version was determined
    #[serde(default = "default_install_status")]
    pub install_status: InstallStatus,
    /// Selected target version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    /// Newer versions per bump level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<VersionSummary>,
    /// Update decision, absent when no decision could be made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_status: Option<UpdateStatus>,
    /// Explicit atomic update group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Directory commands run in (defaults to the run's root)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Failure detail for reporting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Representative newer version at each bump level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    /// Higher major
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    /// Same major, higher minor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<String>,
    /// Same major.minor, newer patch or pre-release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

impl VersionSummary {
    /// Returns true if no level has a newer version
    pub fn is_empty(&self) -> bool {
        self.major.is_none() && self.minor.is_none() && self.patch.is_none()
    }
}

impl fmt::Display for VersionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let levels = [("major", &self.major), ("minor", &self.minor), ("patch", &self.patch)];
        let parts: Vec<String> = levels
            .iter()
            .filter_map(|(label, v)| v.as_ref().map(|v| format!("{} {}", label, v)))
            .collect();
        if parts.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

fn default_install_status() -> InstallStatus {
    InstallStatus::NotConfigured
}

impl Package {
    /// Creates a new package in its initial state
    pub fn new(
        name: impl Into<String>,
        rule: impl Into<String>,
        package_type: impl Into<String>,
        declared_constraint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            rule: rule.into(),
            package_type: package_type.into(),
            declared_constraint: declared_constraint.into(),
            installed_version: None,
            install_status: InstallStatus::NotConfigured,
            latest_version: None,
            available: None,
            update_status: None,
            group: None,
            working_dir: None,
            error: None,
        }
    }

    /// Sets the atomic update group (builder pattern)
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Sets the working directory (builder pattern)
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets a known installed version (builder pattern)
    pub fn with_installed(mut self, version: impl Into<String>) -> Self {
        self.installed_version = Some(version.into());
        self.install_status = InstallStatus::Installed;
        self
    }

    /// Version used as the comparison base: installed, otherwise the declared pin
    pub fn current_version(&self) -> Option<&str> {
        self.installed_version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
    }

    /// Records a terminal failure
    pub fn fail(&mut self, status: UpdateStatus, message: impl Into<String>) {
        self.update_status = Some(status);
        self.error = Some(message.into());
    }

    /// Returns true if the package ended in a failure status
    pub fn is_failure(&self) -> bool {
        self.update_status.map(|s| s.is_failure()).unwrap_or(false)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.declared_constraint.is_empty() {
            write!(f, "{} [{}]", self.name, self.rule)
        } else {
            write!(f, "{}@{} [{}]", self.name, self.declared_constraint, self.rule)
        }
    }
}
