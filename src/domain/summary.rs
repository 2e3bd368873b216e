//! Run summary types
//!
//! Provides per-status counts so the CLI can derive its exit code without
//! re-implementing any classification logic.

use super::{InstallStatus, Package, UpdateStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Exit code for a clean run
pub const EXIT_OK: u8 = 0;
/// Exit code when preflight validation aborted the run
pub const EXIT_VALIDATION_FAILED: u8 = 1;
/// Exit code when at least one package failed
pub const EXIT_PACKAGE_FAILURES: u8 = 2;

/// Counts of packages by status
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Total packages evaluated
    pub total: usize,
    /// Count per update status
    pub by_update_status: BTreeMap<UpdateStatus, usize>,
    /// Count per install status
    pub by_install_status: BTreeMap<InstallStatus, usize>,
    /// Packages without an update decision
    pub undecided: usize,
    /// Number of preflight validation errors
    pub validation_errors: usize,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// When the run started
    pub started_at: Option<DateTime<Utc>>,
    /// When the run finished
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    /// Creates an empty summary
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Builds a summary from evaluated packages
    pub fn from_packages(packages: &[Package], dry_run: bool) -> Self {
        let mut summary = Self::new(dry_run);
        for pkg in packages {
            summary.record(pkg);
        }
        summary
    }

    /// Adds one package to the counts
    pub fn record(&mut self, pkg: &Package) {
        self.total += 1;
        *self.by_install_status.entry(pkg.install_status).or_insert(0) += 1;
        match pkg.update_status {
            Some(status) => *self.by_update_status.entry(status).or_insert(0) += 1,
            None => self.undecided += 1,
        }
    }

    /// Marks the run as finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Returns the number of packages with the given update status
    pub fn count(&self, status: UpdateStatus) -> usize {
        self.by_update_status.get(&status).copied().unwrap_or(0)
    }

    /// Returns the number of packages with the given install status
    pub fn count_install(&self, status: InstallStatus) -> usize {
        self.by_install_status.get(&status).copied().unwrap_or(0)
    }

    /// Returns the number of packages in a failure status
    pub fn failures(&self) -> usize {
        self.count(UpdateStatus::Failed) + self.count(UpdateStatus::ConfigError)
    }

    /// Returns true if the run should exit successfully
    pub fn is_success(&self) -> bool {
        self.validation_errors == 0 && self.failures() == 0
    }

    /// Process exit code derived from the counts
    pub fn exit_code(&self) -> u8 {
        if self.validation_errors > 0 {
            EXIT_VALIDATION_FAILED
        } else if self.failures() > 0 {
            EXIT_PACKAGE_FAILURES
        } else {
            EXIT_OK
        }
    }
}
