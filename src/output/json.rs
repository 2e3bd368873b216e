//! JSON output formatter for machine processing
//!
//! This module provides:
//! - JSON serialization of run reports
//! - Per-package records with install/update status and failure detail

use crate::context::Verbosity;
use crate::domain::{Package, RunSummary, UpdateStatus};
use crate::group::GroupOutcome;
use crate::orchestrator::RunReport;
use crate::output::OutputFormatter;
use crate::preflight::ValidateResult;
use crate::supervision::UnsupportedRuleInfo;
use crate::systemtest::SuiteResult;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

/// JSON formatter for machine-readable output
pub struct JsonFormatter {
    /// Verbosity level affects detail in output
    verbosity: Verbosity,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

/// JSON representation of the full report
#[derive(Serialize)]
struct JsonOutput<'a> {
    /// Check, dry_run or update
    mode: &'a str,
    /// Exit code the run ends with
    exit_code: u8,
    /// Summary statistics
    summary: JsonSummary<'a>,
    /// Per-package results
    packages: Vec<&'a Package>,
    /// Grouped update outcomes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    groups: Vec<&'a GroupOutcome>,
    /// Unsupported-package messages
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unsupported: Vec<&'a UnsupportedRuleInfo>,
    /// System test suites in run order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system_tests: Vec<&'a SuiteResult>,
    /// Preflight result when the run was aborted
    #[serde(skip_serializing_if = "Option::is_none")]
    validation: Option<&'a ValidateResult>,
}

/// JSON representation of summary statistics
#[derive(Serialize)]
struct JsonSummary<'a> {
    /// Total packages evaluated
    total: usize,
    /// Count per update status label
    statuses: BTreeMap<&'static str, usize>,
    /// Packages without an update decision
    undecided: usize,
    /// Preflight validation errors
    validation_errors: usize,
    /// Whether this was a dry run
    dry_run: bool,
    /// Start and finish timestamps (verbose only)
    #[serde(skip_serializing_if = "Option::is_none")]
    timing: Option<&'a RunSummary>,
}

impl JsonFormatter {
    fn summary_to_json<'a>(&self, summary: &'a RunSummary) -> JsonSummary<'a> {
        let statuses = UpdateStatus::ALL
            .iter()
            .filter_map(|status| {
                let n = summary.count(*status);
                (n > 0).then_some((status.label(), n))
            })
            .collect();
        JsonSummary {
            total: summary.total,
            statuses,
            undecided: summary.undecided,
            validation_errors: summary.validation_errors,
            dry_run: summary.dry_run,
            timing: (self.verbosity >= Verbosity::Verbose).then_some(summary),
        }
    }

    fn write_json<T: Serialize>(&self, value: &T, writer: &mut dyn Write) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{}", json)
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &RunReport, writer: &mut dyn Write) -> std::io::Result<()> {
        let mode = match report.mode {
            crate::classify::RunMode::Check => "check",
            crate::classify::RunMode::DryRun => "dry_run",
            crate::classify::RunMode::Update => "update",
        };
        let output = JsonOutput {
            mode,
            exit_code: report.exit_code(),
            summary: self.summary_to_json(&report.summary),
            packages: report.packages.iter().collect(),
            groups: report.groups.iter().collect(),
            unsupported: report.unsupported_entries.iter().collect(),
            system_tests: report.system_tests.iter().collect(),
            validation: report.validation.as_ref(),
        };
        self.write_json(&output, writer)
    }

    fn format_summary(
        &self,
        summary: &RunSummary,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        self.write_json(&self.summary_to_json(summary), writer)
    }
}
