//! Text output formatter for human-readable display
//!
//! This module provides:
//! - One aligned row per package with install and update status
//! - Semantic version change type indication (major/minor/patch)
//! - Group outcomes and unsupported-package messages
//! - System test results
//! - Summary with per-status counts

use crate::config::SortStrategy;
use crate::context::Verbosity;
use crate::domain::{Package, RunSummary, UpdateStatus};
use crate::orchestrator::RunReport;
use crate::output::OutputFormatter;
use crate::resolver::filter::{bump_between, Bump};
use crate::resolver::VersionScheme;
use colored::Colorize;
use std::io::Write;

/// Semantic version change type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionChangeType {
    /// Major version change (breaking)
    Major,
    /// Minor version change (features)
    Minor,
    /// Patch version change (fixes)
    Patch,
    /// Unknown or unparseable
    Unknown,
}

impl VersionChangeType {
    /// Determine the change type between two versions
    pub fn from_versions(old: &str, new: &str) -> Self {
        let scheme = VersionScheme::for_strategy(SortStrategy::Semver);
        match (scheme.parse(old), scheme.parse(new)) {
            (Some(old), Some(new)) if old.parts.is_some() && new.parts.is_some() => {
                match bump_between(&old, &new) {
                    Bump::Major => VersionChangeType::Major,
                    Bump::Minor => VersionChangeType::Minor,
                    Bump::Patch => VersionChangeType::Patch,
                }
            }
            _ => VersionChangeType::Unknown,
        }
    }

    /// Get the display label with color
    pub fn colored_label(&self) -> String {
        match self {
            VersionChangeType::Major => "major".red().bold().to_string(),
            VersionChangeType::Minor => "minor".yellow().to_string(),
            VersionChangeType::Patch => "patch".green().to_string(),
            VersionChangeType::Unknown => "?".dimmed().to_string(),
        }
    }

    /// Get the plain label
    pub fn label(&self) -> &'static str {
        match self {
            VersionChangeType::Major => "major",
            VersionChangeType::Minor => "minor",
            VersionChangeType::Patch => "patch",
            VersionChangeType::Unknown => "?",
        }
    }
}

/// Text formatter for human-readable output
pub struct TextFormatter {
    /// Verbosity level
    verbosity: Verbosity,
    /// Whether to use colors
    color: bool,
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new(verbosity: Verbosity) -> Self {
        Self::with_color(verbosity, true)
    }

    /// Create a new text formatter with color option
    pub fn with_color(verbosity: Verbosity, color: bool) -> Self {
        Self { verbosity, color }
    }

    fn paint_status(&self, status: Option<UpdateStatus>) -> String {
        let label = status.map(|s| s.label()).unwrap_or("-");
        let padded = format!("{:14}", label);
        if !self.color {
            return padded;
        }
        match status {
            Some(UpdateStatus::UpToDate) => padded.green().to_string(),
            Some(UpdateStatus::Outdated) | Some(UpdateStatus::Planned) => {
                padded.yellow().to_string()
            }
            Some(UpdateStatus::Updated) => padded.bright_green().bold().to_string(),
            Some(UpdateStatus::Failed) | Some(UpdateStatus::ConfigError) => {
                padded.red().bold().to_string()
            }
            Some(UpdateStatus::SummarizeError) => padded.magenta().to_string(),
            None => padded.dimmed().to_string(),
        }
    }

    /// Only rows worth showing at the current verbosity
    fn visible<'a>(&self, packages: &'a [Package]) -> Vec<&'a Package> {
        packages
            .iter()
            .filter(|p| {
                self.verbosity >= Verbosity::Verbose
                    || p.update_status != Some(UpdateStatus::UpToDate)
            })
            .collect()
    }

    fn format_row(
        &self,
        pkg: &Package,
        name_width: usize,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let installed = pkg.installed_version.as_deref().unwrap_or("-");
        let latest = pkg.latest_version.as_deref().unwrap_or("-");
        let change = match (&pkg.installed_version, &pkg.latest_version) {
            (Some(old), Some(new)) if old != new => {
                let change = VersionChangeType::from_versions(old, new);
                if self.color {
                    format!(" [{}]", change.colored_label())
                } else {
                    format!(" [{}]", change.label())
                }
            }
            _ => String::new(),
        };
        let name = format!("{:width$}", pkg.name, width = name_width);
        let install = format!("{:14}", pkg.install_status.label());

        if self.color {
            writeln!(
                writer,
                "  {} {} {} {} {} {}{}",
                name.bold(),
                pkg.rule.dimmed(),
                install.dimmed(),
                self.paint_status(pkg.update_status),
                installed.dimmed(),
                "→".dimmed(),
                format!("{}{}", latest.bright_white(), change)
            )?;
        } else {
            writeln!(
                writer,
                "  {} {} {} {} {} -> {}{}",
                name,
                pkg.rule,
                install,
                self.paint_status(pkg.update_status),
                installed,
                latest,
                change
            )?;
        }

        if self.verbosity >= Verbosity::Verbose {
            if let Some(available) = &pkg.available {
                writeln!(writer, "      available: {}", available)?;
            }
        }

        if let Some(error) = &pkg.error {
            if self.color {
                writeln!(writer, "      {} {}", "✗".red(), error)?;
            } else {
                writeln!(writer, "      error: {}", error)?;
            }
        }
        Ok(())
    }

    fn format_groups(&self, report: &RunReport, writer: &mut dyn Write) -> std::io::Result<()> {
        if report.groups.is_empty() {
            return Ok(());
        }
        writeln!(writer)?;
        writeln!(writer, "Groups:")?;
        for group in &report.groups {
            let members = group.members.join(", ");
            match (group.success, self.color) {
                (true, true) => writeln!(writer, "  {} {} ({})", "✓".green(), group.key, members)?,
                (true, false) => writeln!(writer, "  ok {} ({})", group.key, members)?,
                (false, true) => writeln!(
                    writer,
                    "  {} {} ({}) failed: {}",
                    "✗".red(),
                    group.key,
                    members,
                    group.failed.join(", ")
                )?,
                (false, false) => writeln!(
                    writer,
                    "  failed {} ({}): {}",
                    group.key,
                    members,
                    group.failed.join(", ")
                )?,
            }
        }
        Ok(())
    }

    fn format_system_tests(&self, report: &RunReport, writer: &mut dyn Write) -> std::io::Result<()> {
        for suite in &report.system_tests {
            writeln!(writer)?;
            match &suite.unit {
                Some(unit) => writeln!(writer, "System tests ({}, {}): {}", suite.phase, unit, suite.summary())?,
                None => writeln!(writer, "System tests ({}): {}", suite.phase, suite.summary())?,
            }
            for test in &suite.tests {
                let mark = match (test.passed, self.color) {
                    (true, true) => "✓".green().to_string(),
                    (true, false) => "ok".to_string(),
                    (false, true) => "✗".red().to_string(),
                    (false, false) => "failed".to_string(),
                };
                if self.verbosity >= Verbosity::Verbose {
                    writeln!(writer, "  {} {} ({} ms)", mark, test.name, test.duration_ms)?;
                } else {
                    writeln!(writer, "  {} {}", mark, test.name)?;
                }
                if let Some(error) = &test.error {
                    writeln!(writer, "      error: {}", error)?;
                }
            }
        }
        Ok(())
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, report: &RunReport, writer: &mut dyn Write) -> std::io::Result<()> {
        // Preflight messages are written to stderr by the caller
        if report.aborted() {
            return self.format_summary(&report.summary, writer);
        }

        if self.verbosity == Verbosity::Quiet {
            return self.format_summary(&report.summary, writer);
        }

        let rows = self.visible(&report.packages);
        let name_width = rows.iter().map(|p| p.name.len()).max().unwrap_or(0);
        for pkg in &rows {
            self.format_row(pkg, name_width, writer)?;
        }

        self.format_groups(report, writer)?;
        self.format_system_tests(report, writer)?;

        if !report.unsupported.is_empty() {
            writeln!(writer)?;
            for message in &report.unsupported {
                writeln!(writer, "{}", message)?;
            }
        }

        if !rows.is_empty() || !report.unsupported.is_empty() {
            writeln!(writer)?;
        }
        self.format_summary(&report.summary, writer)
    }

    fn format_summary(
        &self,
        summary: &RunSummary,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let prefix = if summary.dry_run {
            if self.color {
                format!("{} ", "(dry-run)".cyan())
            } else {
                "(dry-run) ".to_string()
            }
        } else {
            String::new()
        };

        if summary.validation_errors > 0 {
            let line = format!("{} validation error(s), run aborted", summary.validation_errors);
            if self.color {
                return writeln!(writer, "{}{}", prefix, line.red().bold());
            }
            return writeln!(writer, "{}{}", prefix, line);
        }

        let counts: Vec<String> = UpdateStatus::ALL
            .iter()
            .filter_map(|status| {
                let n = summary.count(*status);
                (n > 0).then(|| format!("{} {}", n, status.label()))
            })
            .chain((summary.undecided > 0).then(|| format!("{} unsupported", summary.undecided)))
            .collect();

        let body = if counts.is_empty() {
            "No packages".to_string()
        } else {
            counts.join(", ")
        };

        if self.color {
            let total = format!("{} packages", summary.total).bold();
            if summary.failures() > 0 {
                writeln!(writer, "{}{}: {}", prefix, total, body.red())
            } else {
                writeln!(writer, "{}{}: {}", prefix, total, body)
            }
        } else {
            writeln!(writer, "{}{} packages: {}", prefix, summary.total, body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RunMode;
    use crate::domain::InstallStatus;
    use crate::group::GroupOutcome;
    use crate::systemtest::{SuiteResult, TestPhase, TestResult};

    fn report(packages: Vec<Package>) -> RunReport {
        let mut summary = RunSummary::new(false);
        for pkg in &packages {
            summary.record(pkg);
        }
        RunReport {
            mode: RunMode::Check,
            packages,
            validation: None,
            unsupported: Vec::new(),
            unsupported_entries: Vec::new(),
            groups: Vec::new(),
            system_tests: Vec::new(),
            summary,
        }
    }

    fn outdated(name: &str, from: &str, to: &str) -> Package {
        let mut pkg = Package::new(name, "npm", "js", from).with_installed(from);
        pkg.install_status = InstallStatus::Installed;
        pkg.latest_version = Some(to.to_string());
        pkg.update_status = Some(UpdateStatus::Outdated);
        pkg
    }

    fn render(formatter: &TextFormatter, report: &RunReport) -> String {
        let mut buf = Vec::new();
        formatter.format(report, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_version_change_type() {
        assert_eq!(
            VersionChangeType::from_versions("1.2.3", "2.0.0"),
            VersionChangeType::Major
        );
        assert_eq!(
            VersionChangeType::from_versions("1.2.3", "1.3.0"),
            VersionChangeType::Minor
        );
        assert_eq!(
            VersionChangeType::from_versions("1.2.3", "1.2.4"),
            VersionChangeType::Patch
        );
        assert_eq!(
            VersionChangeType::from_versions("latest", "1.2.4"),
            VersionChangeType::Unknown
        );
    }

    #[test]
    fn test_format_rows_plain() {
        let formatter = TextFormatter::with_color(Verbosity::Normal, false);
        let output = render(&formatter, &report(vec![outdated("lodash", "4.17.20", "4.17.21")]));
        assert!(output.contains("lodash npm Installed"));
        assert!(output.contains("4.17.20 -> 4.17.21 [patch]"));
        assert!(output.contains("1 packages: 1 Outdated"));
    }

    #[test]
    fn test_up_to_date_hidden_unless_verbose() {
        let mut pkg = outdated("react", "18.2.0", "18.2.0");
        pkg.update_status = Some(UpdateStatus::UpToDate);
        let report = report(vec![pkg]);

        let normal = render(&TextFormatter::with_color(Verbosity::Normal, false), &report);
        assert!(!normal.contains("  react"));

        let verbose = render(&TextFormatter::with_color(Verbosity::Verbose, false), &report);
        assert!(verbose.contains("  react"));
    }

    #[test]
    fn test_available_levels_shown_when_verbose() {
        let mut pkg = outdated("lodash", "4.17.20", "5.0.0");
        pkg.available = Some(crate::domain::VersionSummary {
            major: Some("5.0.0".to_string()),
            minor: None,
            patch: Some("4.17.21".to_string()),
        });
        let report = report(vec![pkg]);

        let normal = render(&TextFormatter::with_color(Verbosity::Normal, false), &report);
        assert!(!normal.contains("available:"));

        let verbose = render(&TextFormatter::with_color(Verbosity::Verbose, false), &report);
        assert!(verbose.contains("      available: major 5.0.0, patch 4.17.21\n"));
    }

    #[test]
    fn test_errors_groups_and_unsupported() {
        let mut failed = outdated("a", "1.0.0", "1.1.0");
        failed.fail(UpdateStatus::Failed, "boom");
        let mut report = report(vec![failed]);
        report.unsupported = vec!["⛔ npm (js): reason (2 packages)".to_string()];
        report.groups = vec![GroupOutcome {
            key: "npm/g1".to_string(),
            members: vec!["a".to_string(), "b".to_string()],
            success: false,
            failed: vec!["a".to_string()],
        }];

        let output = render(&TextFormatter::with_color(Verbosity::Normal, false), &report);
        assert!(output.contains("error: boom"));
        assert!(output.contains("failed npm/g1 (a, b): a"));
        assert!(output.contains("⛔ npm (js): reason (2 packages)"));
    }

    #[test]
    fn test_system_test_results() {
        let mut report = report(vec![outdated("a", "1.0.0", "1.1.0")]);
        report.system_tests = vec![SuiteResult {
            phase: TestPhase::AfterAll,
            unit: None,
            tests: vec![
                TestResult {
                    name: "unit".to_string(),
                    passed: true,
                    duration_ms: 12,
                    error: None,
                    continue_on_fail: false,
                },
                TestResult {
                    name: "lint".to_string(),
                    passed: false,
                    duration_ms: 3,
                    error: Some("exit code 1".to_string()),
                    continue_on_fail: true,
                },
            ],
            duration_ms: 15,
        }];

        let output = render(&TextFormatter::with_color(Verbosity::Normal, false), &report);
        assert!(output.contains("System tests (Validation): 1/2 system tests passed (1 failed)\n"));
        assert!(output.contains("  ok unit\n"));
        assert!(output.contains("  failed lint\n      error: exit code 1\n"));

        let verbose = render(&TextFormatter::with_color(Verbosity::Verbose, false), &report);
        assert!(verbose.contains("  ok unit (12 ms)\n"));
    }

    #[test]
    fn test_quiet_prints_summary_only() {
        let formatter = TextFormatter::with_color(Verbosity::Quiet, false);
        let output = render(&formatter, &report(vec![outdated("lodash", "1.0.0", "1.0.1")]));
        assert_eq!(output, "1 packages: 1 Outdated\n");
    }

    #[test]
    fn test_summary_dry_run_and_validation() {
        let formatter = TextFormatter::with_color(Verbosity::Normal, false);
        let mut summary = RunSummary::new(true);
        summary.validation_errors = 2;
        let mut buf = Vec::new();
        formatter.format_summary(&summary, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "(dry-run) 2 validation error(s), run aborted\n"
        );
    }
}
