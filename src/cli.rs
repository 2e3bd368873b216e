//! CLI argument parsing module for depgate

use crate::classify::RunMode;
use crate::config::DEFAULT_CONFIG_FILE;
use crate::context::Verbosity;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Rule-driven dependency version resolver and update orchestrator
#[derive(Parser, Debug, Clone)]
#[command(
    name = "depgate",
    version,
    about = "Rule-driven dependency version resolver and update orchestrator"
)]
pub struct CliArgs {
    /// Project root; package working dirs are relative to it
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Rule configuration file (default: <path>/depgate.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Package list (JSON array or TOML [[packages]])
    #[arg(short, long)]
    pub packages: PathBuf,

    // Mode options
    /// Apply updates to outdated packages
    #[arg(short, long, conflicts_with = "dry_run")]
    pub update: bool,

    /// Dry run mode - show what would be updated without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Number of packages processed in parallel (overrides the config)
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,

    /// Only evaluate packages of this rule (can be specified multiple times)
    #[arg(long = "rule", action = ArgAction::Append)]
    pub rules: Vec<String>,

    /// Skip the command availability check
    #[arg(long)]
    pub skip_preflight: bool,

    /// Do not run configured system tests around updates
    #[arg(long)]
    pub skip_system_tests: bool,

    // Output options
    /// Output results in JSON format
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Trace every command and filter step
    #[arg(long, conflicts_with = "quiet")]
    pub trace: bool,

    /// Enable quiet mode - minimal output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl CliArgs {
    /// Run mode selected by the flags
    pub fn mode(&self) -> RunMode {
        if self.dry_run {
            RunMode::DryRun
        } else if self.update {
            RunMode::Update
        } else {
            RunMode::Check
        }
    }

    /// Verbosity selected by the flags
    pub fn verbosity(&self) -> Verbosity {
        if self.trace {
            Verbosity::Trace
        } else if self.verbose {
            Verbosity::Verbose
        } else if self.quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }

    /// Config path, defaulting to `depgate.toml` under the project root
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.path.join(DEFAULT_CONFIG_FILE))
    }

    /// Check if a package of `rule` should be processed based on filters
    pub fn should_process_rule(&self, rule: &str) -> bool {
        self.rules.is_empty() || self.rules.iter().any(|r| r == rule)
    }

    /// Whether progress bars should be drawn
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.json
    }
}
