//! Preflight validation
//!
//! This module provides:
//! - `CommandChecker`: resolves a command name in the environment
//! - `SystemChecker`: direct PATH lookup, then the user's login shell
//! - `validate_packages` / `validate_rules`: collect every external command
//!   the selected rules will invoke and report the missing ones
//!
//! Each distinct command is checked once per validation, no matter how many
//! rules or packages reference it.

mod hints;

pub use hints::{hint_for, resolution_hint};

use crate::config::Config;
use crate::domain::Package;
use crate::error::PreflightError;
use crate::exec::extract_commands;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::process::{Command, Stdio};
use tracing::{debug, trace};

/// Resolves command names
pub trait CommandChecker: Send + Sync {
    /// Returns true if `command` can be invoked
    fn is_available(&self, command: &str) -> bool;
}

/// Checks the real environment
#[derive(Debug, Clone)]
pub struct SystemChecker {
    shell_fallback: bool,
}

impl SystemChecker {
    /// PATH lookup with the login shell fallback
    pub fn new() -> Self {
        Self {
            shell_fallback: true,
        }
    }

    /// PATH lookup only
    pub fn path_only() -> Self {
        Self {
            shell_fallback: false,
        }
    }

    fn shell_lookup(&self, command: &str) -> bool {
        let shell = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let (program, args): (String, &[&str]) = match &shell {
            Some(shell) => (shell.clone(), &["-l", "-c"][..]),
            None => ("sh".to_string(), &["-c"][..]),
        };
        Command::new(program)
            .args(args)
            .arg(format!("command -v {}", command))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl Default for SystemChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChecker for SystemChecker {
    fn is_available(&self, command: &str) -> bool {
        if which::which(command).is_ok() {
            trace!(command, "found on PATH");
            return true;
        }
        // Aliases and shell functions only resolve inside the login shell
        let found = self.shell_fallback && is_plain_word(command) && self.shell_lookup(command);
        debug!(command, found, "login shell lookup");
        found
    }
}

fn is_plain_word(command: &str) -> bool {
    !command.is_empty()
        && command
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '+'))
}

/// A command that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Command name
    pub command: String,
    /// How to fix it
    pub hint: String,
}

impl ValidationError {
    /// Error for `command` with its table hint
    pub fn missing(command: impl Into<String>) -> Self {
        let command = command.into();
        let hint = resolution_hint(&command);
        Self { command, hint }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command not found: {}\n  Resolution: {}",
            self.command, self.hint
        )
    }
}

/// Outcome of a validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidateResult {
    /// Missing commands, sorted by command
    pub errors: Vec<ValidationError>,
    /// Non-fatal findings
    pub warnings: Vec<String>,
}

impl ValidateResult {
    /// Returns true if the run must abort
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Multi-line report of all errors
    pub fn error_message(&self) -> String {
        let mut message = String::from("Pre-flight validation failed:\n");
        for error in &self.errors {
            message.push_str(&format!("  - {}\n", error));
        }
        message
    }

    /// Convert into a run-aborting error when there are errors
    pub fn into_result(self) -> Result<Self, PreflightError> {
        if self.has_errors() {
            return Err(PreflightError::CommandNotFound {
                message: self.error_message(),
                count: self.errors.len(),
            });
        }
        Ok(self)
    }
}

/// Validate the rules referenced by `packages`
pub fn validate_packages(
    packages: &[Package],
    config: &Config,
    checker: &dyn CommandChecker,
) -> ValidateResult {
    let rules: BTreeSet<&str> = packages.iter().map(|p| p.rule.as_str()).collect();
    validate_rules(rules, config, checker)
}

/// Validate the named rules
///
/// Unknown rule names are skipped with a warning.
pub fn validate_rules<'a>(
    rules: impl IntoIterator<Item = &'a str>,
    config: &Config,
    checker: &dyn CommandChecker,
) -> ValidateResult {
    let mut result = ValidateResult::default();
    // command -> first rule that needs it
    let mut commands: BTreeMap<String, String> = BTreeMap::new();

    for name in rules {
        let Some(rule) = config.rule(name) else {
            result
                .warnings
                .push(format!("rule '{}' is not defined in the configuration", name));
            continue;
        };
        let templates = [rule.outdated_commands(), rule.update_commands()];
        for template in templates.into_iter().flatten() {
            for command in extract_commands(template) {
                commands.entry(command).or_insert_with(|| name.to_string());
            }
        }
    }

    for (command, rule) in commands {
        if !checker.is_available(&command) {
            debug!(command = %command, rule = %rule, "command missing");
            result.errors.push(ValidationError::missing(command));
        }
    }
    result.errors.sort_by(|a, b| a.command.cmp(&b.command));
    result
}
