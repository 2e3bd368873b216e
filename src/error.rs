//! Application error types using thiserror
//!
//! Error hierarchy:
//! - ConfigError: Issues loading or validating the rule configuration
//! - ExecError: Failures running external command templates
//! - ExtractError: I/O failures while reading lock files
//! - ResolveError: Version list parsing and constraint problems
//! - PreflightError: Commands missing from the environment
//!
//! Only `PreflightError` aborts a run. Everything else is recorded as a
//! per-package status by the orchestrator.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Maximum number of characters of command output shown in error messages
pub const DISPLAY_OUTPUT_LIMIT: usize = 400;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Preflight validation errors
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    /// Package list input errors
    #[error(transparent)]
    Input(#[from] InputError),
}

/// Errors related to the rule configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    /// Failed to read config file
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("failed to parse config: {message}")]
    ParseError { message: String },

    /// A rule contains an invalid regular expression
    #[error("rule '{rule}' has an invalid {field} pattern: {message}")]
    InvalidPattern {
        rule: String,
        field: String,
        message: String,
    },

    /// Invalid top-level value
    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    /// A rule has no usable commands for the requested operation
    #[error("rule '{rule}' has no {operation} commands configured")]
    MissingCommands { rule: String, operation: String },
}

impl ConfigError {
    /// Create a NotFound error
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a ReadError
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Create an InvalidPattern error
    pub fn invalid_pattern(
        rule: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidPattern {
            rule: rule.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a MissingCommands error
    pub fn missing_commands(rule: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::MissingCommands {
            rule: rule.into(),
            operation: operation.into(),
        }
    }
}

/// Errors related to the package list input
#[derive(Error, Debug)]
pub enum InputError {
    /// Failed to read the package list
    #[error("failed to read package list {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The package list is not valid JSON or TOML
    #[error("failed to parse package list {path}: {message}")]
    ParseError { path: PathBuf, message: String },
}

/// Errors produced by the command execution engine
#[derive(Error, Debug)]
pub enum ExecError {
    /// The command did not finish within its timeout
    #[error("command timed out after {}", format_budget(*timeout))]
    CommandTimeout { command: String, timeout: Duration },

    /// The command exited with a non-zero status
    #[error("command '{command}' failed with exit code {exit_code}: {}", truncate_for_display(output))]
    CommandExecutionError {
        command: String,
        exit_code: i32,
        /// Full captured output (stderr, or stdout when stderr is empty)
        output: String,
    },

    /// The process could not be started
    #[error("failed to start command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The template rendered to no runnable commands
    #[error("command template contains no commands")]
    EmptyTemplate,
}

impl ExecError {
    /// Returns true if this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::CommandTimeout { .. })
    }

    /// Full, untruncated command output when available
    pub fn full_output(&self) -> Option<&str> {
        match self {
            ExecError::CommandExecutionError { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Errors produced while reading lock files
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Failed to list or read a lock file
    #[error("failed to read lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Lock extraction pattern could not be compiled
    #[error("invalid lock extraction pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl ExtractError {
    /// Create an Io error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors produced by the constraint resolver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Version list output could not be parsed
    #[error("failed to parse version list: {message}")]
    ParseError { message: String },

    /// Declared constraint is malformed
    #[error("malformed constraint '{constraint}': {message}")]
    ConstraintError { constraint: String, message: String },

    /// No newer version within the allowed scope
    #[error("no suitable version found within {scope} scope")]
    NoSuitableVersion { scope: String },
}

impl ResolveError {
    /// Create a ParseError
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }

    /// Create a ConstraintError
    pub fn constraint(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstraintError {
            constraint: constraint.into(),
            message: message.into(),
        }
    }
}

/// Errors produced by preflight validation
#[derive(Error, Debug)]
pub enum PreflightError {
    /// One or more commands are missing
    #[error("{message}")]
    CommandNotFound { message: String, count: usize },
}

/// Human-readable timeout budget ("1 second", "2 seconds", "500 ms")
pub fn format_budget(timeout: Duration) -> String {
    if timeout < Duration::from_secs(1) {
        return format!("{} ms", timeout.as_millis());
    }
    match timeout.as_secs() {
        1 => "1 second".to_string(),
        secs => format!("{} seconds", secs),
    }
}

/// Truncate command output for display in error messages
pub fn truncate_for_display(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.chars().count() <= DISPLAY_OUTPUT_LIMIT {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(DISPLAY_OUTPUT_LIMIT).collect();
    format!("{}... (truncated)", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_not_found() {
        let err = ConfigError::not_found("/path/to/depgate.toml");
        let msg = format!("{}", err);
        assert!(msg.contains("config file not found"));
        assert!(msg.contains("/path/to/depgate.toml"));
    }

    #[test]
    fn test_config_error_invalid_pattern() {
        let err = ConfigError::invalid_pattern("npm", "lock extraction", "unclosed group");
        let msg = format!("{}", err);
        assert!(msg.contains("npm"));
        assert!(msg.contains("lock extraction"));
        assert!(msg.contains("unclosed group"));
    }

    #[test]
    fn test_config_error_missing_commands() {
        let err = ConfigError::missing_commands("composer", "outdated");
        assert_eq!(
            format!("{}", err),
            "rule 'composer' has no outdated commands configured"
        );
    }

    #[test]
    fn test_exec_error_timeout_message() {
        let err = ExecError::CommandTimeout {
            command: "sleep 60".to_string(),
            timeout: Duration::from_secs(2),
        };
        assert_eq!(format!("{}", err), "command timed out after 2 seconds");
        assert!(err.is_timeout());
        assert!(err.full_output().is_none());
    }

    #[test]
    fn test_timeout_budget_wording() {
        assert_eq!(format_budget(Duration::from_secs(1)), "1 second");
        assert_eq!(format_budget(Duration::from_secs(90)), "90 seconds");
        assert_eq!(format_budget(Duration::from_millis(250)), "250 ms");

        let err = ExecError::CommandTimeout {
            command: "sleep 1".to_string(),
            timeout: Duration::from_millis(500),
        };
        assert_eq!(format!("{}", err), "command timed out after 500 ms");
    }

    #[test]
    fn test_exec_error_output_is_truncated_for_display_only() {
        let long = "x".repeat(DISPLAY_OUTPUT_LIMIT * 2);
        let err = ExecError::CommandExecutionError {
            command: "npm view".to_string(),
            exit_code: 1,
            output: long.clone(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("exit code 1"));
        assert!(msg.contains("(truncated)"));
        assert!(msg.len() < long.len());
        assert_eq!(err.full_output(), Some(long.as_str()));
    }

    #[test]
    fn test_truncate_short_output() {
        assert_eq!(truncate_for_display("  not found \n"), "not found");
    }

    #[test]
    fn test_resolve_error_constructors() {
        let err = ResolveError::parse("unexpected token");
        assert!(format!("{}", err).contains("unexpected token"));

        let err = ResolveError::constraint(">=1.0 <", "dangling comparator");
        let msg = format!("{}", err);
        assert!(msg.contains(">=1.0 <"));
        assert!(msg.contains("dangling comparator"));
    }

    #[test]
    fn test_extract_error_io() {
        let err = ExtractError::io(
            "/tmp/lock.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = format!("{}", err);
        assert!(msg.contains("/tmp/lock.json"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_app_error_from_config() {
        let err: AppError = ConfigError::not_found("x.toml").into();
        assert!(matches!(err, AppError::Config(_)));
    }
}
