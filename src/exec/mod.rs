//! Command execution engine
//!
//! This module provides:
//! - Template parsing and placeholder rendering (`template`)
//! - The `ProcessLauncher` trust boundary and its shell implementation
//! - `CommandExecutor`: runs every logical command of a template in order
//!   under one time budget
//!
//! No retries are attempted here; retry policy belongs to callers.

mod launcher;
pub mod template;

pub use launcher::{CommandOutput, LaunchRequest, ProcessLauncher, ShellLauncher};
pub use template::{extract_commands, logical_lines, render, Bindings};

use crate::error::ExecError;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, trace};

/// Per-invocation execution options
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Budget for the whole template
    pub timeout: Duration,
    /// Extra environment variables
    pub env: BTreeMap<String, String>,
    /// Working directory
    pub working_dir: Option<PathBuf>,
}

impl ExecOptions {
    /// Options with a timeout only
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            env: BTreeMap::new(),
            working_dir: None,
        }
    }

    /// Sets the environment (builder pattern)
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Sets the working directory (builder pattern)
    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }
}

/// Renders and runs command templates
#[derive(Clone)]
pub struct CommandExecutor {
    launcher: Arc<dyn ProcessLauncher>,
}

impl CommandExecutor {
    /// Create an executor over a launcher
    pub fn new(launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self { launcher }
    }

    /// Executor using the user's login shell
    pub fn login_shell() -> Self {
        Self::new(Arc::new(ShellLauncher::login()))
    }

    /// `execute(template, bindings, timeout)`
    pub async fn execute(
        &self,
        template: &str,
        bindings: &Bindings,
        timeout: Duration,
    ) -> Result<CommandOutput, ExecError> {
        self.execute_with(template, bindings, &ExecOptions::new(timeout))
            .await
    }

    /// Execute every logical command in order, stopping at the first failure
    ///
    /// Returns the output of the last command.
    #[instrument(skip(self, template, options), fields(package = %bindings.package), level = "debug")]
    pub async fn execute_with(
        &self,
        template: &str,
        bindings: &Bindings,
        options: &ExecOptions,
    ) -> Result<CommandOutput, ExecError> {
        let rendered = render(template, bindings);
        let commands = logical_lines(&rendered);
        if commands.is_empty() {
            return Err(ExecError::EmptyTemplate);
        }

        let deadline = Instant::now() + options.timeout;
        let mut last = None;

        for command in commands {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ExecError::CommandTimeout {
                    command,
                    timeout: options.timeout,
                });
            }

            trace!(command = %command, "running command");
            let request = LaunchRequest {
                command: command.clone(),
                env: options.env.clone(),
                working_dir: options.working_dir.clone(),
                timeout: remaining,
            };

            let output = match self.launcher.launch(&request).await {
                Ok(output) => output,
                Err(ExecError::CommandTimeout { command, .. }) => {
                    return Err(ExecError::CommandTimeout {
                        command,
                        timeout: options.timeout,
                    })
                }
                Err(err) => return Err(err),
            };

            if !output.success() {
                debug!(command = %command, exit_code = output.exit_code, "command failed");
                return Err(ExecError::CommandExecutionError {
                    command,
                    exit_code: output.exit_code,
                    output: output.failure_output().to_string(),
                });
            }
            last = Some(output);
        }

        last.ok_or(ExecError::EmptyTemplate)
    }
}
