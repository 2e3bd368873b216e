//! Process launching
//!
//! `ProcessLauncher` is the only place where template text reaches a shell.
//! `ShellLauncher` runs each command through the user's login shell so that
//! aliases and functions resolve; the command text is therefore trusted input.

use crate::error::ExecError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Shell used when `$SHELL` is not set
const FALLBACK_SHELL: &str = "sh";

/// One command ready to be launched
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Rendered command line
    pub command: String,
    /// Extra environment variables
    pub env: BTreeMap<String, String>,
    /// Working directory
    pub working_dir: Option<PathBuf>,
    /// Time budget for this command
    pub timeout: Duration,
}

impl LaunchRequest {
    /// Create a request with no extra environment
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            env: BTreeMap::new(),
            working_dir: None,
            timeout,
        }
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (-1 when terminated by a signal)
    pub exit_code: i32,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Wall-clock duration
    pub duration: Duration,
}

impl CommandOutput {
    /// Returns true if the command exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stderr, or stdout when stderr is empty
    pub fn failure_output(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Runs a single command line
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Launch the command and wait for it within `request.timeout`
    ///
    /// Returns `ExecError::CommandTimeout` when the budget is exceeded. A
    /// non-zero exit is not an error at this level.
    async fn launch(&self, request: &LaunchRequest) -> Result<CommandOutput, ExecError>;
}

/// Launcher that runs commands through a shell
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    shell: String,
    args: Vec<String>,
}

impl ShellLauncher {
    /// `$SHELL -l -c`, falling back to `sh -c`
    pub fn login() -> Self {
        match std::env::var("SHELL") {
            Ok(shell) if !shell.trim().is_empty() => Self {
                shell,
                args: vec!["-l".to_string(), "-c".to_string()],
            },
            _ => Self::plain(),
        }
    }

    /// Plain `sh -c` without login initialization
    pub fn plain() -> Self {
        Self {
            shell: FALLBACK_SHELL.to_string(),
            args: vec!["-c".to_string()],
        }
    }

    /// Custom shell and arguments (the command is appended last)
    pub fn with_shell(shell: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            shell: shell.into(),
            args,
        }
    }

    /// Shell program
    pub fn shell(&self) -> &str {
        &self.shell
    }
}

impl Default for ShellLauncher {
    fn default() -> Self {
        Self::login()
    }
}

#[async_trait]
impl ProcessLauncher for ShellLauncher {
    #[instrument(skip(self, request), fields(command = %request.command), level = "debug")]
    async fn launch(&self, request: &LaunchRequest) -> Result<CommandOutput, ExecError> {
        let mut cmd = Command::new(&self.shell);
        cmd.args(&self.args)
            .arg(&request.command)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let start = Instant::now();
        let child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: request.command.clone(),
            source,
        })?;
        let pid = child.id();

        match tokio::time::timeout(request.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let result = CommandOutput {
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    duration: start.elapsed(),
                };
                debug!(
                    exit_code = result.exit_code,
                    duration_ms = result.duration.as_millis() as u64,
                    "command finished"
                );
                Ok(result)
            }
            Ok(Err(source)) => Err(ExecError::Spawn {
                command: request.command.clone(),
                source,
            }),
            Err(_) => {
                kill_process_group(pid);
                debug!(timeout_secs = request.timeout.as_secs(), "command timed out");
                Err(ExecError::CommandTimeout {
                    command: request.command.clone(),
                    timeout: request.timeout,
                })
            }
        }
    }
}

/// Kill every process in the child's group
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = pid {
        if let Err(err) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!(pid, error = %err, "failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
