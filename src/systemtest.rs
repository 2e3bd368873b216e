//! System tests
//!
//! Project-level checks (build, unit tests, lint) run as command templates
//! from the project root. A suite runs before updates as a baseline and after
//! updates, either once per update unit or once at the end.
//!
//! Every test of a suite runs even when an earlier one fails. A failure is
//! critical unless the test opts out with `continue_on_fail`. Nothing is
//! rolled back: callers turn a critical failure into package statuses.

use crate::config::{SystemTestCfg, SystemTestsCfg};
use crate::exec::{Bindings, CommandExecutor, ExecOptions};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// When a suite ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPhase {
    /// Before any update
    Preflight,
    /// After one update unit
    AfterEach,
    /// After all updates
    AfterAll,
}

impl fmt::Display for TestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preflight => write!(f, "Preflight"),
            Self::AfterEach => write!(f, "After Update"),
            Self::AfterAll => write!(f, "Validation"),
        }
    }
}

/// Result of one test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Every command exited zero within the timeout
    pub passed: bool,
    /// Wall-clock time in milliseconds
    pub duration_ms: u64,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The failure is not critical
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub continue_on_fail: bool,
}

impl TestResult {
    /// Failed and not allowed to fail
    pub fn is_critical_failure(&self) -> bool {
        !self.passed && !self.continue_on_fail
    }
}

/// Result of one suite run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteResult {
    /// When the suite ran
    pub phase: TestPhase,
    /// Update unit the suite checked (`AfterEach` only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Results in run order
    pub tests: Vec<TestResult>,
    /// Wall-clock time in milliseconds
    pub duration_ms: u64,
}

impl SuiteResult {
    /// Number of passed tests
    pub fn passed_count(&self) -> usize {
        self.tests.iter().filter(|t| t.passed).count()
    }

    /// Number of failed tests
    pub fn failed_count(&self) -> usize {
        self.tests.len() - self.passed_count()
    }

    /// Returns true if every test passed
    pub fn passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Returns true if a test without `continue_on_fail` failed
    pub fn has_critical_failure(&self) -> bool {
        self.tests.iter().any(TestResult::is_critical_failure)
    }

    /// One-line summary, e.g. `2/3 system tests passed (1 failed)`
    pub fn summary(&self) -> String {
        if self.passed() {
            format!("All {} system tests passed", self.tests.len())
        } else {
            format!(
                "{}/{} system tests passed ({} failed)",
                self.passed_count(),
                self.tests.len(),
                self.failed_count()
            )
        }
    }
}

/// Runs a configured suite through the command executor
pub struct SystemTestRunner<'a> {
    suite: &'a SystemTestsCfg,
    executor: &'a CommandExecutor,
    root: PathBuf,
}

impl<'a> SystemTestRunner<'a> {
    /// Create a runner; commands run from `root`
    pub fn new(suite: &'a SystemTestsCfg, executor: &'a CommandExecutor, root: impl Into<PathBuf>) -> Self {
        Self {
            suite,
            executor,
            root: root.into(),
        }
    }

    /// Run every test in order
    pub async fn run(&self, phase: TestPhase, unit: Option<&str>) -> SuiteResult {
        let started = Instant::now();
        let mut tests = Vec::with_capacity(self.suite.tests.len());
        for test in &self.suite.tests {
            tests.push(self.run_test(test).await);
        }
        let result = SuiteResult {
            phase,
            unit: unit.map(str::to_string),
            tests,
            duration_ms: elapsed_ms(started),
        };
        info!(phase = %phase, unit, summary = %result.summary(), "system tests finished");
        result
    }

    async fn run_test(&self, test: &SystemTestCfg) -> TestResult {
        let started = Instant::now();
        let options = ExecOptions::new(test.timeout())
            .with_env(test.env.clone())
            .with_working_dir(Some(self.root.clone()));
        let outcome = self
            .executor
            .execute_with(&test.commands, &Bindings::default(), &options)
            .await;
        let error = match outcome {
            Ok(_) => None,
            Err(e) => {
                debug!(
                    test = %test.name,
                    timeout = e.is_timeout(),
                    output = e.full_output().unwrap_or_default(),
                    "system test failed"
                );
                Some(e.to_string())
            }
        };
        TestResult {
            name: test.name.clone(),
            passed: error.is_none(),
            duration_ms: elapsed_ms(started),
            error,
            continue_on_fail: test.continue_on_fail,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
