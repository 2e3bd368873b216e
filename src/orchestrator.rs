//! Run orchestrator coordinating the entire workflow
//!
//! This module provides:
//! - Workflow coordination: preflight → extract → list → resolve → classify → update
//! - Bounded parallel command execution (`Config.concurrency` permits)
//! - Rule-level failure detection for the list-versions step
//! - Grouped updates through the `GroupCoordinator`
//! - System tests before and after updates
//! - Dry-run mode support
//!
//! Every failure below the run level becomes a per-package status; only
//! preflight validation aborts a run.

use crate::classify::{
    apply_list_outcomes, classify_install, classify_update, needs_resolution, wants_update,
    ListOutcome, RunMode,
};
use crate::config::{Config, Rule, SystemTestRunMode, SystemTestsCfg};
use crate::context::LogContext;
use crate::domain::{Package, RunSummary, UpdateStatus};
use crate::error::ConfigError;
use crate::exec::{Bindings, CommandExecutor, ExecOptions};
use crate::extract::{FsLockFiles, LockIndex};
use crate::group::{GroupCoordinator, GroupOutcome, MemberUpdater, UpdateUnit};
use crate::preflight::{validate_packages, CommandChecker, SystemChecker, ValidateResult};
use crate::progress::Progress;
use crate::resolver::{resolve_with, VersioningPolicy};
use crate::supervision::{
    derive_unsupported_reason, should_track_unsupported, Tracker, UnsupportedRuleInfo,
    UnsupportedTracker,
};
use crate::systemtest::{SuiteResult, SystemTestRunner, TestPhase};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, trace};

/// Result of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// What the run did with outdated packages
    pub mode: RunMode,
    /// Packages sorted by (rule, name)
    pub packages: Vec<Package>,
    /// Preflight result when validation aborted the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidateResult>,
    /// Unsupported-package messages, sorted
    pub unsupported: Vec<String>,
    /// Unsupported-package entries, sorted
    #[serde(skip)]
    pub unsupported_entries: Vec<UnsupportedRuleInfo>,
    /// Outcomes of grouped updates
    pub groups: Vec<GroupOutcome>,
    /// System test suites, in run order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub system_tests: Vec<SuiteResult>,
    /// Counts by status
    pub summary: RunSummary,
}

impl RunReport {
    /// Returns true if preflight validation aborted the run
    pub fn aborted(&self) -> bool {
        self.validation
            .as_ref()
            .map(ValidateResult::has_errors)
            .unwrap_or(false)
    }

    /// Process exit code
    pub fn exit_code(&self) -> u8 {
        self.summary.exit_code()
    }
}

/// Orchestrator for coordinating a run
pub struct Orchestrator {
    /// Immutable rule set
    config: Arc<Config>,
    /// Runs command templates
    executor: CommandExecutor,
    /// Warnings sink and verbosity
    ctx: LogContext,
    /// Directory package working dirs are relative to
    root: PathBuf,
    /// Check, dry-run or update
    mode: RunMode,
    /// Bounds concurrent commands
    semaphore: Arc<Semaphore>,
    /// Preflight checker; `None` skips preflight
    checker: Option<Arc<dyn CommandChecker>>,
    /// Whether progress bars are shown
    show_progress: bool,
    /// Whether configured system tests run in update mode
    system_tests: bool,
}

impl Orchestrator {
    /// Create a new orchestrator
    pub fn new(config: Arc<Config>, executor: CommandExecutor, ctx: LogContext) -> Self {
        let concurrency = config.concurrency.max(1);
        Self {
            config,
            executor,
            ctx,
            root: PathBuf::from("."),
            mode: RunMode::Check,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            checker: Some(Arc::new(SystemChecker::new())),
            show_progress: false,
            system_tests: true,
        }
    }

    /// Sets the root directory (builder pattern)
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Sets the run mode (builder pattern)
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Overrides the worker pool size (builder pattern)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        self
    }

    /// Sets the preflight checker (builder pattern)
    pub fn with_checker(mut self, checker: Arc<dyn CommandChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    /// Disables preflight validation (builder pattern)
    pub fn without_preflight(mut self) -> Self {
        self.checker = None;
        self
    }

    /// Disables system tests (builder pattern)
    pub fn without_system_tests(mut self) -> Self {
        self.system_tests = false;
        self
    }

    /// Enables progress bars (builder pattern)
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run the workflow over `packages`
    pub async fn run(&self, packages: Vec<Package>) -> RunReport {
        let mut summary = RunSummary::new(self.mode == RunMode::DryRun);
        let mut progress = Progress::new(self.show_progress);

        // Step 1: Preflight gate
        if let Some(checker) = &self.checker {
            progress.spinner("Validating commands...");
            let validation = validate_packages(&packages, &self.config, checker.as_ref());
            progress.finish_and_clear();
            for warning in &validation.warnings {
                self.ctx.warn(warning);
            }
            if validation.has_errors() {
                summary.validation_errors = validation.errors.len();
                summary.finish();
                return RunReport {
                    mode: self.mode,
                    packages,
                    validation: Some(validation),
                    unsupported: Vec::new(),
                    unsupported_entries: Vec::new(),
                    groups: Vec::new(),
                    system_tests: Vec::new(),
                    summary,
                };
            }
        }

        // Step 2: Installed versions
        let mut packages = packages;
        self.apply_rule_defaults(&mut packages);
        self.classify_installs(&mut packages);

        // Step 3: List versions and resolve
        self.resolve_all(&mut packages, &mut progress).await;

        // Step 4: Unsupported packages
        let tracker = UnsupportedTracker::new();
        for pkg in &packages {
            if pkg.update_status == Some(UpdateStatus::ConfigError)
                || !should_track_unsupported(pkg.install_status)
            {
                continue;
            }
            if let Some(reason) = derive_unsupported_reason(pkg) {
                tracker.add(&pkg.rule, &pkg.package_type, &reason);
            }
        }

        // Step 5: Apply updates
        let mut groups = Vec::new();
        let mut suites = Vec::new();
        if self.mode == RunMode::Update {
            let (updated, outcomes) = self.apply_updates(packages, &mut progress, &mut suites).await;
            packages = updated;
            groups = outcomes;
        }

        packages.sort_by(|a, b| (&a.rule, &a.name).cmp(&(&b.rule, &b.name)));
        for pkg in &packages {
            summary.record(pkg);
        }
        summary.finish();
        info!(
            total = summary.total,
            failures = summary.failures(),
            "run finished"
        );

        RunReport {
            mode: self.mode,
            packages,
            validation: None,
            unsupported: tracker.messages(),
            unsupported_entries: tracker.entries(),
            groups,
            system_tests: suites,
            summary,
        }
    }

    fn package_dir(&self, pkg: &Package) -> PathBuf {
        match &pkg.working_dir {
            Some(dir) => self.root.join(dir),
            None => self.root.clone(),
        }
    }

    /// Fill in the rule's ecosystem tag and rewrite mapped declared versions
    fn apply_rule_defaults(&self, packages: &mut [Package]) {
        for pkg in packages.iter_mut() {
            let Some(rule) = self.config.rule(&pkg.rule) else {
                continue;
            };
            if pkg.package_type.trim().is_empty() {
                pkg.package_type = rule.manager.clone();
            }
            if let Some(mapped) = rule.normalize_constraint(&pkg.name, &pkg.declared_constraint) {
                debug!(
                    package = %pkg.name,
                    declared = %pkg.declared_constraint,
                    mapped = %mapped,
                    "declared version mapped"
                );
                pkg.declared_constraint = mapped;
            }
        }
    }

    /// Determine install statuses, reading each rule's lock files once per directory
    fn classify_installs(&self, packages: &mut [Package]) {
        let mut indexes: HashMap<(String, PathBuf), Result<LockIndex, String>> = HashMap::new();

        for pkg in packages.iter_mut() {
            let Some(rule) = self.config.rule(&pkg.rule) else {
                pkg.fail(
                    UpdateStatus::ConfigError,
                    format!("rule '{}' is not defined in the configuration", pkg.rule),
                );
                continue;
            };

            let dir = self.package_dir(pkg);
            let index = indexes
                .entry((rule.name.clone(), dir.clone()))
                .or_insert_with(|| {
                    LockIndex::build(&rule.lock_files, &FsLockFiles::new(dir.clone()))
                        .map_err(|e| e.to_string())
                });

            match index {
                Ok(index) => {
                    let outcome = index.lookup(&pkg.name);
                    trace!(package = %pkg.name, outcome = ?outcome, "lock lookup");
                    classify_install(pkg, rule, &outcome);
                }
                Err(message) => {
                    pkg.fail(UpdateStatus::ConfigError, message.clone());
                    continue;
                }
            }

            if rule.outdated_commands().is_none() {
                pkg.fail(
                    UpdateStatus::ConfigError,
                    ConfigError::missing_commands(&rule.name, "outdated").to_string(),
                );
            }
        }
    }

    /// List candidate versions and resolve every eligible package
    async fn resolve_all(&self, packages: &mut [Package], progress: &mut Progress) {
        let mut policies: BTreeMap<String, Result<VersioningPolicy, String>> = BTreeMap::new();
        for pkg in packages.iter() {
            if let Some(rule) = self.config.rule(&pkg.rule) {
                policies.entry(rule.name.clone()).or_insert_with(|| {
                    VersioningPolicy::from_rule(rule, &self.config, &self.ctx)
                        .map_err(|e| e.to_string())
                });
            }
        }

        let mut targets = Vec::new();
        for (i, pkg) in packages.iter_mut().enumerate() {
            if !needs_resolution(pkg) {
                continue;
            }
            match policies.get(&pkg.rule) {
                Some(Ok(_)) => targets.push(i),
                Some(Err(message)) => pkg.fail(UpdateStatus::ConfigError, message.clone()),
                None => {}
            }
        }

        progress.start(targets.len() as u64, "Checking");
        let ticker = progress.ticker();
        let policies = &policies;
        let results = {
            let shared: &[Package] = &*packages;
            join_all(targets.iter().map(|&i| {
                let pkg = &shared[i];
                let ticker = ticker.clone();
                async move {
                    let outcome = match self.config.rule(&pkg.rule) {
                        Some(rule) => self.list_versions(pkg, rule, policies).await,
                        None => ListOutcome::CommandFailed("rule not found".to_string()),
                    };
                    ticker.tick(&pkg.name);
                    outcome
                }
            }))
            .await
        };
        progress.finish_and_clear();

        let mut outcomes: HashMap<usize, ListOutcome> = targets.into_iter().zip(results).collect();
        let mut by_rule: BTreeMap<String, Vec<(&mut Package, ListOutcome)>> = BTreeMap::new();
        for (i, pkg) in packages.iter_mut().enumerate() {
            if let Some(outcome) = outcomes.remove(&i) {
                by_rule.entry(pkg.rule.clone()).or_default().push((pkg, outcome));
            }
        }

        for (rule_name, entries) in by_rule {
            let Some(Ok(policy)) = policies.get(&rule_name) else {
                continue;
            };
            for (pkg, versions) in apply_list_outcomes(entries) {
                let selection = policy.selection_for(&pkg.name);
                let resolution = resolve_with(
                    &pkg.declared_constraint,
                    pkg.current_version(),
                    &versions,
                    policy,
                    selection,
                    &self.ctx,
                );
                debug!(
                    package = %pkg.name,
                    target = ?resolution.target,
                    outcome = ?resolution.outcome,
                    ?selection,
                    "resolved"
                );
                classify_update(pkg, &resolution, self.mode);
            }
        }
    }

    async fn list_versions(
        &self,
        pkg: &Package,
        rule: &Rule,
        policies: &BTreeMap<String, Result<VersioningPolicy, String>>,
    ) -> ListOutcome {
        let (Some(template), Some(Ok(policy))) = (rule.outdated_commands(), policies.get(&rule.name))
        else {
            return ListOutcome::CommandFailed(
                ConfigError::missing_commands(&rule.name, "outdated").to_string(),
            );
        };
        let env = rule
            .outdated
            .as_ref()
            .map(|o| o.env.clone())
            .unwrap_or_default();
        let bindings = Bindings::package(&pkg.name)
            .with_version(pkg.current_version().unwrap_or_default())
            .with_constraint(&pkg.declared_constraint);
        let options = ExecOptions::new(rule.outdated_timeout())
            .with_env(env)
            .with_working_dir(Some(self.package_dir(pkg)));

        let _permit = self.semaphore.acquire().await.ok();
        match self.executor.execute_with(template, &bindings, &options).await {
            Ok(output) => match policy.parse_output(&output.stdout) {
                Ok(versions) => {
                    trace!(package = %pkg.name, count = versions.len(), "versions listed");
                    ListOutcome::Listed(versions)
                }
                Err(e) => ListOutcome::ParseFailed(e.to_string()),
            },
            Err(e) => {
                debug!(
                    package = %pkg.name,
                    timeout = e.is_timeout(),
                    output = e.full_output().unwrap_or_default(),
                    "list command failed"
                );
                if e.is_timeout() {
                    ListOutcome::TimedOut(e.to_string())
                } else {
                    ListOutcome::CommandFailed(e.to_string())
                }
            }
        }
    }

    /// Configured system tests, unless disabled
    fn system_test_suite(&self) -> Option<&SystemTestsCfg> {
        self.config.system_tests().filter(|_| self.system_tests)
    }

    /// Run update commands, group by group, with system tests around them
    async fn apply_updates(
        &self,
        mut packages: Vec<Package>,
        progress: &mut Progress,
        suites: &mut Vec<SuiteResult>,
    ) -> (Vec<Package>, Vec<GroupOutcome>) {
        for pkg in packages.iter_mut().filter(|p| wants_update(p)) {
            let missing = self
                .config
                .rule(&pkg.rule)
                .map(|rule| rule.update_commands().is_none())
                .unwrap_or(true);
            if missing {
                pkg.fail(
                    UpdateStatus::ConfigError,
                    ConfigError::missing_commands(&pkg.rule, "update").to_string(),
                );
            }
        }

        let suite = self.system_test_suite();
        let runner = suite.map(|s| SystemTestRunner::new(s, &self.executor, self.root.clone()));
        let pending = packages.iter().any(wants_update);

        if let (Some(suite), Some(runner)) = (suite, &runner) {
            if suite.run_preflight && pending {
                progress.spinner("Running system tests...");
                let baseline = runner.run(TestPhase::Preflight, None).await;
                progress.finish_and_clear();
                let blocked = suite.stop_on_fail && baseline.has_critical_failure();
                if blocked {
                    let message = format!("system tests failed before updates: {}", baseline.summary());
                    self.ctx.warn(&message);
                    for pkg in packages.iter_mut().filter(|p| wants_update(p)) {
                        pkg.fail(UpdateStatus::Failed, message.clone());
                    }
                }
                suites.push(baseline);
                if blocked {
                    return (packages, Vec::new());
                }
            }
        }

        progress.spinner("Applying updates...");
        let units = GroupCoordinator::partition(packages, |name| self.config.rule(name));
        let mut coordinator = GroupCoordinator::new();
        let mut packages = match (suite, &runner) {
            (Some(suite), Some(runner)) if suite.run_mode == SystemTestRunMode::AfterEach => {
                self.run_units_checked(units, runner, &mut coordinator, suites)
                    .await
            }
            _ => coordinator.run_all(units, self).await,
        };
        progress.finish_and_clear();
        let mut outcomes = coordinator.into_outcomes();

        let updated = packages
            .iter()
            .any(|p| p.update_status == Some(UpdateStatus::Updated));
        if let (Some(suite), Some(runner)) = (suite, &runner) {
            if suite.run_mode == SystemTestRunMode::AfterAll && updated {
                progress.spinner("Running system tests...");
                let result = runner.run(TestPhase::AfterAll, None).await;
                progress.finish_and_clear();
                if result.has_critical_failure() {
                    let message = format!("system tests failed after updates: {}", result.summary());
                    self.ctx.warn(&message);
                    mark_updated_failed(&mut packages, &message);
                    for outcome in outcomes.iter_mut() {
                        outcome.success = false;
                    }
                }
                suites.push(result);
            }
        }

        (packages, outcomes)
    }

    /// Run units one at a time, checking the project after each update
    async fn run_units_checked(
        &self,
        units: Vec<UpdateUnit>,
        runner: &SystemTestRunner<'_>,
        coordinator: &mut GroupCoordinator,
        suites: &mut Vec<SuiteResult>,
    ) -> Vec<Package> {
        let mut packages = Vec::new();
        for unit in units {
            let label = unit.key.clone().or_else(|| {
                unit.members
                    .first()
                    .map(|m| format!("{}/{}", m.rule, m.name))
            });
            let (mut members, mut outcome) = GroupCoordinator::run_unit(unit, self).await;
            if members
                .iter()
                .any(|m| m.update_status == Some(UpdateStatus::Updated))
            {
                let result = runner.run(TestPhase::AfterEach, label.as_deref()).await;
                if result.has_critical_failure() {
                    let message = format!("system tests failed: {}", result.summary());
                    mark_updated_failed(&mut members, &message);
                    if let Some(outcome) = outcome.as_mut() {
                        outcome.success = false;
                    }
                }
                suites.push(result);
            }
            coordinator.record(outcome);
            packages.extend(members);
        }
        packages
    }

    fn update_options(&self, rule: &Rule, dir: &Path) -> ExecOptions {
        let env = rule
            .update
            .as_ref()
            .map(|u| u.env.clone())
            .unwrap_or_default();
        ExecOptions::new(rule.update_timeout())
            .with_env(env)
            .with_working_dir(Some(dir.to_path_buf()))
    }
}

/// Updates already applied stay on disk; the packages are reported as failed
fn mark_updated_failed(packages: &mut [Package], message: &str) {
    for pkg in packages
        .iter_mut()
        .filter(|p| p.update_status == Some(UpdateStatus::Updated))
    {
        pkg.fail(UpdateStatus::Failed, message);
    }
}

#[async_trait]
impl MemberUpdater for Orchestrator {
    async fn update(&self, pkg: &Package) -> Result<(), String> {
        let rule = self
            .config
            .rule(&pkg.rule)
            .ok_or_else(|| format!("rule '{}' is not defined in the configuration", pkg.rule))?;
        let template = rule
            .update_commands()
            .ok_or_else(|| ConfigError::missing_commands(&rule.name, "update").to_string())?;
        let version = pkg.latest_version.clone().unwrap_or_default();
        let bindings = Bindings::package(&pkg.name)
            .with_version(version)
            .with_constraint(&pkg.declared_constraint);
        let options = self.update_options(rule, &self.package_dir(pkg));

        let _permit = self.semaphore.acquire().await.ok();
        self.ctx
            .verbose(&format!("Updating {} to {}", pkg.name, bindings.version));
        self.executor
            .execute_with(template, &bindings, &options)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
