//! Rule configuration
//!
//! This module provides:
//! - The `Config`/`Rule` model deserialized from TOML
//! - Defaults for timeouts, concurrency and bump policy
//! - Validation of patterns before a run starts
//!
//! A `Config` is immutable for the duration of a run and is shared between
//! workers behind an `Arc`.

use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default number of packages evaluated in parallel
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default timeout for "list versions" commands
pub const DEFAULT_OUTDATED_TIMEOUT_SECS: u64 = 60;

/// Default timeout for "apply update" commands
pub const DEFAULT_UPDATE_TIMEOUT_SECS: u64 = 300;

/// Default timeout for one system test
pub const DEFAULT_SYSTEM_TEST_TIMEOUT_SECS: u64 = 300;

/// Default config file name
pub const DEFAULT_CONFIG_FILE: &str = "depgate.toml";

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_true() -> bool {
    true
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Size of the worker pool
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Versions excluded for every rule
    #[serde(default)]
    pub exclude_versions: Vec<String>,
    /// Package-name patterns updated one step at a time, for every rule
    #[serde(default)]
    pub incremental: Vec<String>,
    /// Rules keyed by name
    #[serde(default)]
    pub rules: BTreeMap<String, Rule>,
    /// Project checks run around updates
    #[serde(default)]
    pub system_tests: Option<SystemTestsCfg>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            exclude_versions: Vec::new(),
            incremental: Vec::new(),
            rules: BTreeMap::new(),
            system_tests: None,
        }
    }
}

/// Per-ecosystem policy
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name (filled from the map key)
    #[serde(skip)]
    pub name: String,
    /// Ecosystem tag applied to packages of this rule
    #[serde(default)]
    pub manager: String,
    /// Ordered lock extraction specs (first match wins)
    #[serde(default)]
    pub lock_files: Vec<LockFileSpec>,
    /// "List available versions" configuration
    #[serde(default)]
    pub outdated: Option<OutdatedCfg>,
    /// "Apply update" configuration
    #[serde(default)]
    pub update: Option<UpdateCfg>,
    /// Version ordering
    #[serde(default)]
    pub sort_strategy: SortStrategy,
    /// How far a selected version may move from installed
    #[serde(default)]
    pub allowed_bump: AllowedBump,
    /// Exact versions dropped from candidates
    #[serde(default)]
    pub exclude_versions: Vec<String>,
    /// Regex patterns dropping candidates
    #[serde(default)]
    pub exclude_version_patterns: Vec<String>,
    /// Keep pre-release versions (alpha, beta, rc, ...)
    #[serde(default)]
    pub include_prereleases: bool,
    /// The manifest pins versions itself and acts as the lock file
    #[serde(default)]
    pub self_pinning: bool,
    /// Named atomic update groups: group name -> member packages
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
    /// Constraints treated as pinned even though they look floating
    #[serde(default)]
    pub floating_exceptions: Vec<String>,
    /// Package-name patterns that move to the nearest newer version
    #[serde(default)]
    pub incremental: Vec<String>,
    /// Declared-version tokens rewritten before classification
    #[serde(default)]
    pub latest_mapping: LatestMapping,
}

/// Rewrites of declared version tokens such as `latest` or `stable`
///
/// Keys are matched case-insensitively after trimming; package entries
/// override the defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LatestMapping {
    /// Token -> constraint for every package of the rule
    #[serde(default)]
    pub default: BTreeMap<String, String>,
    /// Package name -> token -> constraint
    #[serde(default)]
    pub packages: BTreeMap<String, BTreeMap<String, String>>,
}

impl LatestMapping {
    /// Mapped constraint for a declared token, if any
    pub fn map<'a>(&'a self, package: &str, declared: &str) -> Option<&'a str> {
        let key = declared.trim().to_lowercase();
        let lookup = |table: &'a BTreeMap<String, String>| -> Option<&'a str> {
            table
                .iter()
                .find(|(token, _)| token.trim().to_lowercase() == key)
                .map(|(_, value)| value.trim())
        };
        self.packages
            .get(package)
            .and_then(lookup)
            .or_else(|| lookup(&self.default))
    }
}

/// One lock extraction spec: (file globs, format, pattern)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockFileSpec {
    /// File globs relative to the run root
    pub files: Vec<String>,
    /// Reader applied before the pattern
    #[serde(default)]
    pub format: LockFormat,
    /// Named-capture pattern (`name`/`version`)
    #[serde(default)]
    pub extraction: ExtractionCfg,
}

/// Pattern configuration for lock extraction
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractionCfg {
    /// Regex with named captures `name` (or `n`) and `version`
    #[serde(default)]
    pub pattern: Option<String>,
    /// Slash-separated element path (XML)
    #[serde(default)]
    pub path: Option<String>,
    /// Attribute holding the package name (XML, default `id`)
    #[serde(default)]
    pub name_attr: Option<String>,
    /// Attribute holding the version (XML, default `version`)
    #[serde(default)]
    pub version_attr: Option<String>,
}

/// Lock file reader format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockFormat {
    /// Pattern applied line by line
    Lines,
    /// Structured JSON lock (pattern optional)
    Json,
    /// XML elements carrying name and version attributes
    Xml,
    /// Pattern applied to the whole text
    #[default]
    Text,
}

/// Configuration for listing available versions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutdatedCfg {
    /// Command template
    #[serde(default)]
    pub commands: String,
    /// Extra environment for the command
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Output format of the command
    #[serde(default)]
    pub format: VersionListFormat,
    /// How to pull versions out of the output
    #[serde(default)]
    pub extraction: OutputExtractionCfg,
    /// Custom version parsing
    #[serde(default)]
    pub versioning: VersioningCfg,
    /// Timeout in seconds
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// Output extraction for version lists
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutputExtractionCfg {
    /// Regex with a `version` capture (raw format)
    #[serde(default)]
    pub pattern: Option<String>,
    /// Dot path into JSON/YAML output, or element path into XML output
    #[serde(default)]
    pub json_key: Option<String>,
}

/// Custom version parsing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VersioningCfg {
    /// Regex with `major`/`minor`/`patch` captures
    #[serde(default)]
    pub regex: Option<String>,
    /// Sort direction of the command output (ordered strategy only)
    #[serde(default)]
    pub sort: SortOrder,
}

/// Version list output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionListFormat {
    /// JSON document
    Json,
    /// YAML document
    Yaml,
    /// XML document (element text)
    Xml,
    /// Plain text
    #[default]
    Raw,
}

/// Configuration for applying updates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateCfg {
    /// Command template
    #[serde(default)]
    pub commands: String,
    /// Extra environment for the command
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Group key template (`{{package}}`, `{{rule}}`, `{{type}}`)
    #[serde(default)]
    pub group: Option<String>,
    /// Timeout in seconds
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// Project checks run before and after updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemTestsCfg {
    /// Tests in run order
    #[serde(default)]
    pub tests: Vec<SystemTestCfg>,
    /// Run the tests before any update as a baseline
    #[serde(default = "default_true")]
    pub run_preflight: bool,
    /// When tests run after updates
    #[serde(default)]
    pub run_mode: SystemTestRunMode,
    /// Skip updates when the baseline run has a critical failure
    #[serde(default = "default_true")]
    pub stop_on_fail: bool,
}

impl Default for SystemTestsCfg {
    fn default() -> Self {
        Self {
            tests: Vec::new(),
            run_preflight: true,
            run_mode: SystemTestRunMode::default(),
            stop_on_fail: true,
        }
    }
}

/// One system test
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemTestCfg {
    /// Display name
    pub name: String,
    /// Command template, run from the project root
    #[serde(default)]
    pub commands: String,
    /// Extra environment for the commands
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Timeout in seconds
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// A failure of this test is reported but not critical
    #[serde(default)]
    pub continue_on_fail: bool,
}

impl SystemTestCfg {
    /// Timeout for the whole test
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout_seconds
                .unwrap_or(DEFAULT_SYSTEM_TEST_TIMEOUT_SECS),
        )
    }
}

/// When system tests run after updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemTestRunMode {
    /// After every update unit
    AfterEach,
    /// Once, after all updates
    #[default]
    AfterAll,
    /// Never after updates
    None,
}

/// Version ordering strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortStrategy {
    /// Semantic versioning with loose normalization
    #[default]
    Semver,
    /// Numeric major/minor/patch extracted by regex
    Numeric,
    /// Plain string ordering
    Lexical,
    /// Position in the command output decides
    Ordered,
}

/// Direction of an ordered version list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Newest first
    #[default]
    Desc,
    /// Oldest first
    Asc,
}

/// Bump policy relative to the installed version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedBump {
    /// Allow a higher major version
    #[serde(default = "default_true")]
    pub major: bool,
    /// Allow a higher minor version within the same major
    #[serde(default = "default_true")]
    pub minor: bool,
    /// Allow a higher patch version within the same major.minor
    #[serde(default = "default_true")]
    pub patch: bool,
}

impl Default for AllowedBump {
    fn default() -> Self {
        Self {
            major: true,
            minor: true,
            patch: true,
        }
    }
}

impl AllowedBump {
    /// Patch updates only
    pub fn patch_only() -> Self {
        Self {
            major: false,
            minor: false,
            patch: true,
        }
    }

    /// Minor and patch updates
    pub fn minor_and_patch() -> Self {
        Self {
            major: false,
            minor: true,
            patch: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::not_found(path));
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.assign_rule_names();
        config.validate()?;
        Ok(config)
    }

    /// Adds a rule (builder pattern)
    pub fn with_rule(mut self, name: impl Into<String>, mut rule: Rule) -> Self {
        let name = name.into();
        rule.name = name.clone();
        self.rules.insert(name, rule);
        self
    }

    /// Sets the worker pool size (builder pattern)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Look up a rule by name
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    fn assign_rule_names(&mut self) {
        for (name, rule) in self.rules.iter_mut() {
            rule.name = name.clone();
        }
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                message: "concurrency must be at least 1".to_string(),
            });
        }
        for pattern in &self.incremental {
            compile_package_pattern(pattern).map_err(|e| ConfigError::Invalid {
                message: format!("invalid incremental package pattern '{}': {}", pattern, e),
            })?;
        }
        for rule in self.rules.values() {
            rule.validate()?;
        }
        if let Some(suite) = &self.system_tests {
            for test in &suite.tests {
                if test.name.trim().is_empty() {
                    return Err(ConfigError::Invalid {
                        message: "system test name must not be empty".to_string(),
                    });
                }
                if test.commands.trim().is_empty() {
                    return Err(ConfigError::Invalid {
                        message: format!("system test '{}' has no commands", test.name),
                    });
                }
            }
        }
        Ok(())
    }

    /// System tests, when any are configured
    pub fn system_tests(&self) -> Option<&SystemTestsCfg> {
        self.system_tests.as_ref().filter(|s| !s.tests.is_empty())
    }

    /// Incremental patterns that apply to `rule`: the rule's own, then global
    pub fn incremental_patterns<'a>(&'a self, rule: &'a Rule) -> impl Iterator<Item = &'a String> {
        rule.incremental.iter().chain(self.incremental.iter())
    }
}

/// Compile a package-name pattern
///
/// Text with regex metacharacters is a regex; anything else must match the
/// whole name exactly.
pub fn compile_package_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = pattern.trim();
    if pattern.contains(|c: char| ".*+?{}()|[]^$\\".contains(c)) {
        Regex::new(pattern)
    } else {
        Regex::new(&format!("^{}$", regex::escape(pattern)))
    }
}

impl Rule {
    /// Creates an empty rule with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the outdated command template (builder pattern)
    pub fn with_outdated(mut self, commands: impl Into<String>) -> Self {
        let mut cfg = self.outdated.unwrap_or_default();
        cfg.commands = commands.into();
        self.outdated = Some(cfg);
        self
    }

    /// Sets the update command template (builder pattern)
    pub fn with_update(mut self, commands: impl Into<String>) -> Self {
        let mut cfg = self.update.unwrap_or_default();
        cfg.commands = commands.into();
        self.update = Some(cfg);
        self
    }

    /// Appends a lock extraction spec (builder pattern)
    pub fn with_lock_file(mut self, spec: LockFileSpec) -> Self {
        self.lock_files.push(spec);
        self
    }

    /// Trimmed outdated command template, if any
    pub fn outdated_commands(&self) -> Option<&str> {
        self.outdated
            .as_ref()
            .map(|o| o.commands.trim())
            .filter(|c| !c.is_empty())
    }

    /// Trimmed update command template, if any
    pub fn update_commands(&self) -> Option<&str> {
        self.update
            .as_ref()
            .map(|u| u.commands.trim())
            .filter(|c| !c.is_empty())
    }

    /// Timeout for the outdated command
    pub fn outdated_timeout(&self) -> Duration {
        Duration::from_secs(
            self.outdated
                .as_ref()
                .and_then(|o| o.timeout_seconds)
                .unwrap_or(DEFAULT_OUTDATED_TIMEOUT_SECS),
        )
    }

    /// Timeout for the update command
    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(
            self.update
                .as_ref()
                .and_then(|u| u.timeout_seconds)
                .unwrap_or(DEFAULT_UPDATE_TIMEOUT_SECS),
        )
    }

    /// Declared constraint after applying `latest_mapping`
    pub fn normalize_constraint(&self, package: &str, declared: &str) -> Option<String> {
        self.latest_mapping
            .map(package, declared)
            .filter(|mapped| *mapped != declared.trim())
            .map(str::to_string)
    }

    /// Returns the configured group containing `package`, if any
    pub fn group_for(&self, package: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, members)| members.iter().any(|m| m == package))
            .map(|(name, _)| name.as_str())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for pattern in &self.incremental {
            compile_package_pattern(pattern).map_err(|e| {
                ConfigError::invalid_pattern(&self.name, "incremental", e.to_string())
            })?;
        }
        for spec in &self.lock_files {
            if let Some(pattern) = &spec.extraction.pattern {
                Regex::new(pattern).map_err(|e| {
                    ConfigError::invalid_pattern(&self.name, "lock extraction", e.to_string())
                })?;
            }
        }
        if let Some(outdated) = &self.outdated {
            if let Some(pattern) = &outdated.extraction.pattern {
                Regex::new(pattern).map_err(|e| {
                    ConfigError::invalid_pattern(&self.name, "outdated extraction", e.to_string())
                })?;
            }
            if let Some(pattern) = &outdated.versioning.regex {
                Regex::new(pattern).map_err(|e| {
                    ConfigError::invalid_pattern(&self.name, "versioning", e.to_string())
                })?;
            }
        }
        Ok(())
    }
}
