//! Extraction engine
//!
//! This module provides:
//! - Lock file lookup through the `LockFileSource` collaborator
//! - Format readers (line-oriented, JSON, XML, generic text)
//! - `LockIndex`: installed versions per extraction spec, queried in
//!   priority order (the first spec that knows a package wins)

mod files;
mod readers;

pub use files::{FsLockFiles, LockFileSource};
pub use readers::{normalize_name, normalize_version, read_entries, read_entries_with, XmlSelect};
pub(crate) use readers::find_elements;

use crate::config::LockFileSpec;
use crate::error::ExtractError;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Result of looking up one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// A version was captured
    Found {
        /// Installed version
        version: String,
        /// Index of the spec that produced it
        spec_index: usize,
    },
    /// Lock files exist but none mentions the package
    NotFound,
    /// No configured lock file exists on disk
    NoLockFiles,
    /// The rule has no extraction specs
    NotConfigured,
}

impl ExtractionOutcome {
    /// The captured version, if any
    pub fn version(&self) -> Option<&str> {
        match self {
            ExtractionOutcome::Found { version, .. } => Some(version),
            _ => None,
        }
    }
}

/// Installed versions gathered from every spec of a rule
#[derive(Debug, Clone, Default)]
pub struct LockIndex {
    configured: bool,
    files_found: usize,
    by_spec: Vec<HashMap<String, String>>,
}

impl LockIndex {
    /// Read every spec through `source`
    ///
    /// Only I/O failures are errors; text that matches nothing just yields an
    /// empty map for that spec.
    pub fn build(specs: &[LockFileSpec], source: &dyn LockFileSource) -> Result<Self, ExtractError> {
        let mut index = LockIndex {
            configured: !specs.is_empty(),
            ..Default::default()
        };

        for (i, spec) in specs.iter().enumerate() {
            let pattern = match &spec.extraction.pattern {
                Some(p) => Some(Regex::new(p).map_err(|e| ExtractError::InvalidPattern {
                    pattern: p.clone(),
                    message: e.to_string(),
                })?),
                None => None,
            };

            let files = source.find(&spec.files)?;
            trace!(spec = i, files = files.len(), "lock files matched");
            index.files_found += files.len();

            let mut versions = HashMap::new();
            for file in files {
                let content = source.read(&file)?;
                let entries = read_entries_with(
                    spec.format,
                    &content,
                    pattern.as_ref(),
                    XmlSelect::from_cfg(&spec.extraction),
                );
                debug!(file = %file.display(), entries = entries.len(), "lock extraction");
                for (name, version) in entries {
                    versions.entry(name).or_insert(version);
                }
            }
            index.by_spec.push(versions);
        }

        Ok(index)
    }

    /// Look up a package, specs in declared order
    pub fn lookup(&self, name: &str) -> ExtractionOutcome {
        if !self.configured {
            return ExtractionOutcome::NotConfigured;
        }
        for (spec_index, versions) in self.by_spec.iter().enumerate() {
            if let Some(version) = versions.get(name) {
                return ExtractionOutcome::Found {
                    version: version.clone(),
                    spec_index,
                };
            }
        }
        if self.files_found == 0 {
            ExtractionOutcome::NoLockFiles
        } else {
            ExtractionOutcome::NotFound
        }
    }

    /// Number of lock files read
    pub fn files_found(&self) -> usize {
        self.files_found
    }
}

/// Best-effort installed version for one package
pub fn extract_installed(
    specs: &[LockFileSpec],
    source: &dyn LockFileSource,
    name: &str,
) -> Result<ExtractionOutcome, ExtractError> {
    Ok(LockIndex::build(specs, source)?.lookup(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtractionCfg, LockFormat};
    use std::fs;

    fn spec(files: &[&str], format: LockFormat, pattern: Option<&str>) -> LockFileSpec {
        LockFileSpec {
            files: files.iter().map(|f| f.to_string()).collect(),
            format,
            extraction: ExtractionCfg {
                pattern: pattern.map(|p| p.to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_first_spec_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.lock"), "lodash 1.0.0\n").unwrap();
        fs::write(dir.path().join("b.lock"), "lodash 2.0.0\nreact 18.0.0\n").unwrap();
        let pattern = r"^(?P<name>\S+) (?P<version>\S+)$";
        let specs = vec![
            spec(&["a.lock"], LockFormat::Lines, Some(pattern)),
            spec(&["b.lock"], LockFormat::Lines, Some(pattern)),
        ];
        let source = FsLockFiles::new(dir.path());
        let index = LockIndex::build(&specs, &source).unwrap();

        assert_eq!(
            index.lookup("lodash"),
            ExtractionOutcome::Found {
                version: "1.0.0".to_string(),
                spec_index: 0
            }
        );
        assert_eq!(
            index.lookup("react"),
            ExtractionOutcome::Found {
                version: "18.0.0".to_string(),
                spec_index: 1
            }
        );
        assert_eq!(index.lookup("vue"), ExtractionOutcome::NotFound);
    }

    #[test]
    fn test_no_specs_is_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsLockFiles::new(dir.path());
        let outcome = extract_installed(&[], &source, "x").unwrap();
        assert_eq!(outcome, ExtractionOutcome::NotConfigured);
    }

    #[test]
    fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsLockFiles::new(dir.path());
        let specs = vec![spec(&["composer.lock"], LockFormat::Json, None)];
        let outcome = extract_installed(&specs, &source, "x").unwrap();
        assert_eq!(outcome, ExtractionOutcome::NoLockFiles);
    }

    #[test]
    fn test_malformed_text_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package-lock.json"), "garbage{{").unwrap();
        let source = FsLockFiles::new(dir.path());
        let specs = vec![spec(&["package-lock.json"], LockFormat::Json, None)];
        let outcome = extract_installed(&specs, &source, "lodash").unwrap();
        assert_eq!(outcome, ExtractionOutcome::NotFound);
        assert!(outcome.version().is_none());
    }

    struct BrokenSource;

    impl LockFileSource for BrokenSource {
        fn find(&self, _patterns: &[String]) -> Result<Vec<std::path::PathBuf>, ExtractError> {
            Ok(vec!["/locked/file".into()])
        }

        fn read(&self, path: &std::path::Path) -> Result<String, ExtractError> {
            Err(ExtractError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            ))
        }
    }

    #[test]
    fn test_io_failure_is_error() {
        let specs = vec![spec(&["x"], LockFormat::Text, Some("(?P<name>a)(?P<version>b)"))];
        let err = extract_installed(&specs, &BrokenSource, "a").unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }
}
