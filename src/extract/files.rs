//! Lock file lookup
//!
//! The extraction engine never touches the file system directly; it asks a
//! `LockFileSource` for candidate files. `FsLockFiles` matches glob patterns
//! (`*`, `?`, `**`, `{a,b}`, `[..]`) against paths relative to a root
//! directory. Literal patterns are checked directly without a walk.

use crate::error::ExtractError;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::{DirEntry, WalkDir};

/// Directories never searched for lock files
const SKIPPED_DIRS: &[&str] = &["node_modules", "vendor", "target"];

/// Supplies lock files to the extraction engine
pub trait LockFileSource: Send + Sync {
    /// Files matching any of the patterns, sorted and deduplicated
    fn find(&self, patterns: &[String]) -> Result<Vec<PathBuf>, ExtractError>;

    /// Read a file found by `find`
    fn read(&self, path: &Path) -> Result<String, ExtractError>;
}

/// File-system backed lock file source
#[derive(Debug, Clone)]
pub struct FsLockFiles {
    root: PathBuf,
}

impl FsLockFiles {
    /// Create a source rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(&self, globs: &GlobSet, max_depth: usize) -> Result<Vec<PathBuf>, ExtractError> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 && is_missing(&e) => return Ok(Vec::new()),
                Err(e) => {
                    let path = e.path().unwrap_or(&self.root).to_path_buf();
                    return Err(ExtractError::io(path, io::Error::from(e)));
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if globs.is_match(relative) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

impl LockFileSource for FsLockFiles {
    fn find(&self, patterns: &[String]) -> Result<Vec<PathBuf>, ExtractError> {
        let mut files = Vec::new();
        let mut builder = GlobSetBuilder::new();
        let mut globbed = 0usize;
        let mut max_depth = 1usize;

        for pattern in patterns.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            let pattern = pattern.trim_start_matches("./");
            if !is_glob(pattern) {
                let path = self.root.join(pattern);
                if path.is_file() {
                    files.push(path);
                }
                continue;
            }

            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| ExtractError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?;
            builder.add(glob);
            globbed += 1;
            max_depth = if pattern.contains("**") {
                usize::MAX
            } else {
                max_depth.max(pattern.split('/').count())
            };
        }

        if globbed > 0 {
            let globs = builder.build().map_err(|e| ExtractError::InvalidPattern {
                pattern: patterns.join(", "),
                message: e.to_string(),
            })?;
            files.extend(self.walk(&globs, max_depth)?);
        }

        files.sort();
        files.dedup();
        trace!(root = %self.root.display(), count = files.len(), "lock files found");
        Ok(files)
    }

    fn read(&self, path: &Path) -> Result<String, ExtractError> {
        std::fs::read_to_string(path).map_err(|e| ExtractError::io(path, e))
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

fn is_skipped(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.') || SKIPPED_DIRS.contains(&name))
        .unwrap_or(true)
}

fn is_missing(err: &walkdir::Error) -> bool {
    err.io_error()
        .map(|e| e.kind() == ErrorKind::NotFound)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package-lock.json"), "{}").unwrap();
        fs::write(dir.path().join("yarn.lock"), "").unwrap();
        fs::write(dir.path().join("pnpm-lock.yaml"), "").unwrap();
        fs::create_dir_all(dir.path().join("services/api")).unwrap();
        fs::write(dir.path().join("services/api/go.sum"), "").unwrap();
        fs::write(dir.path().join("services/api/yarn.lock"), "").unwrap();
        fs::create_dir_all(dir.path().join("node_modules/x")).unwrap();
        fs::write(dir.path().join("node_modules/x/go.sum"), "").unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/go.sum"), "").unwrap();
        dir
    }

    fn find(dir: &tempfile::TempDir, patterns: &[&str]) -> Vec<PathBuf> {
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        FsLockFiles::new(dir.path()).find(&patterns).unwrap()
    }

    #[test]
    fn test_find_literal() {
        let dir = setup();
        assert_eq!(
            find(&dir, &["package-lock.json"]),
            vec![dir.path().join("package-lock.json")]
        );
        assert_eq!(
            find(&dir, &["./services/api/go.sum"]),
            vec![dir.path().join("services/api/go.sum")]
        );
    }

    #[test]
    fn test_find_missing_literal_is_empty() {
        let dir = setup();
        assert!(find(&dir, &["Cargo.lock"]).is_empty());
    }

    #[test]
    fn test_find_wildcard_stays_in_its_directory() {
        let dir = setup();
        assert_eq!(find(&dir, &["*.lock"]), vec![dir.path().join("yarn.lock")]);
    }

    #[test]
    fn test_find_recursive_skips_vendored_and_hidden_dirs() {
        let dir = setup();
        assert_eq!(
            find(&dir, &["**/go.sum"]),
            vec![dir.path().join("services/api/go.sum")]
        );
    }

    #[test]
    fn test_find_alternatives_and_classes() {
        let dir = setup();
        assert_eq!(
            find(&dir, &["{yarn.lock,pnpm-lock.yaml}"]),
            vec![dir.path().join("pnpm-lock.yaml"), dir.path().join("yarn.lock")]
        );
        assert_eq!(
            find(&dir, &["p[mn]pm-lock.*"]),
            vec![dir.path().join("pnpm-lock.yaml")]
        );
    }

    #[test]
    fn test_find_dedupes_across_patterns() {
        let dir = setup();
        assert_eq!(find(&dir, &["yarn.lock", "*.lock"]).len(), 1);
    }

    #[test]
    fn test_find_under_missing_root_is_empty() {
        let dir = setup();
        let source = FsLockFiles::new(dir.path().join("absent"));
        assert!(source.find(&["**/*.lock".to_string()]).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_glob_is_reported() {
        let dir = setup();
        let err = FsLockFiles::new(dir.path())
            .find(&["{unclosed".to_string()])
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPattern { .. }));
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = setup();
        let source = FsLockFiles::new(dir.path());
        let err = source.read(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }
}
