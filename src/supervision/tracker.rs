//! Unsupported-package tracker
//!
//! Aggregates packages that cannot be acted on, one entry per
//! `(rule, package type)`. The first reason recorded for a key is kept and
//! later additions only bump the count.

use crate::domain::{InstallStatus, Package};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::debug;

/// Sink for unsupported-package reasons
pub trait Tracker: Send + Sync {
    /// Record one package; empty reasons are ignored
    fn add(&self, rule: &str, package_type: &str, reason: &str);

    /// Formatted messages, sorted by rule then type
    fn messages(&self) -> Vec<String>;
}

/// Aggregated entry for one `(rule, package type)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsupportedRuleInfo {
    /// Rule name
    pub rule: String,
    /// Package type
    pub package_type: String,
    /// Reason from the first insertion
    pub reason: String,
    /// Number of packages recorded
    pub count: usize,
}

impl UnsupportedRuleInfo {
    /// `⛔ <rule> (<type>): <reason> (<n> packages)`
    pub fn message(&self) -> String {
        format!(
            "⛔ {} ({}): {} ({} packages)",
            self.rule, self.package_type, self.reason, self.count
        )
    }
}

/// Lock-guarded tracker shared by the workers of a run
#[derive(Debug, Default)]
pub struct UnsupportedTracker {
    entries: RwLock<BTreeMap<(String, String), UnsupportedRuleInfo>>,
}

impl UnsupportedTracker {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct `(rule, type)` entries
    pub fn count(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of packages across all entries
    pub fn total_packages(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|info| info.count)
            .sum()
    }

    /// Snapshot of all entries in sorted order
    pub fn entries(&self) -> Vec<UnsupportedRuleInfo> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

impl Tracker for UnsupportedTracker {
    fn add(&self, rule: &str, package_type: &str, reason: &str) {
        let reason = reason.trim();
        if reason.is_empty() {
            return;
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries
            .entry((rule.to_string(), package_type.to_string()))
            .and_modify(|info| info.count += 1)
            .or_insert_with(|| UnsupportedRuleInfo {
                rule: rule.to_string(),
                package_type: package_type.to_string(),
                reason: reason.to_string(),
                count: 1,
            });
    }

    fn messages(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(UnsupportedRuleInfo::message)
            .collect()
    }
}

/// Returns true if packages with this install status belong in the tracker
pub fn should_track_unsupported(status: InstallStatus) -> bool {
    status.is_unsupported()
}

/// Human-readable reason a package cannot be acted on, if any
pub fn derive_unsupported_reason(package: &Package) -> Option<String> {
    match package.install_status {
        InstallStatus::VersionMissing => {
            Some("No concrete version found in manifest or lock file.".to_string())
        }
        InstallStatus::Floating => Some(format!(
            "Floating constraint '{}' - update manually or remove constraint.",
            package.declared_constraint.trim()
        )),
        InstallStatus::NotConfigured => {
            debug!(
                package = %package.name,
                rule = %package.rule,
                "no lock extraction configured; add lock_files or self_pinning to the rule"
            );
            None
        }
        InstallStatus::Installed | InstallStatus::SelfPinned => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_reason_wins_and_counts_increment() {
        let tracker = UnsupportedTracker::new();
        tracker.add("npm", "js", "first reason");
        tracker.add("npm", "js", "second reason");
        tracker.add("npm", "js", "third reason");
        assert_eq!(
            tracker.messages(),
            vec!["⛔ npm (js): first reason (3 packages)"]
        );
        assert_eq!(tracker.count(), 1);
        assert_eq!(tracker.total_packages(), 3);
    }

    #[test]
    fn test_empty_reason_is_ignored() {
        let tracker = UnsupportedTracker::new();
        tracker.add("npm", "js", "   ");
        tracker.add("npm", "js", "");
        assert!(tracker.messages().is_empty());
        assert_eq!(tracker.total_packages(), 0);
    }

    #[test]
    fn test_messages_sorted_by_rule_then_type() {
        let tracker = UnsupportedTracker::new();
        tracker.add("pip", "python", "r1");
        tracker.add("npm", "ts", "r2");
        tracker.add("npm", "js", "r3");
        let messages = tracker.messages();
        assert_eq!(
            messages,
            vec![
                "⛔ npm (js): r3 (1 packages)",
                "⛔ npm (ts): r2 (1 packages)",
                "⛔ pip (python): r1 (1 packages)",
            ]
        );
    }

    #[test]
    fn test_concurrent_adds() {
        let tracker = Arc::new(UnsupportedTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        tracker.add("go", "golang", "reason");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.total_packages(), 200);
    }

    #[test]
    fn test_tracker_as_trait_object() {
        let tracker: Box<dyn Tracker> = Box::new(UnsupportedTracker::new());
        tracker.add("a", "b", "c");
        assert_eq!(tracker.messages().len(), 1);
    }

    #[test]
    fn test_reason_version_missing() {
        let mut pkg = Package::new("lodash", "npm", "js", "4.17.21");
        pkg.install_status = InstallStatus::VersionMissing;
        assert_eq!(
            derive_unsupported_reason(&pkg).as_deref(),
            Some("No concrete version found in manifest or lock file.")
        );
    }

    #[test]
    fn test_reason_floating() {
        let mut pkg = Package::new("lodash", "npm", "js", "5.*");
        pkg.install_status = InstallStatus::Floating;
        let reason = derive_unsupported_reason(&pkg).unwrap();
        assert!(reason.contains("Floating constraint"));
        assert!(reason.contains("5.*"));
    }

    #[test]
    fn test_reason_not_configured_is_none() {
        let pkg = Package::new("lodash", "npm", "js", "1.0.0");
        assert_eq!(pkg.install_status, InstallStatus::NotConfigured);
        assert!(derive_unsupported_reason(&pkg).is_none());
    }

    #[test]
    fn test_should_track() {
        assert!(should_track_unsupported(InstallStatus::NotConfigured));
        assert!(should_track_unsupported(InstallStatus::Floating));
        assert!(should_track_unsupported(InstallStatus::VersionMissing));
        assert!(!should_track_unsupported(InstallStatus::Installed));
        assert!(!should_track_unsupported(InstallStatus::SelfPinned));
    }
}
