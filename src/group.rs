//! Group coordinator
//!
//! Packages sharing a group key are updated as one unit: every member's
//! update command runs, the coordinator waits for all of them, and only then
//! assigns final statuses. The group is `Updated` only when every member
//! succeeded.
//!
//! Atomicity is reporting-level only. Members whose commands already
//! succeeded are not rolled back when a sibling fails; they are reported as
//! `Failed` so the group is never shown as partially updated.

use crate::classify::wants_update;
use crate::config::Rule;
use crate::domain::{Package, UpdateStatus};
use crate::exec::template::render_group_key;
use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Runs the update command for one member
#[async_trait]
pub trait MemberUpdater: Send + Sync {
    /// Update one package to its `latest_version`
    async fn update(&self, pkg: &Package) -> Result<(), String>;
}

/// Final outcome of one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupOutcome {
    /// Group key, scoped by rule (`rule/key`)
    pub key: String,
    /// Member package names
    pub members: Vec<String>,
    /// All members succeeded
    pub success: bool,
    /// Members whose own update failed
    pub failed: Vec<String>,
}

/// A set of packages updated together
#[derive(Debug)]
pub struct UpdateUnit {
    /// Scoped group key; `None` for a standalone package
    pub key: Option<String>,
    /// Members in input order
    pub members: Vec<Package>,
}

/// Resolve the group key of a package, scoped by its rule
///
/// Sources in order: the package's own group, the rule's `groups` map, the
/// rule's `update.group` template.
pub fn group_key(pkg: &Package, rule: Option<&Rule>) -> Option<String> {
    let key = pkg
        .group
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .or_else(|| {
            let rule = rule?;
            if let Some(name) = rule.group_for(&pkg.name) {
                return Some(name.to_string());
            }
            let template = rule.update.as_ref()?.group.as_deref()?;
            let rendered = render_group_key(template, &pkg.name, &pkg.rule, &pkg.package_type);
            let rendered = rendered.trim();
            (!rendered.is_empty()).then(|| rendered.to_string())
        })?;
    Some(format!("{}/{}", pkg.rule, key))
}

/// Coordinates grouped updates
#[derive(Debug, Default)]
pub struct GroupCoordinator {
    outcomes: Vec<GroupOutcome>,
}

impl GroupCoordinator {
    /// Creates a coordinator with no recorded outcomes
    pub fn new() -> Self {
        Self::default()
    }

    /// Split packages into update units
    ///
    /// Grouped packages are collected under their key; everything else is a
    /// unit of one. Units are ordered by key, standalone units by input order.
    pub fn partition<'r>(
        packages: Vec<Package>,
        rule_of: impl Fn(&str) -> Option<&'r Rule>,
    ) -> Vec<UpdateUnit> {
        let mut grouped: BTreeMap<String, Vec<Package>> = BTreeMap::new();
        let mut units = Vec::new();
        for pkg in packages {
            match group_key(&pkg, rule_of(&pkg.rule)) {
                Some(key) => grouped.entry(key).or_default().push(pkg),
                None => units.push(UpdateUnit {
                    key: None,
                    members: vec![pkg],
                }),
            }
        }
        let mut result: Vec<UpdateUnit> = grouped
            .into_iter()
            .map(|(key, members)| UpdateUnit {
                key: Some(key),
                members,
            })
            .collect();
        result.extend(units);
        result
    }

    /// Run one unit and assign final statuses
    ///
    /// Only members that want an update run their command. Members already
    /// in `ConfigError`/`SummarizeError` keep that status but still veto the
    /// group. Other members are left untouched.
    pub async fn run_unit(unit: UpdateUnit, updater: &dyn MemberUpdater) -> (Vec<Package>, Option<GroupOutcome>) {
        let UpdateUnit { key, mut members } = unit;

        let runnable: Vec<usize> = (0..members.len())
            .filter(|&i| wants_update(&members[i]))
            .collect();
        if runnable.is_empty() {
            return (members, None);
        }

        // Barrier: every member finishes before any status is assigned
        let results = join_all(runnable.iter().map(|&i| updater.update(&members[i]))).await;

        let Some(key) = key else {
            for (&i, result) in runnable.iter().zip(results) {
                crate::classify::apply_update_result(&mut members[i], result);
            }
            return (members, None);
        };

        let failed: Vec<String> = runnable
            .iter()
            .zip(&results)
            .filter(|(_, r)| r.is_err())
            .map(|(&i, _)| members[i].name.clone())
            .collect();
        let sticky: Vec<String> = members
            .iter()
            .filter(|m| m.update_status.map(|s| s.is_sticky()).unwrap_or(false))
            .map(|m| m.name.clone())
            .collect();
        let success = failed.is_empty() && sticky.is_empty();

        let culprit = failed.first().or(sticky.first()).cloned().unwrap_or_default();
        for (&i, result) in runnable.iter().zip(results) {
            let member = &mut members[i];
            match result {
                Ok(()) if success => {
                    member.update_status = Some(UpdateStatus::Updated);
                    member.error = None;
                }
                Ok(()) => member.fail(
                    UpdateStatus::Failed,
                    format!("group member '{}' failed", culprit),
                ),
                Err(message) => member.fail(UpdateStatus::Failed, message),
            }
        }

        if success {
            info!(group = %key, members = runnable.len(), "group updated");
        } else {
            debug!(group = %key, failed = ?failed, sticky = ?sticky, "group failed");
        }
        let outcome = GroupOutcome {
            key,
            members: members.iter().map(|m| m.name.clone()).collect(),
            success,
            failed: failed.into_iter().chain(sticky).collect(),
        };
        (members, Some(outcome))
    }

    /// Run all units concurrently, recording group outcomes
    pub async fn run_all(&mut self, units: Vec<UpdateUnit>, updater: &dyn MemberUpdater) -> Vec<Package> {
        let results = join_all(units.into_iter().map(|unit| Self::run_unit(unit, updater))).await;
        let mut packages = Vec::new();
        for (members, outcome) in results {
            packages.extend(members);
            self.record(outcome);
        }
        packages
    }

    /// Record the outcome of a unit run outside `run_all`
    pub fn record(&mut self, outcome: Option<GroupOutcome>) {
        self.outcomes.extend(outcome);
    }

    /// Recorded outcomes, sorted by key
    pub fn into_outcomes(mut self) -> Vec<GroupOutcome> {
        self.outcomes.sort_by(|a, b| a.key.cmp(&b.key));
        self.outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpdateCfg;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FakeUpdater {
        failing: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeUpdater {
        fn failing(names: &[&str]) -> Self {
            Self {
                failing: names.iter().map(|n| n.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MemberUpdater for FakeUpdater {
        async fn update(&self, pkg: &Package) -> Result<(), String> {
            self.calls.lock().unwrap().push(pkg.name.clone());
            if self.failing.contains(&pkg.name) {
                Err(format!("{} exploded", pkg.name))
            } else {
                Ok(())
            }
        }
    }

    fn outdated(name: &str, group: &str) -> Package {
        let mut pkg = Package::new(name, "npm", "js", "1.0.0")
            .with_installed("1.0.0")
            .with_group(group);
        pkg.update_status = Some(UpdateStatus::Outdated);
        pkg.latest_version = Some("2.0.0".to_string());
        pkg
    }

    fn unit(members: Vec<Package>) -> UpdateUnit {
        UpdateUnit {
            key: Some("npm/g1".to_string()),
            members,
        }
    }

    #[tokio::test]
    async fn test_group_all_succeed() {
        let updater = FakeUpdater::failing(&[]);
        let (members, outcome) = GroupCoordinator::run_unit(
            unit(vec![outdated("a", "g1"), outdated("b", "g1")]),
            &updater,
        )
        .await;
        assert!(members
            .iter()
            .all(|m| m.update_status == Some(UpdateStatus::Updated)));
        assert!(outcome.unwrap().success);
    }

    #[tokio::test]
    async fn test_group_member_failure_fails_everyone() {
        let updater = FakeUpdater::failing(&["b"]);
        let (members, outcome) = GroupCoordinator::run_unit(
            unit(vec![outdated("a", "g1"), outdated("b", "g1"), outdated("c", "g1")]),
            &updater,
        )
        .await;

        assert_eq!(updater.calls.lock().unwrap().len(), 3);
        assert!(members
            .iter()
            .all(|m| m.update_status == Some(UpdateStatus::Failed)));
        assert_eq!(members[0].error.as_deref(), Some("group member 'b' failed"));
        assert_eq!(members[1].error.as_deref(), Some("b exploded"));
        let outcome = outcome.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.failed, vec!["b"]);
    }

    #[tokio::test]
    async fn test_sticky_member_keeps_status_and_vetoes() {
        let updater = FakeUpdater::failing(&[]);
        let mut broken = outdated("b", "g1");
        broken.fail(UpdateStatus::SummarizeError, "list failed");
        let (members, outcome) =
            GroupCoordinator::run_unit(unit(vec![outdated("a", "g1"), broken]), &updater).await;

        assert_eq!(members[0].update_status, Some(UpdateStatus::Failed));
        assert_eq!(members[1].update_status, Some(UpdateStatus::SummarizeError));
        assert!(!outcome.unwrap().success);
    }

    #[tokio::test]
    async fn test_standalone_unit() {
        let updater = FakeUpdater::failing(&["solo"]);
        let mut pkg = outdated("solo", "unused");
        pkg.group = None;
        let (members, outcome) = GroupCoordinator::run_unit(
            UpdateUnit {
                key: None,
                members: vec![pkg],
            },
            &updater,
        )
        .await;
        assert!(outcome.is_none());
        assert_eq!(members[0].update_status, Some(UpdateStatus::Failed));
        assert_eq!(members[0].error.as_deref(), Some("solo exploded"));
    }

    #[tokio::test]
    async fn test_up_to_date_members_are_untouched() {
        let updater = FakeUpdater::failing(&[]);
        let mut current = outdated("b", "g1");
        current.update_status = Some(UpdateStatus::UpToDate);
        let (members, _) =
            GroupCoordinator::run_unit(unit(vec![outdated("a", "g1"), current]), &updater).await;
        assert_eq!(members[1].update_status, Some(UpdateStatus::UpToDate));
        assert_eq!(updater.calls.lock().unwrap().as_slice(), ["a"]);
    }

    #[test]
    fn test_group_key_sources() {
        let mut rule = Rule::new("npm");
        rule.groups
            .insert("react".to_string(), vec!["react-dom".to_string()]);
        rule.update = Some(UpdateCfg {
            group: Some("{{type}}-{{package}}".to_string()),
            ..Default::default()
        });

        let explicit = Package::new("x", "npm", "js", "1").with_group("mine");
        assert_eq!(group_key(&explicit, Some(&rule)).as_deref(), Some("npm/mine"));

        let mapped = Package::new("react-dom", "npm", "js", "1");
        assert_eq!(group_key(&mapped, Some(&rule)).as_deref(), Some("npm/react"));

        let templated = Package::new("lodash", "npm", "js", "1");
        assert_eq!(
            group_key(&templated, Some(&rule)).as_deref(),
            Some("npm/js-lodash")
        );

        assert_eq!(group_key(&templated, None), None);
    }

    #[test]
    fn test_partition_scopes_by_rule() {
        let packages = vec![
            Package::new("a", "npm", "js", "1").with_group("g1"),
            Package::new("b", "pip", "python", "1").with_group("g1"),
            Package::new("c", "npm", "js", "1"),
            Package::new("d", "npm", "js", "1").with_group("g1"),
        ];
        let units = GroupCoordinator::partition(packages, |_| None);
        let keys: Vec<Option<&str>> = units.iter().map(|u| u.key.as_deref()).collect();
        assert_eq!(keys, vec![Some("npm/g1"), Some("pip/g1"), None]);
        assert_eq!(units[0].members.len(), 2);
    }
}
