//! End-to-end tests for the depgate CLI
//!
//! These tests verify:
//! - Check, dry-run and update modes against real `sh` commands
//! - CLI produces the expected JSON report schema
//! - Exit codes are correct for various scenarios

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

const RULES: &str = r#"
concurrency = 2

[rules.npm]
manager = "js"

[[rules.npm.lock_files]]
files = ["package-lock.json"]
format = "json"

[rules.npm.outdated]
commands = "echo 4.17.20 4.17.21"

[rules.npm.update]
commands = "touch {{package}}@{{version}}.updated"

[rules.go]
manager = "golang"
self_pinning = true

[rules.go.outdated]
commands = "printf 'v0.14.0\nv0.15.0\n'"
"#;

const PACKAGES: &str = r#"[
  {"name": "lodash", "rule": "npm", "type": "js", "constraint": "4.17.20"},
  {"name": "golang.org/x/text", "rule": "go", "type": "golang", "constraint": "v0.14.0"}
]"#;

/// Create a project with a config, a package list and a lock file
fn create_test_project(rules: &str, packages: &str) -> TempDir {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    fs::write(temp_dir.path().join("depgate.toml"), rules).unwrap();
    fs::write(temp_dir.path().join("packages.json"), packages).unwrap();
    fs::write(
        temp_dir.path().join("package-lock.json"),
        r#"{"lodash": "4.17.20"}"#,
    )
    .unwrap();
    temp_dir
}

/// Get a Command for the depgate binary, running commands through plain `sh`
fn depgate_cmd(project: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("depgate").expect("Failed to find depgate binary");
    cmd.arg(project.path())
        .arg("--packages")
        .arg(project.path().join("packages.json"))
        .env("SHELL", "")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn json_report(cmd: &mut Command) -> (Value, i32) {
    let output = cmd.arg("--json").output().expect("Failed to run depgate");
    let value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    (value, output.status.code().unwrap_or(-1))
}

fn package<'a>(report: &'a Value, name: &str) -> &'a Value {
    report["packages"]
        .as_array()
        .and_then(|packages| packages.iter().find(|p| p["name"] == name))
        .expect("package in report")
}

#[test]
fn test_help_lists_flags() {
    Command::cargo_bin("depgate")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--packages"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--skip-preflight"));
}

#[test]
fn test_check_mode_json_report() {
    let project = create_test_project(RULES, PACKAGES);
    let (report, code) = json_report(&mut depgate_cmd(&project));

    assert_eq!(code, 0);
    assert_eq!(report["mode"], "check");
    assert_eq!(report["exit_code"], 0);
    assert_eq!(report["summary"]["total"], 2);
    assert_eq!(report["summary"]["statuses"]["Outdated"], 2);

    let lodash = package(&report, "lodash");
    assert_eq!(lodash["install_status"], "installed");
    assert_eq!(lodash["installed_version"], "4.17.20");
    assert_eq!(lodash["latest_version"], "4.17.21");
    assert_eq!(lodash["update_status"], "outdated");

    let text = package(&report, "golang.org/x/text");
    assert_eq!(text["install_status"], "self_pinned");
    assert_eq!(text["latest_version"], "v0.15.0");

    assert!(!project.path().join("lodash@4.17.21.updated").exists());
}

#[test]
fn test_dry_run_text_output() {
    let project = create_test_project(RULES, PACKAGES);
    depgate_cmd(&project)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("lodash"))
        .stdout(predicate::str::contains("Planned"))
        .stdout(predicate::str::contains("4.17.20 -> 4.17.21 [patch]"))
        .stdout(predicate::str::contains("(dry-run) 2 packages: 2 Planned"));

    assert!(!project.path().join("lodash@4.17.21.updated").exists());
}

#[test]
fn test_update_runs_in_project_root() {
    let project = create_test_project(RULES, PACKAGES);
    let mut cmd = depgate_cmd(&project);
    cmd.args(["--update", "--rule", "npm"]);
    let (report, code) = json_report(&mut cmd);

    assert_eq!(code, 0);
    assert_eq!(report["mode"], "update");
    assert_eq!(report["packages"].as_array().map(Vec::len), Some(1));
    assert_eq!(package(&report, "lodash")["update_status"], "updated");
    assert!(project.path().join("lodash@4.17.21.updated").exists());
}

#[test]
fn test_failed_update_exits_with_two() {
    let rules = RULES.replace("touch {{package}}@{{version}}.updated", "false");
    let project = create_test_project(&rules, PACKAGES);
    let mut cmd = depgate_cmd(&project);
    cmd.arg("--update");
    let (report, code) = json_report(&mut cmd);

    assert_eq!(code, 2);
    assert_eq!(report["exit_code"], 2);
    let lodash = package(&report, "lodash");
    assert_eq!(lodash["update_status"], "failed");
    assert!(lodash["error"]
        .as_str()
        .unwrap_or_default()
        .contains("exit code 1"));
}

#[test]
fn test_missing_command_fails_preflight() {
    let rules = RULES.replace("echo 4.17.20 4.17.21", "depgate-missing-binary-xyz view {{package}}");
    let project = create_test_project(&rules, PACKAGES);
    depgate_cmd(&project)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Pre-flight validation failed:"))
        .stderr(predicate::str::contains(
            "command not found: depgate-missing-binary-xyz",
        ))
        .stdout(predicate::str::contains("1 validation error(s), run aborted"));
}

#[test]
fn test_skip_preflight_reports_rule_failure() {
    let rules = RULES.replace("echo 4.17.20 4.17.21", "depgate-missing-binary-xyz view {{package}}");
    let project = create_test_project(&rules, PACKAGES);
    let mut cmd = depgate_cmd(&project);
    cmd.arg("--skip-preflight");
    let (report, code) = json_report(&mut cmd);

    assert_eq!(code, 0);
    assert_eq!(package(&report, "lodash")["update_status"], "summarize_error");
}

#[test]
fn test_toml_package_list() {
    let project = create_test_project(RULES, PACKAGES);
    fs::write(
        project.path().join("packages.toml"),
        "[[packages]]\nname = \"lodash\"\nrule = \"npm\"\ntype = \"js\"\nconstraint = \"4.17.20\"\n",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("depgate").unwrap();
    cmd.arg(project.path())
        .arg("-p")
        .arg(project.path().join("packages.toml"))
        .env("SHELL", "")
        .env_remove("RUST_LOG");
    let (report, code) = json_report(&mut cmd);
    assert_eq!(code, 0);
    assert_eq!(report["summary"]["total"], 1);
}

#[test]
fn test_unsupported_packages_aggregate_per_rule() {
    let packages = r#"[
      {"name": "left-pad", "rule": "npm", "type": "js", "constraint": "1.3.0"},
      {"name": "react", "rule": "npm", "type": "js", "constraint": "^18.0.0"}
    ]"#;
    let project = create_test_project(RULES, packages);
    depgate_cmd(&project)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "⛔ npm (js): No concrete version found in manifest or lock file. (2 packages)",
        ))
        .stdout(predicate::str::contains("Floating constraint").not());
}

#[test]
fn test_missing_config_is_an_error() {
    let project = create_test_project(RULES, PACKAGES);
    fs::remove_file(project.path().join("depgate.toml")).unwrap();
    depgate_cmd(&project)
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn test_invalid_package_list_is_an_error() {
    let project = create_test_project(RULES, "[{\"name\": ");
    depgate_cmd(&project)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse package list"));
}
