//! Package list loading
//!
//! Packages come from a discovery step outside this crate, handed over as a
//! file. Two shapes are accepted:
//! - JSON: an array of package objects, or `{"packages": [...]}`
//! - TOML: `[[packages]]` tables
//!
//! Each package needs `name` and `rule`; `type`, `constraint`, `group` and
//! `working_dir` are optional.

use crate::domain::Package;
use crate::error::InputError;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize)]
struct PackageList {
    #[serde(default)]
    packages: Vec<Package>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonPackages {
    List(Vec<Package>),
    Wrapped(PackageList),
}

/// Load a package list from a file, picking the format from its content
pub fn load_packages(path: &Path) -> Result<Vec<Package>, InputError> {
    let content = std::fs::read_to_string(path).map_err(|source| InputError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let packages = parse_packages(&content).map_err(|message| InputError::ParseError {
        path: path.to_path_buf(),
        message,
    })?;
    debug!(path = %path.display(), count = packages.len(), "package list loaded");
    Ok(packages)
}

/// Parse package list text (JSON when it starts with `[` or `{`, otherwise TOML)
pub fn parse_packages(content: &str) -> Result<Vec<Package>, String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let trimmed = content.trim_start();

    let is_json =
        trimmed.starts_with('{') || (trimmed.starts_with('[') && !trimmed.starts_with("[["));

    let packages = if is_json {
        match serde_json::from_str::<JsonPackages>(content).map_err(|e| e.to_string())? {
            JsonPackages::List(packages) => packages,
            JsonPackages::Wrapped(list) => list.packages,
        }
    } else {
        toml::from_str::<PackageList>(content)
            .map_err(|e| e.to_string())?
            .packages
    };

    for pkg in &packages {
        if pkg.name.trim().is_empty() {
            return Err("package with empty name".to_string());
        }
        if pkg.rule.trim().is_empty() {
            return Err(format!("package '{}' has no rule", pkg.name));
        }
    }
    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InstallStatus;
    use std::path::PathBuf;

    #[test]
    fn test_parse_json_array() {
        let packages = parse_packages(
            r#"[
                {"name": "lodash", "rule": "npm", "type": "js", "constraint": "4.17.20"},
                {"name": "react", "rule": "npm", "group": "ui", "working_dir": "web"}
            ]"#,
        )
        .unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].package_type, "js");
        assert_eq!(packages[0].declared_constraint, "4.17.20");
        assert_eq!(packages[0].install_status, InstallStatus::NotConfigured);
        assert!(packages[0].update_status.is_none());
        assert_eq!(packages[1].group.as_deref(), Some("ui"));
        assert_eq!(packages[1].working_dir, Some(PathBuf::from("web")));
        assert_eq!(packages[1].declared_constraint, "");
    }

    #[test]
    fn test_parse_json_wrapped() {
        let packages =
            parse_packages(r#"{"packages": [{"name": "serde", "rule": "cargo"}]}"#).unwrap();
        assert_eq!(packages[0].name, "serde");
    }

    #[test]
    fn test_parse_toml_tables() {
        let packages = parse_packages(
            r#"
[[packages]]
name = "golang.org/x/text"
rule = "go"
type = "golang"
constraint = "v0.14.0"

[[packages]]
name = "cobra"
rule = "go"
"#,
        )
        .unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].declared_constraint, "v0.14.0");
        assert_eq!(packages[1].name, "cobra");
    }

    #[test]
    fn test_parse_rejects_missing_rule() {
        let err = parse_packages(r#"[{"name": "x", "rule": " "}]"#).unwrap_err();
        assert!(err.contains("has no rule"));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_packages("{not json").is_err());
        assert!(parse_packages("packages = 3").is_err());
    }

    #[test]
    fn test_load_packages_errors_carry_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = load_packages(&missing).unwrap_err();
        assert!(err.to_string().contains("missing.json"));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "[{").unwrap();
        assert!(matches!(
            load_packages(&bad).unwrap_err(),
            InputError::ParseError { .. }
        ));
    }

    #[test]
    fn test_load_packages_empty_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packages.toml");
        std::fs::write(&path, "").unwrap();
        assert!(load_packages(&path).unwrap().is_empty());
    }
}
