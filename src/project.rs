//! The app project a patch run targets.

use crate::config::version::version_from_dependency_spec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FRAMEWORK_PACKAGE: &str = "react-native";

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PackageManifest {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, String>,
}

/// Version of react-native the app depends on, from its `package.json`.
///
/// `Ok(None)` when the dependency is missing or is not a plain version.
pub fn read_framework_version(project_root: &Path) -> Result<Option<String>, ProjectError> {
    let path = project_root.join("package.json");
    let contents = fs::read_to_string(&path).map_err(|source| ProjectError::Io {
        path: path.clone(),
        source,
    })?;
    let manifest: PackageManifest =
        serde_json::from_str(&contents).map_err(|source| ProjectError::Json {
            path: path.clone(),
            source,
        })?;

    Ok(manifest
        .dependencies
        .get(FRAMEWORK_PACKAGE)
        .or_else(|| manifest.dev_dependencies.get(FRAMEWORK_PACKAGE))
        .and_then(|spec| version_from_dependency_spec(spec)))
}

/// Whether `dir` looks like a mobile app project root.
pub fn is_project_root(dir: &Path) -> bool {
    dir.join("package.json").is_file() && dir.join("ios").is_dir()
}

/// Walk up from `start` to the nearest app project root.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| is_project_root(dir))
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(package_json: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), package_json).unwrap();
        fs::create_dir_all(dir.path().join("ios/App")).unwrap();
        dir
    }

    #[test]
    fn test_reads_dependency_version() {
        let dir = project(r#"{"name":"app","dependencies":{"react-native":"0.63.4"}}"#);
        assert_eq!(
            read_framework_version(dir.path()).unwrap().as_deref(),
            Some("0.63.4")
        );
    }

    #[test]
    fn test_falls_back_to_dev_dependencies() {
        let dir = project(r#"{"devDependencies":{"react-native":"^0.72.1"}}"#);
        assert_eq!(
            read_framework_version(dir.path()).unwrap().as_deref(),
            Some("0.72.1")
        );
    }

    #[test]
    fn test_missing_dependency() {
        let dir = project(r#"{"dependencies":{"react":"18.2.0"}}"#);
        assert_eq!(read_framework_version(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_invalid_json() {
        let dir = project("{ not json");
        assert!(matches!(
            read_framework_version(dir.path()),
            Err(ProjectError::Json { .. })
        ));
    }

    #[test]
    fn test_find_project_root_from_nested_dir() {
        let dir = project("{}");
        let nested = dir.path().join("ios/App");
        assert_eq!(
            find_project_root(&nested).unwrap(),
            dir.path().to_path_buf()
        );
    }
}
