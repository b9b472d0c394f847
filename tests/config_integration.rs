//! Integration tests for the patch pipeline
//!
//! Tests version gating, idempotency, dialect checks and target safety
//! against throwaway app projects.

use native_patcher::config::{
    apply_patches, check_patches, load_from_path, load_from_str, preset, ApplicationError,
    PatchResult,
};
use native_patcher::diagnostics::WarningAggregator;
use native_patcher::project::read_framework_version;
use native_patcher::store::FsStore;
use native_patcher::tiered::Tier;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const RN_063: &str = include_str!("fixtures/ios/rn063_AppDelegate.m");
const RN_071: &str = include_str!("fixtures/ios/rn071_AppDelegate.mm");
const NO_MATCH: &str = include_str!("fixtures/ios/no_match_AppDelegate.m");
const SWIFT: &str = include_str!("fixtures/ios/AppDelegate.swift");

/// Helper to create an app project with one application delegate
fn setup_project(rn_version: &str, delegate_name: &str, delegate: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        format!(r#"{{"name":"app","dependencies":{{"react-native":"{rn_version}"}}}}"#),
    )
    .unwrap();
    let app_dir = dir.path().join("ios/HelloWorld");
    fs::create_dir_all(&app_dir).unwrap();
    fs::write(app_dir.join(delegate_name), delegate).unwrap();
    dir
}

fn delegate(dir: &TempDir, name: &str) -> String {
    fs::read_to_string(dir.path().join("ios/HelloWorld").join(name)).unwrap()
}

fn version(dir: &TempDir) -> Option<String> {
    read_framework_version(dir.path()).unwrap()
}

#[test]
fn test_preset_applies_once() {
    let dir = setup_project("0.63.4", "AppDelegate.m", RN_063);
    let config = preset::firebase_app().unwrap();
    let mut warnings = WarningAggregator::new();

    let report = apply_patches(
        &config,
        dir.path(),
        version(&dir).as_deref(),
        &FsStore,
        &mut warnings,
    );
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].0, "firebase-app-configure");
    assert!(matches!(
        report.results[0].1,
        Ok(PatchResult::Applied {
            tier: Some(Tier::Primary),
            ..
        })
    ));
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].before, RN_063);

    let first = delegate(&dir, "AppDelegate.m");
    assert_eq!(first.matches("[FIRApp configure];").count(), 1);
    assert_eq!(first.matches("@import Firebase;").count(), 1);

    let report = apply_patches(
        &config,
        dir.path(),
        version(&dir).as_deref(),
        &FsStore,
        &mut warnings,
    );
    assert!(matches!(
        report.results[0].1,
        Ok(PatchResult::AlreadyApplied { .. })
    ));
    assert!(report.changes.is_empty());
    assert_eq!(delegate(&dir, "AppDelegate.m"), first);
    assert!(warnings.is_empty());
}

#[test]
fn test_fallback_on_modern_template() {
    let dir = setup_project("^0.71.3", "AppDelegate.mm", RN_071);
    let config = preset::firebase_app().unwrap();
    let mut warnings = WarningAggregator::new();

    let report = apply_patches(
        &config,
        dir.path(),
        version(&dir).as_deref(),
        &FsStore,
        &mut warnings,
    );
    assert!(matches!(
        report.results[0].1,
        Ok(PatchResult::Applied {
            tier: Some(Tier::Fallback),
            ..
        })
    ));

    let patched = delegate(&dir, "AppDelegate.mm");
    let lines: Vec<&str> = patched.lines().collect();
    let brace = lines.iter().position(|l| *l == "{").unwrap();
    assert!(lines[brace + 1].contains("@generated begin"));
    assert!(lines[brace + 1].contains("-fallback"));
    assert_eq!(lines[brace + 2], "[FIRApp configure];");
}

#[test]
fn test_no_insertion_point_is_warning_not_error() {
    let dir = setup_project("0.63.4", "AppDelegate.m", NO_MATCH);
    let config = preset::firebase_app().unwrap();
    let mut warnings = WarningAggregator::new();

    let report = apply_patches(
        &config,
        dir.path(),
        version(&dir).as_deref(),
        &FsStore,
        &mut warnings,
    );
    assert!(matches!(
        report.results[0].1,
        Ok(PatchResult::NotApplicable { .. })
    ));
    assert_eq!(report.failures(), 0);
    assert_eq!(warnings.warnings().len(), 1);
    assert!(!delegate(&dir, "AppDelegate.m").contains("[FIRApp configure];"));
}

#[test]
fn test_swift_delegate_is_rejected() {
    let dir = setup_project("0.72.0", "AppDelegate.swift", SWIFT);
    let config = preset::firebase_app().unwrap();
    let mut warnings = WarningAggregator::new();

    let report = apply_patches(
        &config,
        dir.path(),
        version(&dir).as_deref(),
        &FsStore,
        &mut warnings,
    );
    assert!(matches!(
        report.results[0].1,
        Err(ApplicationError::UnsupportedDialect { .. })
    ));
    assert_eq!(delegate(&dir, "AppDelegate.swift"), SWIFT);
}

#[test]
fn test_version_range_skips() {
    let dir = setup_project("0.59.10", "AppDelegate.m", RN_063);
    let config = preset::firebase_app().unwrap();
    let mut warnings = WarningAggregator::new();

    let report = apply_patches(
        &config,
        dir.path(),
        version(&dir).as_deref(),
        &FsStore,
        &mut warnings,
    );
    match &report.results[0].1 {
        Ok(PatchResult::SkippedVersion { reason }) => {
            assert!(reason.contains("0.59.10"));
            assert!(reason.contains(">=0.60.0"));
        }
        other => panic!("expected SkippedVersion, got {other:?}"),
    }
    assert_eq!(delegate(&dir, "AppDelegate.m"), RN_063);
}

#[test]
fn test_check_patches_is_read_only() {
    let dir = setup_project("0.63.4", "AppDelegate.m", RN_063);
    let config = preset::firebase_app().unwrap();
    let mut warnings = WarningAggregator::new();

    let report = check_patches(&config, dir.path(), Some("0.63.4"), &mut warnings);
    assert!(matches!(report.results[0].1, Ok(PatchResult::Applied { .. })));
    assert_eq!(report.changes.len(), 1);
    assert!(report.changes[0].after.contains("[FIRApp configure];"));
    assert_eq!(delegate(&dir, "AppDelegate.m"), RN_063);
}

const TWO_INSERTS: &str = r#"
[meta]
name = "@acme/sdk"

[[inserts]]
id = "start"
file = "ios/HelloWorld/AppDelegate.m"
tag = "@acme/sdk-start"
fragment = "[ACME start];"

[inserts.anchor]
type = "text"
search = "return YES;"

[[inserts]]
id = "log"
file = "ios/HelloWorld/AppDelegate.m"
tag = "@acme/sdk-log"
fragment = "[ACME log:@\"launched\"];"

[inserts.anchor]
type = "text"
search = "return YES;"
"#;

#[test]
fn test_inserts_sharing_a_file_apply_in_order() {
    let dir = setup_project("0.63.4", "AppDelegate.m", RN_063);
    let config = load_from_str(TWO_INSERTS).unwrap();
    let mut warnings = WarningAggregator::new();

    let report = apply_patches(&config, dir.path(), None, &FsStore, &mut warnings);
    let ids: Vec<&str> = report.results.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, ["start", "log"]);
    assert!(report.results.iter().all(|(_, r)| r.is_ok()));
    assert_eq!(report.changes.len(), 1);

    let patched = delegate(&dir, "AppDelegate.m");
    let start = patched.find("[ACME start];").unwrap();
    let log = patched.find("[ACME log:").unwrap();
    let ret = patched.find("return YES;").unwrap();
    assert!(start < log && log < ret);
}

#[test]
fn test_target_in_node_modules_is_refused() {
    let dir = setup_project("0.63.4", "AppDelegate.m", RN_063);
    let vendored = dir.path().join("node_modules/sdk/ios/Vendor.m");
    fs::create_dir_all(vendored.parent().unwrap()).unwrap();
    fs::write(&vendored, "return YES;\n").unwrap();

    let config = load_from_str(&TWO_INSERTS.replace(
        "ios/HelloWorld/AppDelegate.m",
        "node_modules/sdk/ios/Vendor.m",
    ))
    .unwrap();
    let mut warnings = WarningAggregator::new();

    let report = apply_patches(&config, dir.path(), None, &FsStore, &mut warnings);
    assert!(report
        .results
        .iter()
        .all(|(_, r)| matches!(r, Err(ApplicationError::Safety(_)))));
    assert_eq!(fs::read_to_string(&vendored).unwrap(), "return YES;\n");
}

#[test]
fn test_load_from_project_patch_dir() {
    let dir = setup_project("0.63.4", "AppDelegate.m", RN_063);
    let patch_dir = dir.path().join("native-patches");
    fs::create_dir_all(&patch_dir).unwrap();
    let path = patch_dir.join("acme.toml");
    fs::write(&path, TWO_INSERTS).unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.meta.name, "@acme/sdk");
    assert_eq!(config.inserts.len(), 2);
    assert!(Path::new(config.inserts[0].file.as_deref().unwrap()).ends_with("AppDelegate.m"));
}
