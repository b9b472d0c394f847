//! Patch applicator: runs a patch set against an app project.
//!
//! Inserts are grouped by target file so each file is read once, has every
//! hook applied in sequence, and is written once. Results come back in the
//! order the inserts are declared.

use crate::anchor::AnchorError;
use crate::config::schema::{InsertDefinition, PatchConfig};
use crate::config::version::{check_range, RangeCheck, VersionError};
use crate::diagnostics::WarningAggregator;
use crate::ios::{locate_app_delegate, modify_objc_app_delegate, AppDelegate, Dialect, LocateError};
use crate::merge::PatchOutcome;
use crate::safety::{ProjectGuard, SafetyError};
use crate::store::{DryRunStore, FsStore, SourceStore, StoreError};
use crate::tiered::Tier;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of applying a single insert
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchResult should be checked for success/failure"]
pub enum PatchResult {
    /// Fragment was inserted (or would be, in a dry run).
    ///
    /// `tier` is `None` when only the insert's import line was missing.
    Applied { file: PathBuf, tier: Option<Tier> },
    /// Fragment and import were already present
    AlreadyApplied { file: PathBuf },
    /// Patch set was skipped due to version constraint
    SkippedVersion { reason: String },
    /// No anchor matched; a warning was recorded and the file left alone
    NotApplicable { file: PathBuf, reason: String },
}

impl PatchResult {
    pub fn file(&self) -> Option<&Path> {
        match self {
            PatchResult::Applied { file, .. }
            | PatchResult::AlreadyApplied { file }
            | PatchResult::NotApplicable { file, .. } => Some(file),
            PatchResult::SkippedVersion { .. } => None,
        }
    }
}

impl fmt::Display for PatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchResult::Applied { file, tier } => match tier {
                Some(tier) => write!(f, "Applied ({tier} anchor) to {}", file.display()),
                None => write!(f, "Applied import to {}", file.display()),
            },
            PatchResult::AlreadyApplied { file } => {
                write!(f, "Already applied to {}", file.display())
            }
            PatchResult::SkippedVersion { reason } => {
                write!(f, "Skipped (version): {}", reason)
            }
            PatchResult::NotApplicable { file, reason } => {
                write!(f, "Not applicable to {}: {}", file.display(), reason)
            }
        }
    }
}

/// Errors during patch application
///
/// File-level failures are shared by every insert targeting that file.
#[derive(Debug, Clone)]
pub enum ApplicationError {
    /// Version filtering error
    Version(VersionError),
    /// Reading or writing the target failed
    Store(Arc<StoreError>),
    /// Target is outside the project or in a forbidden directory
    Safety(Arc<SafetyError>),
    /// No application delegate could be found
    Locate(Arc<LocateError>),
    /// Target file is not in a language the patcher can edit
    UnsupportedDialect { file: PathBuf, dialect: Dialect },
    /// Anchor failed to compile
    InvalidAnchor {
        insert_id: String,
        source: Arc<AnchorError>,
    },
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::Version(e) => write!(f, "version error: {}", e),
            ApplicationError::Store(e) => write!(f, "{}", e),
            ApplicationError::Safety(e) => write!(f, "safety check failed: {}", e),
            ApplicationError::Locate(e) => write!(f, "{}", e),
            ApplicationError::UnsupportedDialect { file, dialect } => write!(
                f,
                "{} is {dialect}; only Objective-C application delegates can be patched",
                file.display()
            ),
            ApplicationError::InvalidAnchor { insert_id, source } => {
                write!(f, "insert '{}' has an invalid anchor: {}", insert_id, source)
            }
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Version(e) => Some(e),
            ApplicationError::Store(e) => Some(&**e),
            ApplicationError::Safety(e) => Some(&**e),
            ApplicationError::Locate(e) => Some(&**e),
            ApplicationError::InvalidAnchor { source, .. } => Some(&**source),
            ApplicationError::UnsupportedDialect { .. } => None,
        }
    }
}

impl From<VersionError> for ApplicationError {
    fn from(e: VersionError) -> Self {
        ApplicationError::Version(e)
    }
}

impl From<StoreError> for ApplicationError {
    fn from(e: StoreError) -> Self {
        ApplicationError::Store(Arc::new(e))
    }
}

impl From<SafetyError> for ApplicationError {
    fn from(e: SafetyError) -> Self {
        ApplicationError::Safety(Arc::new(e))
    }
}

impl From<LocateError> for ApplicationError {
    fn from(e: LocateError) -> Self {
        ApplicationError::Locate(Arc::new(e))
    }
}

/// One file's contents before and after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub before: String,
    pub after: String,
}

/// Outcome of running one patch set.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Per-insert results, keyed by insert id, in declaration order.
    pub results: Vec<(String, Result<PatchResult, ApplicationError>)>,
    /// Files whose contents changed (or would change, in a dry run).
    pub changes: Vec<FileChange>,
}

impl ApplyReport {
    fn uniform(config: &PatchConfig, result: Result<PatchResult, ApplicationError>) -> Self {
        Self {
            results: config
                .inserts
                .iter()
                .map(|insert| (insert.id.clone(), result.clone()))
                .collect(),
            changes: Vec::new(),
        }
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_err()).count()
    }
}

/// Apply a patch configuration to an app project
///
/// # Arguments
///
/// * `config` - The patch configuration to apply
/// * `project_root` - Root directory of the app project
/// * `framework_version` - react-native version of the app, when known
/// * `store` - Where target files are read from and written to
/// * `warnings` - Receives a warning for every insert with no insertion point
pub fn apply_patches(
    config: &PatchConfig,
    project_root: &Path,
    framework_version: Option<&str>,
    store: &dyn SourceStore,
    warnings: &mut WarningAggregator,
) -> ApplyReport {
    match check_range(config.meta.version_range.as_deref(), framework_version) {
        Ok(RangeCheck::Satisfied) => apply_batched(config, project_root, store, warnings),
        Ok(RangeCheck::Unknown { range }) => {
            warnings.add_warning_ios(
                config.meta.name.clone(),
                format!("react-native version unknown; applying without checking version_range {range}"),
            );
            apply_batched(config, project_root, store, warnings)
        }
        Ok(RangeCheck::Outside { version, range }) => ApplyReport::uniform(
            config,
            Ok(PatchResult::SkippedVersion {
                reason: format!("react-native {version} does not satisfy version_range {range}"),
            }),
        ),
        Err(e) => ApplyReport::uniform(config, Err(ApplicationError::Version(e))),
    }
}

/// Check patch status without mutating the project.
///
/// Result semantics mirror `apply_patches`: `Applied` means "would apply".
pub fn check_patches(
    config: &PatchConfig,
    project_root: &Path,
    framework_version: Option<&str>,
    warnings: &mut WarningAggregator,
) -> ApplyReport {
    let store = DryRunStore::new(FsStore);
    apply_patches(config, project_root, framework_version, &store, warnings)
}

/// A resolved target file and the inserts aimed at it.
struct TargetGroup<'a> {
    dialect: Dialect,
    inserts: Vec<&'a InsertDefinition>,
}

fn apply_batched(
    config: &PatchConfig,
    project_root: &Path,
    store: &dyn SourceStore,
    warnings: &mut WarningAggregator,
) -> ApplyReport {
    let guard = match ProjectGuard::new(project_root) {
        Ok(guard) => guard,
        Err(e) => return ApplyReport::uniform(config, Err(e.into())),
    };

    let mut report = ApplyReport::default();
    let mut groups: BTreeMap<PathBuf, TargetGroup<'_>> = BTreeMap::new();
    let mut app_delegate: Option<Result<AppDelegate, ApplicationError>> = None;

    // Group inserts by resolved file path
    for insert in &config.inserts {
        let (path, dialect) = match &insert.file {
            Some(file) => {
                let path = project_root.join(file);
                let dialect = Dialect::from_path(&path);
                (path, dialect)
            }
            None => {
                let located = app_delegate
                    .get_or_insert_with(|| locate_app_delegate(project_root).map_err(Into::into));
                match located {
                    Ok(found) => (found.path.clone(), found.dialect.clone()),
                    Err(e) => {
                        report.results.push((insert.id.clone(), Err(e.clone())));
                        continue;
                    }
                }
            }
        };
        groups
            .entry(path)
            .or_insert_with(|| TargetGroup {
                dialect,
                inserts: Vec::new(),
            })
            .inserts
            .push(insert);
    }

    // Process each file once
    for (path, group) in groups {
        apply_group(config, &guard, &path, group, store, warnings, &mut report);
    }

    // Restore declaration order; BTreeMap iteration is by path.
    let order: HashMap<&str, usize> = config
        .inserts
        .iter()
        .enumerate()
        .map(|(i, insert)| (insert.id.as_str(), i))
        .collect();
    report
        .results
        .sort_by_key(|(id, _)| order.get(id.as_str()).copied().unwrap_or(usize::MAX));

    report
}

fn apply_group(
    config: &PatchConfig,
    guard: &ProjectGuard,
    path: &Path,
    group: TargetGroup<'_>,
    store: &dyn SourceStore,
    warnings: &mut WarningAggregator,
    report: &mut ApplyReport,
) {
    let fail_all = |report: &mut ApplyReport, error: ApplicationError| {
        for insert in &group.inserts {
            report.results.push((insert.id.clone(), Err(error.clone())));
        }
    };

    let canonical = match guard.validate_path(path) {
        Ok(canonical) => canonical,
        Err(e) => return fail_all(report, e.into()),
    };

    if !group.dialect.is_supported() {
        return fail_all(
            report,
            ApplicationError::UnsupportedDialect {
                file: path.to_path_buf(),
                dialect: group.dialect.clone(),
            },
        );
    }

    let snapshot = match store.read(&canonical) {
        Ok(snapshot) => snapshot,
        Err(e) => return fail_all(report, e.into()),
    };

    let mut contents = snapshot.contents.clone();
    let mut group_results = Vec::with_capacity(group.inserts.len());

    for insert in &group.inserts {
        let hook = match insert.to_hook(&config.meta.name) {
            Ok(hook) => hook,
            Err(source) => {
                group_results.push((
                    insert.id.clone(),
                    Err(ApplicationError::InvalidAnchor {
                        insert_id: insert.id.clone(),
                        source: Arc::new(source),
                    }),
                ));
                continue;
            }
        };

        let modified = modify_objc_app_delegate(&contents, &hook, warnings);
        let result = match &modified.insertion.outcome {
            PatchOutcome::Patched(_) => PatchResult::Applied {
                file: path.to_path_buf(),
                tier: modified.insertion.tier,
            },
            PatchOutcome::Unchanged if modified.import_added => PatchResult::Applied {
                file: path.to_path_buf(),
                tier: None,
            },
            PatchOutcome::Unchanged => PatchResult::AlreadyApplied {
                file: path.to_path_buf(),
            },
            PatchOutcome::NotApplicable(reason) => PatchResult::NotApplicable {
                file: path.to_path_buf(),
                reason: reason.clone(),
            },
        };
        debug!(insert = %insert.id, file = %path.display(), result = %result, "insert evaluated");
        group_results.push((insert.id.clone(), Ok(result)));
        contents = modified.contents;
    }

    if contents == snapshot.contents {
        report.results.extend(group_results);
        return;
    }

    match store.write(&snapshot, &contents) {
        Ok(written) => {
            info!(file = %path.display(), result = ?written, "patched");
            report.results.extend(group_results);
            report.changes.push(FileChange {
                path: path.to_path_buf(),
                before: snapshot.contents,
                after: contents,
            });
        }
        Err(e) => {
            // Nothing landed, so nothing this group computed was applied.
            let error = ApplicationError::from(e);
            for (id, result) in group_results {
                let result = match result {
                    Ok(PatchResult::Applied { .. }) => Err(error.clone()),
                    other => other,
                };
                report.results.push((id, result));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::load_from_str;
    use std::fs;

    const CONFIG: &str = r#"
[meta]
name = "@acme/sdk"
version_range = ">=0.60.0"

[[inserts]]
id = "start"
tag = "@acme/sdk-start"
fragment = "[ACME start];"

[inserts.anchor]
type = "text"
search = "return YES;"
"#;

    const DELEGATE: &str = "#import \"AppDelegate.h\"\n\n@implementation AppDelegate\n\n- (BOOL)application:(UIApplication *)application didFinishLaunchingWithOptions:(NSDictionary *)launchOptions\n{\n  return YES;\n}\n\n@end\n";

    fn project(delegate_name: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        fs::create_dir_all(dir.path().join("ios/App")).unwrap();
        fs::write(dir.path().join("ios/App").join(delegate_name), DELEGATE).unwrap();
        dir
    }

    #[test]
    fn test_apply_then_already_applied() {
        let dir = project("AppDelegate.m");
        let config = load_from_str(CONFIG).unwrap();
        let mut warnings = WarningAggregator::new();

        let report = apply_patches(&config, dir.path(), Some("0.63.4"), &FsStore, &mut warnings);
        assert!(matches!(
            report.results[0].1,
            Ok(PatchResult::Applied {
                tier: Some(Tier::Primary),
                ..
            })
        ));
        assert_eq!(report.changes.len(), 1);

        let patched = fs::read_to_string(dir.path().join("ios/App/AppDelegate.m")).unwrap();
        assert!(patched.contains("[ACME start];"));

        let report = apply_patches(&config, dir.path(), Some("0.63.4"), &FsStore, &mut warnings);
        assert!(matches!(
            report.results[0].1,
            Ok(PatchResult::AlreadyApplied { .. })
        ));
        assert!(report.changes.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_version_filtering() {
        let dir = project("AppDelegate.m");
        let config = load_from_str(CONFIG).unwrap();
        let mut warnings = WarningAggregator::new();

        let report = apply_patches(&config, dir.path(), Some("0.59.0"), &FsStore, &mut warnings);
        assert!(matches!(
            report.results[0].1,
            Ok(PatchResult::SkippedVersion { .. })
        ));

        let report = apply_patches(&config, dir.path(), Some("bogus"), &FsStore, &mut warnings);
        assert!(matches!(
            report.results[0].1,
            Err(ApplicationError::Version(_))
        ));

        let untouched = fs::read_to_string(dir.path().join("ios/App/AppDelegate.m")).unwrap();
        assert_eq!(untouched, DELEGATE);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unknown_version_applies_with_warning() {
        let dir = project("AppDelegate.m");
        let config = load_from_str(CONFIG).unwrap();
        let mut warnings = WarningAggregator::new();

        let report = apply_patches(&config, dir.path(), None, &FsStore, &mut warnings);
        assert!(matches!(
            report.results[0].1,
            Ok(PatchResult::Applied { .. })
        ));
        assert_eq!(warnings.warnings().len(), 1);
        let warning = &warnings.warnings()[0];
        assert_eq!(warning.scope, "@acme/sdk");
        assert!(warning.message.contains("version unknown"));
        assert!(warning.message.contains(">=0.60.0"));

        let patched = fs::read_to_string(dir.path().join("ios/App/AppDelegate.m")).unwrap();
        assert!(patched.contains("[ACME start];"));
    }

    #[test]
    fn test_swift_delegate_is_unsupported() {
        let dir = project("AppDelegate.swift");
        let config = load_from_str(CONFIG).unwrap();
        let mut warnings = WarningAggregator::new();

        let report = apply_patches(&config, dir.path(), Some("0.72.0"), &FsStore, &mut warnings);
        let err = report.results[0].1.as_ref().unwrap_err();
        assert!(matches!(err, ApplicationError::UnsupportedDialect { .. }));
        assert!(err.to_string().contains("swift"));
    }

    #[test]
    fn test_check_patches_does_not_write() {
        let dir = project("AppDelegate.m");
        let config = load_from_str(CONFIG).unwrap();
        let mut warnings = WarningAggregator::new();

        let report = check_patches(&config, dir.path(), Some("0.63.4"), &mut warnings);
        assert!(matches!(report.results[0].1, Ok(PatchResult::Applied { .. })));
        assert_eq!(report.changes.len(), 1);

        let untouched = fs::read_to_string(dir.path().join("ios/App/AppDelegate.m")).unwrap();
        assert_eq!(untouched, DELEGATE);
    }

    #[test]
    fn test_missing_ios_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from_str(CONFIG).unwrap();
        let mut warnings = WarningAggregator::new();

        let report = apply_patches(&config, dir.path(), Some("0.63.4"), &FsStore, &mut warnings);
        assert!(matches!(
            report.results[0].1,
            Err(ApplicationError::Locate(_))
        ));
        assert_eq!(report.failures(), 1);
    }

    #[test]
    fn test_patch_result_display() {
        let applied = PatchResult::Applied {
            file: PathBuf::from("/tmp/AppDelegate.m"),
            tier: Some(Tier::Fallback),
        };
        assert!(applied.to_string().contains("fallback"));

        let already = PatchResult::AlreadyApplied {
            file: PathBuf::from("/tmp/AppDelegate.m"),
        };
        assert!(already.to_string().contains("Already applied"));

        let skipped = PatchResult::SkippedVersion {
            reason: "version too old".to_string(),
        };
        assert!(skipped.to_string().contains("Skipped"));
        assert!(skipped.file().is_none());
    }
}
