use crate::anchor::Anchor;
use crate::diagnostics::WarningAggregator;
use crate::ios::dialect::Dialect;
use crate::merge::PatchOutcome;
use crate::tiered::{apply_tiered, TieredOutcome, TieredRequest};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

const APP_DELEGATE_STEM: &str = "AppDelegate";
const SKIPPED_DIRS: &[&str] = &["Pods", "build", "DerivedData"];

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("no ios/ directory in {0}")]
    NoIosDir(PathBuf),

    #[error("could not find an AppDelegate source file under {0}")]
    NotFound(PathBuf),

    #[error("failed to scan {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// The application lifecycle file of an iOS project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDelegate {
    pub path: PathBuf,
    pub dialect: Dialect,
}

/// Find `ios/<Target>/AppDelegate.{m,mm,swift}` under a project root.
///
/// Objective-C files win over Swift when both exist, then the shortest
/// path, so results are stable across filesystems.
pub fn locate_app_delegate(project_root: &Path) -> Result<AppDelegate, LocateError> {
    let ios_dir = project_root.join("ios");
    if !ios_dir.is_dir() {
        return Err(LocateError::NoIosDir(project_root.to_path_buf()));
    }

    let walker = WalkDir::new(&ios_dir)
        .max_depth(3)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            entry.depth() == 0 || !(name.starts_with('.') || SKIPPED_DIRS.contains(&&*name))
        });

    let mut candidates = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| LocateError::Walk {
            path: ios_dir.clone(),
            source,
        })?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.file_stem().and_then(|s| s.to_str()) != Some(APP_DELEGATE_STEM)
        {
            continue;
        }
        let dialect = Dialect::from_path(path);
        if matches!(dialect, Dialect::Other(_)) || path.extension().is_some_and(|e| e == "h") {
            continue;
        }
        candidates.push(AppDelegate {
            path: path.to_path_buf(),
            dialect,
        });
    }

    candidates.sort_by_key(|c| (c.dialect.rank(), c.path.components().count()));
    let found = candidates
        .into_iter()
        .next()
        .ok_or_else(|| LocateError::NotFound(ios_dir.clone()))?;

    debug!(path = %found.path.display(), dialect = %found.dialect, "located AppDelegate");
    Ok(found)
}

/// A line that must appear after some existing line, e.g. a module import
/// after the delegate's own header import.
#[derive(Debug, Clone)]
pub struct ImportLine {
    pub line: String,
    pub after: Anchor,
}

/// Add `import.line` after every line matching `import.after`.
///
/// Returns `None` when the line is already present or nothing matches.
pub fn ensure_import(contents: &str, import: &ImportLine) -> Option<String> {
    if contents.contains(import.line.as_str()) {
        return None;
    }

    let mut targets: Vec<usize> = import
        .after
        .find_all(contents)
        .into_iter()
        .map(|m| m.line)
        .collect();
    targets.dedup();
    if targets.is_empty() {
        debug!(line = %import.line, anchor = %import.after, "import anchor not found");
        return None;
    }

    let cr = if contents.contains("\r\n") { "\r" } else { "" };
    let added = format!("{}{cr}", import.line);
    let mut out: Vec<&str> = Vec::new();
    for (idx, line) in contents.split('\n').enumerate() {
        out.push(line);
        if targets.binary_search(&idx).is_ok() {
            out.push(&added);
        }
    }
    Some(out.join("\n"))
}

/// Everything needed to wire one SDK into an Objective-C application delegate.
#[derive(Debug, Clone)]
pub struct IosHook {
    /// Reported with warnings, usually the SDK package name.
    pub scope: String,
    pub import: Option<ImportLine>,
    pub request: TieredRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyResult {
    /// Final file contents (import and fragment applied when possible).
    pub contents: String,
    pub import_added: bool,
    pub insertion: TieredOutcome,
}

impl ModifyResult {
    pub fn changed(&self) -> bool {
        self.import_added || self.insertion.outcome.is_patched()
    }
}

/// Add the hook's import and fragment to Objective-C delegate contents.
///
/// A missing insertion point is reported to `warnings` and leaves the
/// fragment out; it never fails the caller.
pub fn modify_objc_app_delegate(
    contents: &str,
    hook: &IosHook,
    warnings: &mut WarningAggregator,
) -> ModifyResult {
    let imported = hook
        .import
        .as_ref()
        .and_then(|import| ensure_import(contents, import));
    let import_added = imported.is_some();
    let contents = imported.unwrap_or_else(|| contents.to_string());

    let insertion = apply_tiered(&contents, &hook.request);
    if let PatchOutcome::NotApplicable(reason) = &insertion.outcome {
        warnings.add_warning_ios(
            hook.scope.as_str(),
            format!(
                "Unable to determine correct insertion point in AppDelegate for '{}'. Skipping addition: {reason}",
                hook.request.primary.tag
            ),
        );
    }

    let contents = match &insertion.outcome {
        PatchOutcome::Patched(text) => text.clone(),
        PatchOutcome::Unchanged | PatchOutcome::NotApplicable(_) => contents,
    };

    ModifyResult {
        contents,
        import_added,
        insertion,
    }
}
