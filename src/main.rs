use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use native_patcher::config::{
    apply_patches, check_patches, load_from_path, preset, ApplyReport, PatchConfig, PatchResult,
};
use native_patcher::diagnostics::WarningAggregator;
use native_patcher::logging;
use native_patcher::project::{find_project_root, read_framework_version};
use native_patcher::store::{DryRunStore, FsStore, SourceStore};
use similar::{ChangeTag, TextDiff};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const PROJECT_ENV: &str = "NATIVE_PATCHER_PROJECT";
const PATCH_DIR: &str = "native-patches";

#[derive(Parser)]
#[command(name = "native-patcher")]
#[command(about = "Idempotent native source patching for mobile app projects", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply patches to an app project
    Apply {
        /// Path to project root (auto-detected if not specified)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Specific patch file to apply (otherwise applies all in native-patches/)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Check status of patches without applying
    Status {
        /// Path to project root (auto-detected if not specified)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Specific patch file to check
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Verify every patch is already applied
    Verify {
        /// Path to project root (auto-detected if not specified)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Specific patch file to verify
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List available patch sets and their version constraints
    List {
        /// Path to project root (auto-detected if not specified)
        #[arg(short, long)]
        project: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Apply {
            project,
            config,
            dry_run,
            diff,
        } => cmd_apply(project, config, dry_run, diff),

        Commands::Status { project, config } => cmd_status(project, config),

        Commands::Verify { project, config } => cmd_verify(project, config),

        Commands::List { project } => cmd_list(project),
    }
}

/// A loaded patch set and where it came from.
struct Source {
    label: String,
    config: PatchConfig,
}

/// Load patch sets for a project.
///
/// Discovery order:
/// 1. An explicit `--config` file.
/// 2. Every `.toml` in `<project>/native-patches`.
/// 3. The built-in Firebase app preset.
fn load_sources(project: &Path, config: Option<PathBuf>) -> Result<Vec<Source>> {
    if let Some(path) = config {
        let loaded = load_from_path(&path)?;
        return Ok(vec![Source {
            label: path.display().to_string(),
            config: loaded,
        }]);
    }

    let patch_dir = project.join(PATCH_DIR);
    if patch_dir.is_dir() {
        let mut files = Vec::new();
        for entry in WalkDir::new(&patch_dir).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
            {
                files.push(entry.path().to_path_buf());
            }
        }
        files.sort();

        if !files.is_empty() {
            return files
                .into_iter()
                .map(|path| -> Result<Source> {
                    let config = load_from_path(&path)?;
                    Ok(Source {
                        label: path.display().to_string(),
                        config,
                    })
                })
                .collect();
        }
    }

    Ok(vec![Source {
        label: "preset firebase-app".to_string(),
        config: preset::firebase_app()?,
    }])
}

/// Drop patch sets whose `meta.name` was already seen this run.
fn dedupe_sources(sources: Vec<Source>) -> Vec<Source> {
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .filter(|source| {
            let first = seen.insert(source.config.meta.name.clone());
            if !first {
                println!(
                    "{}",
                    format!(
                        "Skipping {}: {} already ran",
                        source.label, source.config.meta.name
                    )
                    .dimmed()
                );
            }
            first
        })
        .collect()
}

/// Resolve project path using multiple detection strategies
///
/// Priority order:
/// 1. Explicit --project flag
/// 2. NATIVE_PATCHER_PROJECT environment variable
/// 3. Walk up from the current directory to a package.json with an ios/ sibling
fn resolve_project(cli_project: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_project {
        return path
            .canonicalize()
            .with_context(|| format!("project path {} does not exist", path.display()));
    }

    if let Ok(env_path) = env::var(PROJECT_ENV) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: {PROJECT_ENV} is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    let current = env::current_dir()?;
    if let Some(path) = find_project_root(&current) {
        println!(
            "{}",
            format!("Auto-detected project: {}", path.display()).dimmed()
        );
        return Ok(path);
    }

    anyhow::bail!(
        "{}\n{}\n  {}\n  {}\n  {}",
        "Could not find an app project.".red(),
        "Try one of:".bold(),
        "1. cd into your app directory (the one with package.json and ios/)",
        "2. Specify explicitly: native-patcher apply --project /path/to/app",
        "3. Set environment variable: export NATIVE_PATCHER_PROJECT=/path/to/app"
    )
}

fn framework_version(project: &Path) -> Option<String> {
    match read_framework_version(project) {
        Ok(Some(version)) => Some(version),
        Ok(None) => {
            eprintln!(
                "{}",
                "Warning: package.json does not pin a react-native version".yellow()
            );
            None
        }
        Err(e) => {
            eprintln!("{}", format!("Warning: {e}").yellow());
            None
        }
    }
}

fn print_header(title: Option<&str>, project: &Path, version: Option<&str>) {
    if let Some(title) = title {
        println!("{}", title.bold());
    }
    println!("Project: {}", project.display());
    println!("react-native: {}", version.unwrap_or("unknown"));
    println!();
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_apply(
    project: Option<PathBuf>,
    config: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let project = resolve_project(project)?;
    let sources = dedupe_sources(load_sources(&project, config)?);
    let version = framework_version(&project);

    print_header(None, &project, version.as_deref());

    let store: Box<dyn SourceStore> = if dry_run {
        Box::new(DryRunStore::new(FsStore))
    } else {
        Box::new(FsStore)
    };
    let mut warnings = WarningAggregator::new();

    let mut total_applied = 0;
    let mut total_already_applied = 0;
    let mut total_skipped = 0;
    let mut total_not_applicable = 0;
    let mut total_failed = 0;

    for source in sources {
        println!("Loading patches from {}...", source.label);
        if dry_run {
            println!("{}", "  [DRY RUN - showing what would be applied]".cyan());
        }

        let ApplyReport { results, changes } = apply_patches(
            &source.config,
            &project,
            version.as_deref(),
            &*store,
            &mut warnings,
        );

        for (insert_id, result) in results {
            match result {
                Ok(PatchResult::Applied { file, tier }) => {
                    let verb = if dry_run { "Would apply" } else { "Applied" };
                    let via = tier.map(|t| format!(" ({t} anchor)")).unwrap_or_default();
                    println!(
                        "{} {}: {} to {}{}",
                        "✓".green(),
                        insert_id,
                        verb,
                        file.display(),
                        via
                    );
                    total_applied += 1;
                }
                Ok(PatchResult::AlreadyApplied { file }) => {
                    println!(
                        "{} {}: Already applied to {}",
                        "⊙".yellow(),
                        insert_id,
                        file.display()
                    );
                    total_already_applied += 1;
                }
                Ok(PatchResult::SkippedVersion { reason }) => {
                    println!("{} {}: Skipped ({})", "⊘".cyan(), insert_id, reason);
                    total_skipped += 1;
                }
                Ok(PatchResult::NotApplicable { file, reason }) => {
                    println!(
                        "{} {}: Not applicable to {} ({})",
                        "⊘".yellow(),
                        insert_id,
                        file.display(),
                        reason
                    );
                    total_not_applicable += 1;
                }
                Err(e) => {
                    eprintln!("{} {}: Error - {}", "✗".red(), insert_id, e);
                    total_failed += 1;
                }
            }
        }

        if show_diff {
            for change in &changes {
                display_diff(&change.path, &change.before, &change.after);
            }
        }

        println!();
    }

    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", total_applied).green());
    println!(
        "  {} already applied",
        format!("{}", total_already_applied).yellow()
    );
    println!("  {} skipped", format!("{}", total_skipped).cyan());
    println!(
        "  {} not applicable",
        format!("{}", total_not_applicable).yellow()
    );
    println!("  {} failed", format!("{}", total_failed).red());
    println!(
        "  {} warnings",
        format!("{}", warnings.warnings().len()).yellow()
    );

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_status(project: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let project = resolve_project(project)?;
    let sources = dedupe_sources(load_sources(&project, config)?);
    let version = framework_version(&project);

    print_header(Some("Patch Status Report"), &project, version.as_deref());

    let mut applied = Vec::new();
    let mut not_applied = Vec::new();
    let mut skipped = Vec::new();
    let mut warnings = WarningAggregator::new();

    for source in sources {
        let report = check_patches(&source.config, &project, version.as_deref(), &mut warnings);

        for (insert_id, result) in report.results {
            match result {
                Ok(PatchResult::Applied { .. }) => {
                    not_applied.push((insert_id, "insertion point found but not applied".to_string()));
                }
                Ok(PatchResult::AlreadyApplied { .. }) => {
                    applied.push(insert_id);
                }
                Ok(PatchResult::SkippedVersion { reason }) => {
                    skipped.push((insert_id, reason));
                }
                Ok(PatchResult::NotApplicable { reason, .. }) => {
                    not_applied.push((insert_id, reason));
                }
                Err(e) => {
                    not_applied.push((insert_id, e.to_string()));
                }
            }
        }
    }

    if !applied.is_empty() {
        println!(
            "{} {} ({} inserts)",
            "✓".green(),
            "APPLIED".green().bold(),
            applied.len()
        );
        for id in &applied {
            println!("  - {}", id);
        }
        println!();
    }

    if !not_applied.is_empty() {
        println!(
            "{} {} ({} inserts)",
            "⊙".yellow(),
            "NOT APPLIED".yellow().bold(),
            not_applied.len()
        );
        for (id, reason) in &not_applied {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    if !skipped.is_empty() {
        println!(
            "{} {} ({} inserts)",
            "⊘".cyan(),
            "SKIPPED".cyan().bold(),
            skipped.len()
        );
        for (id, reason) in &skipped {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    Ok(())
}

fn cmd_verify(project: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let project = resolve_project(project)?;
    let sources = dedupe_sources(load_sources(&project, config)?);
    let version = framework_version(&project);

    print_header(Some("Verifying patches..."), &project, version.as_deref());

    let mut verified = 0;
    let mut mismatch = 0;
    let mut skipped = 0;
    let mut warnings = WarningAggregator::new();

    for source in sources {
        let report = check_patches(&source.config, &project, version.as_deref(), &mut warnings);

        for (insert_id, result) in report.results {
            match result {
                Ok(PatchResult::AlreadyApplied { .. }) => {
                    println!("{} {}: Verified (already applied)", "✓".green(), insert_id);
                    verified += 1;
                }
                Ok(PatchResult::Applied { file, .. }) => {
                    eprintln!("{} {}: MISMATCH", "✗".red(), insert_id);
                    eprintln!("  Expected: patch already applied");
                    eprintln!("  Found: patch not yet applied");
                    eprintln!("  Location: {}", file.display());
                    mismatch += 1;
                }
                Ok(PatchResult::SkippedVersion { reason }) => {
                    println!("{} {}: Skipped ({})", "⊘".cyan(), insert_id, reason);
                    skipped += 1;
                }
                Ok(PatchResult::NotApplicable { file, reason }) => {
                    eprintln!("{} {}: MISMATCH", "✗".red(), insert_id);
                    eprintln!("  Error: {}", reason);
                    eprintln!("  Location: {}", file.display());
                    mismatch += 1;
                }
                Err(e) => {
                    eprintln!("{} {}: MISMATCH", "✗".red(), insert_id);
                    eprintln!("  Error: {}", e);
                    mismatch += 1;
                }
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} verified", format!("{}", verified).green());
    println!("  {} mismatch", format!("{}", mismatch).red());
    println!("  {} skipped", format!("{}", skipped).cyan());

    if mismatch > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_list(project: Option<PathBuf>) -> Result<()> {
    let sources = match resolve_project(project) {
        Ok(project) => load_sources(&project, None)?,
        Err(_) => preset::PRESETS
            .iter()
            .filter_map(|name| preset::preset(name).map(|config| (name, config)))
            .map(|(name, config)| -> Result<Source> {
                Ok(Source {
                    label: format!("preset {name}"),
                    config: config?,
                })
            })
            .collect::<Result<Vec<_>>>()?,
    };

    for source in sources {
        let meta = &source.config.meta;
        let version = meta.version.as_deref().unwrap_or("-");
        println!("{} {} ({})", meta.name.bold(), version, source.label.dimmed());
        if let Some(description) = &meta.description {
            println!("  {}", description);
        }
        println!(
            "  react-native: {}",
            meta.version_range.as_deref().unwrap_or("any")
        );
        for insert in &source.config.inserts {
            let target = insert.file.as_deref().unwrap_or("<AppDelegate>");
            let fallback = if insert.fallback.is_some() {
                " +fallback"
            } else {
                ""
            };
            println!("  - {} -> {}{}", insert.id, target, fallback);
        }
        println!();
    }

    Ok(())
}
