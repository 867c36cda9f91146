//! Backup Manager
//!
//! Copies every file a plan will touch into a fresh snapshot directory before
//! any rename happens. Lesson files land at the snapshot root, image files
//! under `images/`. A manifest describing the plan is written alongside so a
//! later manual rollback knows which renamed copies to clean up.
//!
//! A snapshot is never modified after creation. If a copy fails the partial
//! snapshot is left on disk for inspection.

use crate::config::RenumberConfig;
use crate::engine::plan::Plan;
use crate::error::{RenumberError, Result};
use crate::locator::Workspace;
use crate::report::RunReport;
use crate::types::{ArtifactFamily, RenumberIntent};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest file written into every snapshot
pub const MANIFEST_FILE: &str = ".lessonseq-manifest.json";

/// Subdirectory of a snapshot holding image copies
pub const IMAGES_SUBDIR: &str = "images";

/// One rename recorded in the manifest, by file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub family: ArtifactFamily,
    pub old_name: String,
    pub new_name: String,
}

/// Description of the run that produced a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub intent: RenumberIntent,
    pub unit: u8,
    pub created_at: String,
    pub entries: Vec<ManifestEntry>,
}

impl SnapshotManifest {
    pub fn from_plan(plan: &Plan, created_at: &DateTime<Local>) -> Self {
        Self {
            intent: plan.intent,
            unit: plan.unit,
            created_at: created_at.to_rfc3339(),
            entries: plan
                .entries()
                .map(|e| ManifestEntry {
                    family: e.family(),
                    old_name: e.old_name(),
                    new_name: e.new_name(),
                })
                .collect(),
        }
    }

    /// Where each renamed copy lives once the plan has run
    pub fn renamed_paths(&self, workspace: &Workspace) -> Vec<PathBuf> {
        self.entries
            .iter()
            .map(|e| workspace.dir_for(e.family).join(&e.new_name))
            .collect()
    }
}

/// A snapshot directory and what was (or would be) copied into it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub path: PathBuf,
    /// Snapshot-relative paths of the copied files
    pub files: Vec<PathBuf>,
    /// False when produced by a dry run
    pub on_disk: bool,
}

/// Timestamped snapshot directory name, e.g. `backup_2025_01_07_14_30_45`
pub fn snapshot_name(prefix: &str, now: &DateTime<Local>) -> String {
    format!("{}_{}", prefix, now.format("%Y_%m_%d_%H_%M_%S"))
}

/// Snapshot-relative location for a file of `family`
fn relative_location(family: ArtifactFamily, name: &str) -> PathBuf {
    match family {
        ArtifactFamily::Lesson => PathBuf::from(name),
        ArtifactFamily::Image => Path::new(IMAGES_SUBDIR).join(name),
    }
}

fn log_action(report: &mut RunReport, dry_run: bool, message: String) {
    if dry_run {
        report.info(format!("DRY-RUN: {}", message));
    } else {
        report.info(message);
    }
}

/// Copy `from` to `to`, carrying over the modification time
pub(crate) fn copy_preserving(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::copy(from, to)?;
    let modified = fs::metadata(from)?.modified()?;
    fs::File::options().write(true).open(to)?.set_modified(modified)?;
    Ok(())
}

/// Create the snapshot for `plan` in `workspace.root()/dir_name`.
///
/// With `dry_run` nothing is written; every action is logged with a
/// `DRY-RUN: ` prefix and otherwise the same wording as a real run.
///
/// # Errors
///
/// `RenumberError::Backup` if the directory already exists or cannot be
/// created, or if any copy or the manifest write fails.
pub fn create_snapshot(
    workspace: &Workspace,
    plan: &Plan,
    dir_name: &str,
    dry_run: bool,
    report: &mut RunReport,
) -> Result<Snapshot> {
    let path = workspace.root().join(dir_name);
    let created_at = Local::now();

    log_action(report, dry_run, format!("Creating backup directory: {}", path.display()));
    if !dry_run {
        fs::create_dir(&path).map_err(|e| RenumberError::backup(&path, e))?;
    }

    let mut files = Vec::with_capacity(plan.len());
    let result = copy_sources(plan, &path, dry_run, &mut files, report);
    if let Err(e) = result {
        report.error(format!(
            "Backup incomplete; partial snapshot left at {} for inspection",
            path.display()
        ));
        return Err(e);
    }

    let manifest = SnapshotManifest::from_plan(plan, &created_at);
    log_action(report, dry_run, format!("Writing snapshot manifest: {}", MANIFEST_FILE));
    if !dry_run {
        let manifest_path = path.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&manifest)?;
        fs::write(&manifest_path, json).map_err(|e| RenumberError::backup(&manifest_path, e))?;
    }

    log_action(report, dry_run, format!("Backed up {} files", files.len()));

    Ok(Snapshot {
        path,
        files,
        on_disk: !dry_run,
    })
}

fn copy_sources(
    plan: &Plan,
    snapshot_dir: &Path,
    dry_run: bool,
    files: &mut Vec<PathBuf>,
    report: &mut RunReport,
) -> Result<()> {
    for entry in plan.entries() {
        let relative = relative_location(entry.family(), &entry.old_name());
        let dest = snapshot_dir.join(&relative);

        log_action(report, dry_run, format!("Backing up: {}", relative.display()));
        if !dry_run {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| RenumberError::backup(parent, e))?;
            }
            copy_preserving(&entry.old_path, &dest)
                .map_err(|e| RenumberError::backup(&entry.old_path, e))?;
        }
        files.push(relative);
    }
    Ok(())
}

/// Read the manifest of a snapshot, if it has one
pub fn load_manifest(snapshot_dir: &Path) -> Result<Option<SnapshotManifest>> {
    let path = snapshot_dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Snapshot directories in the workspace, newest name first.
///
/// A directory counts when it carries a manifest or its name starts with one
/// of the configured snapshot prefixes.
pub fn list_snapshots(workspace: &Workspace, config: &RenumberConfig) -> Result<Vec<PathBuf>> {
    let prefixes = [
        format!("{}_", config.insert_backup_prefix),
        format!("{}_", config.gap_backup_prefix),
    ];
    let mut found = Vec::new();

    for entry in fs::read_dir(workspace.root())? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        if path.join(MANIFEST_FILE).is_file() || prefixes.iter().any(|p| name.starts_with(p)) {
            found.push(path);
        }
    }

    found.sort();
    found.reverse();
    Ok(found)
}
