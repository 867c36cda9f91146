//! Rollback Manager
//!
//! Restores a workspace from a snapshot. Renamed copies created by the failed
//! run are removed first, then every snapshot file is copied back to its
//! original name. Each failure is recorded and the restore carries on with
//! the remaining files; nothing is retried.

use crate::backup::{copy_preserving, IMAGES_SUBDIR, MANIFEST_FILE};
use crate::error::{RenumberError, Result};
use crate::locator::Workspace;
use crate::report::RunReport;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Counts from a successful restore
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    /// Files copied back from the snapshot
    pub restored: usize,
    /// Renamed copies removed
    pub removed: usize,
}

/// `(snapshot file, restore destination)` for everything in the snapshot
pub fn snapshot_contents(
    workspace: &Workspace,
    snapshot_dir: &Path,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut pairs = Vec::new();

    for entry in fs::read_dir(snapshot_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() || entry.file_name() == MANIFEST_FILE {
            continue;
        }
        pairs.push((entry.path(), workspace.root().join(entry.file_name())));
    }

    let images = snapshot_dir.join(IMAGES_SUBDIR);
    if images.is_dir() {
        for entry in fs::read_dir(&images)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                pairs.push((entry.path(), workspace.images_dir().join(entry.file_name())));
            }
        }
    }

    pairs.sort();
    Ok(pairs)
}

/// Restore `workspace` from `snapshot_dir`.
///
/// `renamed_paths` are the targets the run may have created; any of them not
/// about to be restored from the snapshot is deleted so the directory ends up
/// exactly as it was before the run.
///
/// # Errors
///
/// `RenumberError::RollbackFailed` listing every file that could not be
/// removed or restored. Files that could be handled are handled regardless.
pub fn restore_snapshot(
    workspace: &Workspace,
    snapshot_dir: &Path,
    renamed_paths: &[PathBuf],
    report: &mut RunReport,
) -> Result<RollbackOutcome> {
    if !snapshot_dir.is_dir() {
        report.error(format!(
            "No backup directory found at {}",
            snapshot_dir.display()
        ));
        return Err(RenumberError::RollbackFailed {
            snapshot: snapshot_dir.to_path_buf(),
            failures: vec![format!("{} is not a directory", snapshot_dir.display())],
        });
    }

    report.info(format!("Restoring from backup: {}", snapshot_dir.display()));
    let pairs = snapshot_contents(workspace, snapshot_dir)?;
    let restoring: HashSet<&PathBuf> = pairs.iter().map(|(_, dest)| dest).collect();

    let mut outcome = RollbackOutcome::default();
    let mut failures = Vec::new();

    for path in renamed_paths.iter().rev() {
        if restoring.contains(path) || fs::symlink_metadata(path).is_err() {
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => {
                report.info(format!("Removed renamed file: {}", path.display()));
                outcome.removed += 1;
            }
            Err(e) => {
                let failure = format!("Could not remove {}: {}", path.display(), e);
                report.error(failure.clone());
                failures.push(failure);
            }
        }
    }

    for (from, to) in &pairs {
        match copy_preserving(from, to) {
            Ok(()) => {
                report.info(format!("Restored: {}", to.display()));
                outcome.restored += 1;
            }
            Err(e) => {
                let failure = format!("Could not restore {}: {}", to.display(), e);
                report.error(failure.clone());
                failures.push(failure);
            }
        }
    }

    if failures.is_empty() {
        report.info(format!(
            "Rollback complete: {} files restored, {} renamed files removed",
            outcome.restored, outcome.removed
        ));
        Ok(outcome)
    } else {
        Err(RenumberError::RollbackFailed {
            snapshot: snapshot_dir.to_path_buf(),
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::create_snapshot;
    use crate::config::RenumberConfig;
    use crate::engine::plan::build_plan;
    use crate::locator::scan_unit;
    use crate::types::RenumberIntent;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn listing(dir: &Path) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        for entry in fs::read_dir(dir).expect("read_dir") {
            let entry = entry.expect("entry");
            if entry.file_type().expect("type").is_file() {
                let name = entry.file_name().to_string_lossy().into_owned();
                files.insert(name, fs::read_to_string(entry.path()).expect("read"));
            }
        }
        files
    }

    #[test]
    fn test_restores_partially_renamed_workspace() {
        let tmp = TempDir::new().expect("Should create temp dir");
        for name in ["02-01-a.md", "02-02-b.md", "02-03-c.md"] {
            fs::write(tmp.path().join(name), name).expect("write");
        }
        let images = tmp.path().join("images");
        fs::create_dir(&images).expect("mkdir");
        fs::write(images.join("02_02_fig.png"), "fig").expect("write");
        let before = listing(tmp.path());
        let images_before = listing(&images);

        let workspace = Workspace::new(tmp.path(), &RenumberConfig::default());
        let scan = scan_unit(&workspace, 2).expect("scan");
        let mut report = RunReport::new();
        let plan = build_plan(&scan, RenumberIntent::Insert { at: 2 }, &mut report);
        let snapshot =
            create_snapshot(&workspace, &plan, "snap", false, &mut report).expect("snapshot");

        // First rename applied, then the run died
        let first = &plan.lessons[0];
        fs::rename(&first.old_path, &first.new_path).expect("rename");

        let outcome =
            restore_snapshot(&workspace, &snapshot.path, &[first.new_path.clone()], &mut report)
                .expect("Should roll back");

        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.restored, 3);
        assert_eq!(listing(tmp.path()), before);
        assert_eq!(listing(&images), images_before);
    }

    #[test]
    fn test_missing_snapshot_is_rollback_failure() {
        let tmp = TempDir::new().expect("Should create temp dir");
        let workspace = Workspace::new(tmp.path(), &RenumberConfig::default());
        let mut report = RunReport::new();

        let err = restore_snapshot(&workspace, &tmp.path().join("gone"), &[], &mut report)
            .unwrap_err();
        assert!(matches!(err, RenumberError::RollbackFailed { .. }));
        assert!(report.has_errors());
    }

    #[test]
    fn test_manifest_is_not_restored() {
        let tmp = TempDir::new().expect("Should create temp dir");
        let snap = tmp.path().join("snap");
        fs::create_dir(&snap).expect("mkdir");
        fs::write(snap.join(MANIFEST_FILE), "{}").expect("write");
        fs::write(snap.join("02-01-a.md"), "a").expect("write");
        let workspace = Workspace::new(tmp.path(), &RenumberConfig::default());

        let outcome =
            restore_snapshot(&workspace, &snap, &[], &mut RunReport::new()).expect("rollback");
        assert_eq!(outcome.restored, 1);
        assert!(!tmp.path().join(MANIFEST_FILE).exists());
    }
}
