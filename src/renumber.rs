//! Renumbering orchestration.
//!
//! A [`Renumberer`] runs one intent end to end:
//! scan → plan → validate → confirm → back up → execute → (on failure) roll back,
//! driving a [`RunContext`] so stages cannot be skipped, and returns a
//! [`RunOutcome`] holding the final stage and the full operation log.

use crate::backup::{create_snapshot, list_snapshots, load_manifest, snapshot_name};
use crate::config::RenumberConfig;
use crate::engine::plan::{build_plan, Plan};
use crate::engine::validate::validate_plan;
use crate::error::{RenumberError, Result};
use crate::executor::{execute_plan, FileMover, StdFileMover};
use crate::interrupt::InterruptFlag;
use crate::locator::{determine_insertion_unit, scan_all_lessons, scan_unit, Workspace};
use crate::report::RunReport;
use crate::rollback::{restore_snapshot, snapshot_contents, RollbackOutcome};
use crate::run_state::{RunContext, RunStage};
use crate::types::RenumberIntent;
use chrono::Local;
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};

/// Exit status for a run that was interrupted and then rolled back
pub const EXIT_INTERRUPTED: i32 = 130;

fn serialize_error<S: Serializer>(
    error: &Option<RenumberError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Result of one renumbering run
#[derive(Debug, Serialize)]
pub struct RunOutcome {
    pub intent: RenumberIntent,
    pub unit: Option<u8>,
    pub dry_run: bool,
    pub stage: RunStage,
    /// Nothing needed renaming
    pub no_changes: bool,
    pub plan: Option<Plan>,
    /// Renames applied (or that would be applied, in a dry run)
    pub applied: usize,
    pub snapshot: Option<PathBuf>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<RenumberError>,
    pub report: RunReport,
}

impl RunOutcome {
    fn new(intent: RenumberIntent, dry_run: bool) -> Self {
        Self {
            intent,
            unit: None,
            dry_run,
            stage: RunStage::Idle,
            no_changes: false,
            plan: None,
            applied: 0,
            snapshot: None,
            error: None,
            report: RunReport::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }

    /// 0 done/dry-run/no-op, 1 aborted, 2 rolled back, 3 unrecoverable,
    /// 130 interrupted and rolled back
    pub fn exit_code(&self) -> i32 {
        match self.stage {
            RunStage::Completed => 0,
            _ if self.no_changes => 0,
            RunStage::Validated if self.dry_run => 0,
            RunStage::RolledBack if matches!(self.error, Some(RenumberError::Interrupted)) => {
                EXIT_INTERRUPTED
            }
            RunStage::RolledBack => 2,
            RunStage::Unrecoverable => 3,
            _ => 1,
        }
    }
}

/// Result of restoring a snapshot on operator request
#[derive(Debug, Serialize)]
pub struct RollbackRun {
    pub snapshot: PathBuf,
    pub dry_run: bool,
    pub outcome: Option<RollbackOutcome>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<RenumberError>,
    pub report: RunReport,
}

impl RollbackRun {
    pub fn exit_code(&self) -> i32 {
        if self.error.is_some() {
            3
        } else {
            0
        }
    }
}

/// Asked once per mutating run, after validation and before the backup
pub type Confirm = Box<dyn FnMut(&Plan) -> bool>;

/// Runs renumbering intents against one workspace
pub struct Renumberer {
    workspace: Workspace,
    config: RenumberConfig,
    dry_run: bool,
    backup_dir: Option<String>,
    interrupt: Option<InterruptFlag>,
    mover: Box<dyn FileMover>,
    confirm: Option<Confirm>,
}

impl Renumberer {
    pub fn new(root: impl Into<PathBuf>, config: RenumberConfig) -> Self {
        Self {
            workspace: Workspace::new(root, &config),
            config,
            dry_run: false,
            backup_dir: None,
            interrupt: None,
            mover: Box::new(StdFileMover),
            confirm: None,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Use this snapshot directory name instead of a timestamped one
    pub fn backup_dir(mut self, name: Option<String>) -> Self {
        self.backup_dir = name;
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    pub fn with_mover(mut self, mover: Box<dyn FileMover>) -> Self {
        self.mover = mover;
        self
    }

    pub fn with_confirmation(mut self, confirm: Confirm) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Free slot `at` by shifting later lessons up by one.
    /// Without `unit`, the unit is inferred from the insertion point.
    pub fn insert(&mut self, at: u32, unit: Option<u8>) -> RunOutcome {
        self.run(RenumberIntent::Insert { at }, unit)
    }

    /// Renumber `unit` so its lessons run `1..=count`
    pub fn close_gaps(&mut self, unit: u8) -> RunOutcome {
        self.run(RenumberIntent::CloseGaps, Some(unit))
    }

    fn run(&mut self, intent: RenumberIntent, unit: Option<u8>) -> RunOutcome {
        let mut out = RunOutcome::new(intent, self.dry_run);
        let mut ctx = RunContext::new(self.dry_run);

        if let Err(error) = self.drive(intent, unit, &mut ctx, &mut out) {
            out.report.error(format!("Aborting: {}", error));
            if let Err(e) = ctx.abort() {
                tracing::error!("Could not record abort: {}", e);
            }
            out.error = Some(error);
        }

        out.stage = ctx.current_stage();
        out.report.summarize();
        out
    }

    fn drive(
        &mut self,
        intent: RenumberIntent,
        unit: Option<u8>,
        ctx: &mut RunContext,
        out: &mut RunOutcome,
    ) -> Result<()> {
        out.report.info("=".repeat(60));
        out.report.info(format!("LESSON RENUMBERING: {}", intent));
        out.report.info("=".repeat(60));
        if ctx.is_dry_run() {
            out.report.info("*** DRY-RUN MODE - NO FILES WILL BE MODIFIED ***");
        }

        // ==== Scan ====

        let known = scan_all_lessons(&self.workspace)?;
        let unit = match (intent, unit) {
            (_, Some(unit)) => unit,
            (RenumberIntent::Insert { at }, None) => {
                match determine_insertion_unit(&known, at) {
                    Some(unit) => {
                        out.report.info(format!(
                            "Determined unit {:02} from insertion point {:02}",
                            unit, at
                        ));
                        unit
                    }
                    None => {
                        out.report.info(format!(
                            "No lessons at or after position {:02}; nothing to renumber",
                            at
                        ));
                        out.no_changes = true;
                        return Ok(());
                    }
                }
            }
            (RenumberIntent::CloseGaps, None) => {
                return Err(RenumberError::invalid_argument("closing gaps requires a unit"));
            }
        };
        out.unit = Some(unit);

        let scan = scan_unit(&self.workspace, unit)?;
        for path in &scan.skipped {
            out.report.warn(format!(
                "Could not parse sequence number from {}; left unchanged",
                path.display()
            ));
        }
        if scan.lessons.is_empty() {
            return Err(RenumberError::NoLessons { unit });
        }
        out.report.info(format!(
            "Found {} lesson files and {} image files in unit {:02}",
            scan.lessons.len(),
            scan.images.len(),
            unit
        ));

        // ==== Plan ====

        let plan: &Plan = out.plan.insert(build_plan(&scan, intent, &mut out.report));
        ctx.transition_to(RunStage::Planned)?;

        if plan.is_empty() {
            match intent {
                RenumberIntent::CloseGaps => out
                    .report
                    .info("No gaps found - all lessons are already sequential!"),
                RenumberIntent::Insert { at } => out.report.info(format!(
                    "No lessons at or after position {:02} in unit {:02}; nothing to renumber",
                    at, unit
                )),
            }
            ctx.transition_to(RunStage::Validated)?;
            out.no_changes = true;
            return Ok(());
        }

        if let RenumberIntent::Insert { at } = intent {
            out.report.info(format!(
                "{} lesson files will shift up by one to free slot {:02}-{:02}",
                plan.lessons.len(),
                unit,
                at
            ));
            out.report
                .info("Create the new lesson file only after renumbering has freed the slot");
        }
        for line in plan.preview_lines() {
            out.report.info(line);
        }

        // ==== Validate ====

        validate_plan(plan, &known, &self.config, &mut out.report)?;
        out.report
            .info("Renaming plan validation passed - no conflicts detected");
        ctx.transition_to(RunStage::Validated)?;

        let dir_name = match &self.backup_dir {
            Some(name) => name.clone(),
            None => {
                let prefix = match intent {
                    RenumberIntent::Insert { .. } => &self.config.insert_backup_prefix,
                    RenumberIntent::CloseGaps => &self.config.gap_backup_prefix,
                };
                snapshot_name(prefix, &Local::now())
            }
        };

        if ctx.is_dry_run() {
            create_snapshot(&self.workspace, plan, &dir_name, true, &mut out.report)?;
            let preview = execute_plan(plan, self.mover.as_mut(), None, true, &mut out.report);
            out.applied = preview.applied;
            out.report.info(format!(
                "DRY-RUN COMPLETE: {} files would be renamed",
                plan.len()
            ));
            out.report.info("Run again without --dry-run to apply these changes");
            return Ok(());
        }

        if let Some(confirm) = self.confirm.as_mut() {
            if !confirm(plan) {
                return Err(RenumberError::Cancelled);
            }
        }

        // ==== Backup ====

        let snapshot = create_snapshot(&self.workspace, plan, &dir_name, false, &mut out.report)?;
        out.snapshot = Some(snapshot.path.clone());
        ctx.transition_to(RunStage::BackedUp)?;

        // ==== Execute ====

        ctx.transition_to(RunStage::Executing)?;
        let execution = execute_plan(
            plan,
            self.mover.as_mut(),
            self.interrupt.as_ref(),
            false,
            &mut out.report,
        );
        out.applied = execution.applied;

        let Some(error) = execution.error else {
            ctx.transition_to(RunStage::Completed)?;
            out.report
                .info(format!("Successfully renumbered {} files", execution.applied));
            out.report
                .info(format!("Backup kept at {}", snapshot.path.display()));
            if let RenumberIntent::Insert { at } = intent {
                out.report.info(format!(
                    "Slot {:02}-{:02} is free: create {:02}-{:02}-<title>.md",
                    unit, at, unit, at
                ));
            }
            return Ok(());
        };

        // ==== Rollback ====

        ctx.fail()?;
        ctx.begin_rollback()?;
        out.report.error(format!(
            "Renaming failed after {} of {} files; attempting automatic rollback",
            execution.applied,
            plan.len()
        ));
        let renamed: Vec<PathBuf> = plan
            .entries()
            .take(execution.applied)
            .map(|e| e.new_path.clone())
            .collect();

        match restore_snapshot(&self.workspace, &snapshot.path, &renamed, &mut out.report) {
            Ok(_) => {
                ctx.finish_rollback(true)?;
                out.report
                    .info("Rollback completed; directory restored to its pre-run state");
            }
            Err(rollback_error) => {
                ctx.finish_rollback(false)?;
                out.report.error(rollback_error.to_string());
                out.report.error(format!(
                    "Manual restoration required from {}",
                    snapshot.path.display()
                ));
            }
        }
        out.error = Some(error);
        Ok(())
    }

    /// Restore the workspace from `snapshot` (relative to the workspace root
    /// unless absolute). Renamed copies recorded in the snapshot manifest are
    /// removed first.
    pub fn rollback_from(&self, snapshot: &Path) -> RollbackRun {
        let snapshot = self.workspace.root().join(snapshot);
        let mut run = RollbackRun {
            snapshot: snapshot.clone(),
            dry_run: self.dry_run,
            outcome: None,
            error: None,
            report: RunReport::new(),
        };

        let renamed = match load_manifest(&snapshot) {
            Ok(Some(manifest)) => {
                run.report.info(format!(
                    "Snapshot of {} for unit {:02} taken {}",
                    manifest.intent, manifest.unit, manifest.created_at
                ));
                manifest.renamed_paths(&self.workspace)
            }
            Ok(None) => {
                run.report
                    .warn("Snapshot has no manifest; renamed copies will not be removed");
                Vec::new()
            }
            Err(e) => {
                run.report
                    .warn(format!("Could not read snapshot manifest: {}", e));
                Vec::new()
            }
        };

        if self.dry_run {
            match snapshot_contents(&self.workspace, &snapshot) {
                Ok(pairs) => {
                    for (_, to) in &pairs {
                        run.report
                            .info(format!("DRY-RUN: Restored: {}", to.display()));
                    }
                    run.outcome = Some(RollbackOutcome {
                        restored: pairs.len(),
                        removed: 0,
                    });
                }
                Err(e) => {
                    run.report.error(e.to_string());
                    run.error = Some(e);
                }
            }
        } else {
            match restore_snapshot(&self.workspace, &snapshot, &renamed, &mut run.report) {
                Ok(outcome) => run.outcome = Some(outcome),
                Err(e) => {
                    run.report.error(e.to_string());
                    run.error = Some(e);
                }
            }
        }

        run.report.summarize();
        run
    }

    /// Snapshot directories in the workspace, newest first
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        list_snapshots(&self.workspace, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn course(names: &[&str]) -> TempDir {
        let tmp = TempDir::new().expect("Should create temp dir");
        for name in names {
            fs::write(tmp.path().join(name), format!("# {}\n", name)).expect("write");
        }
        tmp
    }

    #[test]
    fn test_exit_codes() {
        let mut outcome = RunOutcome::new(RenumberIntent::CloseGaps, false);
        outcome.stage = RunStage::Completed;
        assert_eq!(outcome.exit_code(), 0);
        outcome.stage = RunStage::Aborted;
        assert_eq!(outcome.exit_code(), 1);
        outcome.stage = RunStage::RolledBack;
        assert_eq!(outcome.exit_code(), 2);
        outcome.error = Some(RenumberError::Interrupted);
        assert_eq!(outcome.exit_code(), EXIT_INTERRUPTED);
        outcome.stage = RunStage::Unrecoverable;
        assert_eq!(outcome.exit_code(), 3);
    }

    #[test]
    fn test_insert_without_unit_infers_it() {
        let tmp = course(&["01-01-a.md", "02-01-b.md", "02-02-c.md"]);
        let mut renumberer = Renumberer::new(tmp.path(), RenumberConfig::default()).dry_run(true);

        let outcome = renumberer.insert(2, None);
        assert_eq!(outcome.unit, Some(2));
        assert_eq!(outcome.stage, RunStage::Validated);
        assert_eq!(outcome.applied, 1);
        assert!(outcome.is_success());
    }

    #[test]
    fn test_insert_past_every_lesson_is_noop() {
        let tmp = course(&["02-01-a.md"]);
        let mut renumberer = Renumberer::new(tmp.path(), RenumberConfig::default());

        let outcome = renumberer.insert(5, None);
        assert!(outcome.no_changes);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn test_missing_unit_aborts() {
        let tmp = course(&["02-01-a.md"]);
        let mut renumberer = Renumberer::new(tmp.path(), RenumberConfig::default());

        let outcome = renumberer.close_gaps(7);
        assert_eq!(outcome.stage, RunStage::Aborted);
        assert!(matches!(outcome.error, Some(RenumberError::NoLessons { unit: 7 })));
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn test_declined_confirmation_changes_nothing() {
        let tmp = course(&["02-01-a.md", "02-03-b.md"]);
        let mut renumberer = Renumberer::new(tmp.path(), RenumberConfig::default())
            .with_confirmation(Box::new(|_| false));

        let outcome = renumberer.close_gaps(2);
        assert!(matches!(outcome.error, Some(RenumberError::Cancelled)));
        assert_eq!(outcome.stage, RunStage::Aborted);
        assert!(tmp.path().join("02-03-b.md").exists());
        assert!(outcome.snapshot.is_none());
    }

    #[test]
    fn test_outcome_serializes_error_as_text() {
        let tmp = course(&["02-01-a.md"]);
        let mut renumberer = Renumberer::new(tmp.path(), RenumberConfig::default());
        let outcome = renumberer.close_gaps(3);

        let json = serde_json::to_value(&outcome).expect("Should serialize");
        assert_eq!(json["stage"], "aborted");
        assert_eq!(json["error"], "No lesson files found for unit 03");
    }
}
