//! Rename Executor
//!
//! Applies a validated plan one rename at a time, in plan order, through a
//! [`FileMover`]. Stops at the first failure and reports how many renames
//! landed so the caller can roll back.

use crate::engine::plan::{Plan, RenamePlanEntry};
use crate::error::RenumberError;
use crate::interrupt::InterruptFlag;
use crate::report::RunReport;
use std::fs;
use std::io;
use std::path::Path;

/// Filesystem rename seam, so execution can be driven against fakes in tests
pub trait FileMover {
    fn rename(&mut self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Renames with `std::fs::rename`
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileMover;

impl FileMover for StdFileMover {
    fn rename(&mut self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

/// What happened while executing a plan
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// Renames that completed, as a prefix of the plan's entries
    pub applied: usize,
    /// The error that halted execution, if any
    pub error: Option<RenumberError>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The entries of `plan` that were applied
    pub fn applied_entries<'a>(&self, plan: &'a Plan) -> Vec<&'a RenamePlanEntry> {
        plan.entries().take(self.applied).collect()
    }
}

/// Apply `plan` in order.
///
/// The interrupt flag is checked before each rename. With `dry_run` nothing
/// is renamed; each rename is logged with a `DRY-RUN: ` prefix and otherwise
/// the same wording.
pub fn execute_plan(
    plan: &Plan,
    mover: &mut dyn FileMover,
    interrupt: Option<&InterruptFlag>,
    dry_run: bool,
    report: &mut RunReport,
) -> ExecutionOutcome {
    let mut applied = 0;

    for entry in plan.entries() {
        if interrupt.is_some_and(InterruptFlag::is_set) {
            report.error(format!(
                "Interrupted after {} of {} renames",
                applied,
                plan.len()
            ));
            return ExecutionOutcome {
                applied,
                error: Some(RenumberError::Interrupted),
            };
        }

        let message = format!("Renaming: {}", entry);
        if dry_run {
            report.info(format!("DRY-RUN: {}", message));
        } else {
            report.info(message);
            if let Err(source) = mover.rename(&entry.old_path, &entry.new_path) {
                let error = RenumberError::Rename {
                    from: entry.old_path.clone(),
                    to: entry.new_path.clone(),
                    source,
                };
                report.error(error.to_string());
                return ExecutionOutcome {
                    applied,
                    error: Some(error),
                };
            }
        }
        applied += 1;
    }

    let message = format!("Renamed {} files", applied);
    if dry_run {
        report.info(format!("DRY-RUN: {}", message));
    } else {
        report.info(message);
    }

    ExecutionOutcome {
        applied,
        error: None,
    }
}
