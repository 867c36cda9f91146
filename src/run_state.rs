//! Run State Machine
//!
//! Single source of truth for where a renumbering run is. Forward stages can
//! only be entered one at a time and in order, so a run cannot reach
//! `Executing` without having passed `Validated` and `BackedUp`.
//!
//! # Stage Flow
//!
//! ```text
//! Idle
//!   ↓
//! Planned ──────────┐
//!   ↓               │
//! Validated ────────┤ (dry runs stop here)
//!   ↓               │
//! BackedUp ─────────┤
//!   ↓               ↓
//! Executing       Aborted
//!   ↓       ↘
//! Completed  Failed
//!              ↓
//!          RollingBack
//!            ↓      ↘
//!      RolledBack  Unrecoverable
//! ```

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stages of a renumbering run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RunStage {
    /// Nothing has happened yet
    Idle = 0,

    /// A rename plan was computed
    Planned = 1,

    /// The plan passed conflict validation
    Validated = 2,

    /// Every source file is in a snapshot
    BackedUp = 3,

    /// Renames are being applied; the filesystem is mutating
    Executing = 4,

    /// Every rename applied (terminal)
    Completed = 5,

    /// Stopped before any rename (terminal)
    Aborted = 10,

    /// A rename failed or the run was interrupted mid-plan
    Failed = 11,

    /// Restoring from the snapshot
    RollingBack = 12,

    /// Snapshot restored; the directory matches its pre-run state (terminal)
    RolledBack = 13,

    /// Restoration failed; manual recovery required (terminal)
    Unrecoverable = 14,
}

impl RunStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Returns true if no further transition is possible
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Aborted | Self::RolledBack | Self::Unrecoverable
        )
    }

    /// Returns true while files may be in a half-renamed state
    #[inline]
    pub const fn is_mutating(self) -> bool {
        matches!(self, Self::Executing | Self::Failed | Self::RollingBack)
    }

    /// Next stage on the success path
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Planned),
            Self::Planned => Some(Self::Validated),
            Self::Validated => Some(Self::BackedUp),
            Self::BackedUp => Some(Self::Executing),
            Self::Executing => Some(Self::Completed),
            Self::Failed => Some(Self::RollingBack),
            Self::Completed
            | Self::Aborted
            | Self::RollingBack
            | Self::RolledBack
            | Self::Unrecoverable => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Planned => "Plan computed",
            Self::Validated => "Plan validated",
            Self::BackedUp => "Backup created",
            Self::Executing => "Renaming files",
            Self::Completed => "Renumbering complete",
            Self::Aborted => "Aborted before any change",
            Self::Failed => "Renaming failed",
            Self::RollingBack => "Rolling back",
            Self::RolledBack => "Rolled back",
            Self::Unrecoverable => "Rollback failed",
        }
    }

    /// Stages of the success path, in order
    pub const fn success_path() -> &'static [Self] {
        &[
            Self::Idle,
            Self::Planned,
            Self::Validated,
            Self::BackedUp,
            Self::Executing,
            Self::Completed,
        ]
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunTransitionError {
    /// Attempted to skip one or more stages
    #[error("Cannot skip from {from} to {to}")]
    SkippedStage { from: RunStage, to: RunStage },

    /// Attempted to go backwards
    #[error("Cannot go backwards from {from} to {to}")]
    BackwardTransition { from: RunStage, to: RunStage },

    /// Attempted to transition from a terminal state
    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: RunStage },

    /// A dry run tried to move past validation
    #[error("Dry run cannot proceed past {stage}")]
    DryRunBoundary { stage: RunStage },

    /// The requested transition does not exist from the current stage
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: RunStage, to: RunStage },

    /// Attempted to transition to the same state
    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: RunStage },
}

/// Owns the stage of one run and enforces valid transitions.
///
/// ```
/// use lessonseq::run_state::{RunContext, RunStage};
///
/// let mut ctx = RunContext::new(false);
/// ctx.advance().unwrap();
/// assert_eq!(ctx.current_stage(), RunStage::Planned);
///
/// // Cannot skip validation
/// assert!(ctx.transition_to(RunStage::BackedUp).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RunContext {
    current: RunStage,
    dry_run: bool,
    /// Stage at which the run was aborted or failed
    stopped_at: Option<RunStage>,
    /// Entered stages with unix timestamps
    stage_history: Vec<(RunStage, u64)>,
}

impl RunContext {
    pub fn new(dry_run: bool) -> Self {
        Self {
            current: RunStage::Idle,
            dry_run,
            stopped_at: None,
            stage_history: Vec::with_capacity(RunStage::success_path().len()),
        }
    }

    #[inline]
    pub fn current_stage(&self) -> RunStage {
        self.current
    }

    #[inline]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Stage the run was in when it was aborted or failed
    #[inline]
    pub fn stopped_at(&self) -> Option<RunStage> {
        self.stopped_at
    }

    /// True once no more work will be done: a terminal stage, or a dry run
    /// that has validated its plan
    pub fn is_finished(&self) -> bool {
        self.current.is_terminal() || (self.dry_run && self.current == RunStage::Validated)
    }

    pub fn stage_history(&self) -> &[(RunStage, u64)] {
        &self.stage_history
    }

    /// Advance to the next stage on the success path (or from `Failed` to
    /// `RollingBack`).
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if the run is over
    /// - `DryRunBoundary` if a dry run tries to leave `Validated`
    /// - `InvalidTransition` from `RollingBack`, which only `finish_rollback` leaves
    pub fn advance(&mut self) -> Result<RunStage, RunTransitionError> {
        if self.current.is_terminal() {
            return Err(RunTransitionError::FromTerminalState { from: self.current });
        }
        if self.dry_run && self.current == RunStage::Validated {
            return Err(RunTransitionError::DryRunBoundary {
                stage: self.current,
            });
        }

        let Some(next_stage) = self.current.next() else {
            return Err(RunTransitionError::InvalidTransition {
                from: self.current,
                to: RunStage::RolledBack,
            });
        };

        self.record_stage_transition(next_stage);
        self.current = next_stage;
        Ok(next_stage)
    }

    /// Transition to `target`, which must be the next stage.
    ///
    /// Stricter than `advance()`: the caller states where it expects to go.
    pub fn transition_to(&mut self, target: RunStage) -> Result<RunStage, RunTransitionError> {
        if self.current.is_terminal() {
            return Err(RunTransitionError::FromTerminalState { from: self.current });
        }
        if target == self.current {
            return Err(RunTransitionError::AlreadyAtStage { stage: target });
        }
        if target.order() < self.current.order() {
            return Err(RunTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }
        if self.current.next() != Some(target) {
            return Err(RunTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }
        self.advance()
    }

    /// Stop the run before any rename was applied.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` once execution has begun; use `fail()` there.
    pub fn abort(&mut self) -> Result<(), RunTransitionError> {
        if self.current.is_terminal() {
            return Err(RunTransitionError::FromTerminalState { from: self.current });
        }
        if self.current.is_mutating() {
            return Err(RunTransitionError::InvalidTransition {
                from: self.current,
                to: RunStage::Aborted,
            });
        }
        self.stopped_at = Some(self.current);
        self.record_stage_transition(RunStage::Aborted);
        self.current = RunStage::Aborted;
        Ok(())
    }

    /// Mark execution as failed. Only valid while `Executing`.
    pub fn fail(&mut self) -> Result<(), RunTransitionError> {
        if self.current != RunStage::Executing {
            return Err(RunTransitionError::InvalidTransition {
                from: self.current,
                to: RunStage::Failed,
            });
        }
        self.stopped_at = Some(self.current);
        self.record_stage_transition(RunStage::Failed);
        self.current = RunStage::Failed;
        Ok(())
    }

    /// Enter `RollingBack` from `Failed`
    pub fn begin_rollback(&mut self) -> Result<(), RunTransitionError> {
        self.transition_to(RunStage::RollingBack).map(|_| ())
    }

    /// Leave `RollingBack` for `RolledBack` or `Unrecoverable`
    pub fn finish_rollback(&mut self, restored: bool) -> Result<RunStage, RunTransitionError> {
        let target = if restored {
            RunStage::RolledBack
        } else {
            RunStage::Unrecoverable
        };
        if self.current != RunStage::RollingBack {
            return Err(RunTransitionError::InvalidTransition {
                from: self.current,
                to: target,
            });
        }
        self.record_stage_transition(target);
        self.current = target;
        Ok(target)
    }

    fn record_stage_transition(&mut self, stage: RunStage) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        tracing::debug!("Run stage: {} -> {}", self.current, stage);
        self.stage_history.push((stage, timestamp));
    }
}

impl From<RunTransitionError> for crate::error::RenumberError {
    fn from(err: RunTransitionError) -> Self {
        crate::error::RenumberError::RunTransition(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // RunStage Tests
    // =========================================================================

    #[test]
    fn test_success_path_forms_chain() {
        let mut current = RunStage::Idle;
        let mut visited = vec![current];
        while let Some(next) = current.next() {
            current = next;
            visited.push(current);
            assert!(visited.len() < 20, "Infinite loop detected in stage chain");
        }
        assert_eq!(visited, RunStage::success_path());
    }

    #[test]
    fn test_terminal_states() {
        for stage in [
            RunStage::Completed,
            RunStage::Aborted,
            RunStage::RolledBack,
            RunStage::Unrecoverable,
        ] {
            assert!(stage.is_terminal(), "{:?} should be terminal", stage);
        }
        for stage in [RunStage::Idle, RunStage::Executing, RunStage::Failed, RunStage::RollingBack] {
            assert!(!stage.is_terminal(), "{:?} should not be terminal", stage);
        }
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(RunStage::BackedUp.to_string(), "Backup created");
        assert_eq!(RunStage::Unrecoverable.to_string(), "Rollback failed");
    }

    // =========================================================================
    // RunContext Tests
    // =========================================================================

    #[test]
    fn test_advance_through_success_path() {
        let mut ctx = RunContext::new(false);
        for expected in &RunStage::success_path()[1..] {
            assert_eq!(ctx.advance().unwrap(), *expected);
        }
        assert!(ctx.is_finished());
        assert_eq!(ctx.stage_history().len(), 5);
        assert!(matches!(
            ctx.advance(),
            Err(RunTransitionError::FromTerminalState { .. })
        ));
    }

    #[test]
    fn test_dry_run_stops_at_validated() {
        let mut ctx = RunContext::new(true);
        ctx.advance().unwrap();
        ctx.advance().unwrap();
        assert!(ctx.is_finished());
        assert_eq!(
            ctx.advance(),
            Err(RunTransitionError::DryRunBoundary {
                stage: RunStage::Validated
            })
        );
        assert_eq!(ctx.current_stage(), RunStage::Validated);
    }

    #[test]
    fn test_cannot_skip_or_go_backwards() {
        let mut ctx = RunContext::new(false);
        assert!(matches!(
            ctx.transition_to(RunStage::Executing),
            Err(RunTransitionError::SkippedStage { .. })
        ));
        ctx.advance().unwrap();
        ctx.advance().unwrap();
        assert!(matches!(
            ctx.transition_to(RunStage::Planned),
            Err(RunTransitionError::BackwardTransition { .. })
        ));
        assert!(matches!(
            ctx.transition_to(RunStage::Validated),
            Err(RunTransitionError::AlreadyAtStage { .. })
        ));
        assert_eq!(ctx.transition_to(RunStage::BackedUp), Ok(RunStage::BackedUp));
    }

    #[test]
    fn test_abort_before_execution() {
        let mut ctx = RunContext::new(false);
        ctx.advance().unwrap();
        ctx.abort().unwrap();
        assert_eq!(ctx.current_stage(), RunStage::Aborted);
        assert_eq!(ctx.stopped_at(), Some(RunStage::Planned));
        assert!(ctx.abort().is_err());
    }

    #[test]
    fn test_cannot_abort_while_executing() {
        let mut ctx = RunContext::new(false);
        for _ in 0..4 {
            ctx.advance().unwrap();
        }
        assert_eq!(ctx.current_stage(), RunStage::Executing);
        assert!(matches!(
            ctx.abort(),
            Err(RunTransitionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_fail_only_while_executing() {
        let mut ctx = RunContext::new(false);
        assert!(ctx.fail().is_err());
        for _ in 0..4 {
            ctx.advance().unwrap();
        }
        ctx.fail().unwrap();
        assert_eq!(ctx.current_stage(), RunStage::Failed);
        assert_eq!(ctx.stopped_at(), Some(RunStage::Executing));
    }

    #[test]
    fn test_rollback_outcomes() {
        for (restored, expected) in [(true, RunStage::RolledBack), (false, RunStage::Unrecoverable)] {
            let mut ctx = RunContext::new(false);
            for _ in 0..4 {
                ctx.advance().unwrap();
            }
            ctx.fail().unwrap();
            assert!(ctx.finish_rollback(restored).is_err());
            ctx.begin_rollback().unwrap();
            assert!(ctx.advance().is_err());
            assert_eq!(ctx.finish_rollback(restored), Ok(expected));
            assert!(ctx.is_finished());
        }
    }

    #[test]
    fn test_transition_error_converts() {
        let err: crate::error::RenumberError = RunTransitionError::DryRunBoundary {
            stage: RunStage::Validated,
        }
        .into();
        assert!(err.to_string().contains("Dry run cannot proceed past Plan validated"));
    }
}
