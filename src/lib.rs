//! lessonseq Library
//!
//! Safe renumbering of sequenced lesson files (`UU-LL-title.md`) and their
//! images (`UU_LL_name.png`): plan, validate, back up, rename, and roll back
//! on failure.

pub mod backup;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod interrupt;
pub mod locator;
pub mod renumber;
pub mod report;
pub mod rollback;
pub mod run_state;
pub mod similarity;
pub mod types;

// Re-export main types for convenience
pub use backup::{Snapshot, SnapshotManifest};
pub use config::RenumberConfig;
pub use engine::{Plan, RenamePlanEntry};
pub use error::{RenumberError, Result, ValidationError};
pub use executor::{ExecutionOutcome, FileMover, StdFileMover};
pub use interrupt::InterruptFlag;
pub use locator::{Identifier, UnitScan, Workspace};
pub use renumber::{Renumberer, RollbackRun, RunOutcome};
pub use report::RunReport;
pub use rollback::RollbackOutcome;
pub use run_state::{RunContext, RunStage, RunTransitionError};
pub use types::{ArtifactFamily, RenumberIntent};
