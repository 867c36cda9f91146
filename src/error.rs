//! Error handling module for lessonseq
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Every stage of a renumbering run reports failures through these types.

use std::path::PathBuf;
use thiserror::Error;

/// Reasons a rename plan is rejected before any file is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Two or more plan entries compute the same target path
    #[error("Conflict: multiple files would be renamed to {target:?} ({sources:?})")]
    TargetCollision {
        target: PathBuf,
        sources: Vec<PathBuf>,
    },

    /// A target path exists on disk and is not vacated by the plan
    #[error("Conflict: {target:?} already exists and would be overwritten by {source_path:?}")]
    TargetExists {
        target: PathBuf,
        source_path: PathBuf,
    },

    /// The execution order would write a target before its current holder moves away
    #[error("Unsafe order: {source_path:?} would overwrite {target:?} before it is renamed")]
    UnsafeOrder {
        source_path: PathBuf,
        target: PathBuf,
    },

    /// A shifted name would need a sequence number the grammar cannot hold
    #[error("No room: {source_path:?} would need sequence {sequence}, above the maximum {max}")]
    SequenceOutOfRange {
        source_path: PathBuf,
        sequence: u32,
        max: u32,
    },

    /// Two lessons look like copies of each other
    #[error(
        "DUPLICATE DETECTED: {file:?} appears to be very similar to {other:?} \
         (filename similarity {:.1}%, content similarity {:.1}%)",
        .name_similarity * 100.0,
        .content_similarity * 100.0
    )]
    DuplicateSuspected {
        file: PathBuf,
        other: PathBuf,
        name_similarity: f64,
        content_similarity: f64,
    },
}

/// Main error type for lessonseq
#[derive(Error, Debug)]
pub enum RenumberError {
    /// IO errors outside a specific stage (scanning, reading)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid command-line or API arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No lesson files exist for the requested unit
    #[error("No lesson files found for unit {unit:02}")]
    NoLessons { unit: u8 },

    /// Plan rejected by the conflict validator
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Snapshot directory could not be created or a source could not be copied
    #[error("Backup failed at {path:?}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single rename failed mid-plan
    #[error("Failed to rename {from:?} to {to:?}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Execution halted because the process received a termination signal
    #[error("Interrupted by signal before all renames were applied")]
    Interrupted,

    /// Restoring from the snapshot failed; manual restoration is required
    #[error(
        "Rollback from {snapshot:?} failed ({} error(s)); restore manually from the snapshot",
        .failures.len()
    )]
    RollbackFailed {
        snapshot: PathBuf,
        failures: Vec<String>,
    },

    /// Run state machine misuse
    #[error("Run transition error: {0}")]
    RunTransition(String),

    /// Operator declined the confirmation prompt
    #[error("Operation cancelled")]
    Cancelled,

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for lessonseq operations
pub type Result<T> = std::result::Result<T, RenumberError>;

// Convenient error constructors
impl RenumberError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a backup error for `path`
    pub fn backup(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Backup {
            path: path.into(),
            source,
        }
    }
}
