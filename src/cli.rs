use crate::types::{parse_insertion_point, parse_unit};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// lessonseq - Safe renumbering of sequenced lesson files
#[derive(Parser)]
#[command(name = "lessonseq")]
#[command(about = "Insert slots into or close gaps in numbered lesson files, with backup and rollback")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: show every step without touching any file.
    ///
    /// The plan is computed and validated, and the backup and rename steps
    /// are logged exactly as a real run would log them.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Directory holding the lesson files
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// JSON configuration file (thresholds, images dir, backup prefixes)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Name of the backup directory to create instead of a timestamped one
    #[arg(long, global = true)]
    pub backup_dir: Option<String>,

    /// Do not ask for confirmation before renaming
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Print the run outcome as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Filename similarity above which contents are compared (0.0-1.0)
    #[arg(long, global = true)]
    pub name_threshold: Option<f64>,

    /// Content similarity above which lessons count as duplicates (0.0-1.0)
    #[arg(long, global = true)]
    pub content_threshold: Option<f64>,

    /// Skip the duplicate-content check on insertion
    #[arg(long, global = true)]
    pub no_duplicate_check: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Free a lesson slot by shifting every later lesson up by one
    Insert {
        /// Lesson number to free (1-99)
        #[arg(value_parser = parse_insertion_point)]
        position: u32,

        /// Unit to renumber; inferred from the position when omitted
        #[arg(short, long, value_parser = parse_unit)]
        unit: Option<u8>,
    },
    /// Renumber a unit's lessons (and their images) to 1..=count
    CloseGaps {
        /// Unit to renumber (1-99)
        #[arg(value_parser = parse_unit)]
        unit: u8,
    },
    /// Restore lesson and image files from a backup directory
    Rollback {
        /// Backup directory, relative to --dir unless absolute
        snapshot: PathBuf,
    },
    /// List backup directories, newest first
    Backups,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
