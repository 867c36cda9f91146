//! lessonseq - Main entry point
//!
//! Parses the command line, loads configuration, installs signal handlers and
//! hands the requested intent to a [`Renumberer`]. The process exit status is
//! taken from the run outcome.

use anyhow::{Context, Result};
use lessonseq::cli::{Cli, Commands};
use lessonseq::config::RenumberConfig;
use lessonseq::engine::Plan;
use lessonseq::interrupt;
use lessonseq::renumber::{Renumberer, RunOutcome};
use std::io::{self, BufRead, Write};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize the logger; `RUST_LOG` overrides the default `info` level
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    init_logger();
    let cli = Cli::parse_args();
    debug!("CLI arguments parsed");

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

/// File configuration with command-line overrides applied
fn load_config(cli: &Cli) -> Result<RenumberConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            RenumberConfig::load_from_file(path)?
        }
        None => RenumberConfig::default(),
    };

    if let Some(threshold) = cli.name_threshold {
        config.name_similarity_threshold = threshold;
    }
    if let Some(threshold) = cli.content_threshold {
        config.content_similarity_threshold = threshold;
    }
    if cli.no_duplicate_check {
        config.duplicate_check = false;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Ask a yes/no question on stdin; anything but `y`/`yes` is a no
fn confirm(prompt: &str) -> bool {
    print!("{} (y/N): ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli)?;

    let mut renumberer = Renumberer::new(&cli.dir, config)
        .dry_run(cli.dry_run)
        .backup_dir(cli.backup_dir.clone());

    match interrupt::init_signal_handlers() {
        Ok(flag) => renumberer = renumberer.with_interrupt(flag),
        // Renames still run; an interrupt just cannot trigger rollback
        Err(e) => warn!("Failed to initialize signal handlers: {}", e),
    }

    let interactive = !cli.dry_run && !cli.yes;
    if interactive {
        renumberer = renumberer.with_confirmation(Box::new(|plan: &Plan| {
            confirm(&format!("Rename {} files?", plan.len()))
        }));
    }

    match cli.command {
        Commands::Insert { position, unit } => finish(renumberer.insert(position, unit), cli.json),
        Commands::CloseGaps { unit } => finish(renumberer.close_gaps(unit), cli.json),
        Commands::Rollback { snapshot } => {
            if interactive
                && !confirm(&format!(
                    "Restore lesson files from {}? Current files with the same names will be replaced",
                    snapshot.display()
                ))
            {
                info!("Rollback cancelled");
                return Ok(1);
            }

            let run = renumberer.rollback_from(&snapshot);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&run)?);
            } else if let Some(outcome) = &run.outcome {
                println!(
                    "✓ Restored {} files and removed {} renamed files from {}",
                    outcome.restored,
                    outcome.removed,
                    run.snapshot.display()
                );
            } else {
                eprintln!("✗ Rollback from {} failed", run.snapshot.display());
            }
            Ok(run.exit_code())
        }
        Commands::Backups => {
            let backups = renumberer.list_backups()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&backups)?);
            } else if backups.is_empty() {
                println!("No backup directories found");
            } else {
                println!("Available backups (newest first):");
                for (i, backup) in backups.iter().enumerate() {
                    println!("  {}. {}", i + 1, backup.display());
                }
            }
            Ok(0)
        }
    }
}

/// Print the outcome and return its exit status
fn finish(outcome: RunOutcome, json: bool) -> Result<i32> {
    let code = outcome.exit_code();

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(code);
    }

    if let Some(plan) = outcome.plan.as_ref().filter(|p| !p.is_empty()) {
        for line in plan.preview_lines() {
            println!("{}", line);
        }
    }
    match (code, outcome.snapshot.as_ref()) {
        (0, _) if outcome.no_changes => println!("✓ Nothing to renumber"),
        (0, _) if outcome.dry_run => println!("✓ Dry run complete; no files were changed"),
        (0, Some(snapshot)) => println!(
            "✓ Renamed {} files (backup: {})",
            outcome.applied,
            snapshot.display()
        ),
        (_, Some(snapshot)) if !outcome.stage.is_terminal() || code == 3 => eprintln!(
            "✗ {}; restore manually from {}",
            outcome.stage,
            snapshot.display()
        ),
        _ => eprintln!(
            "✗ {}{}",
            outcome.stage,
            outcome
                .error
                .as_ref()
                .map(|e| format!(": {}", e))
                .unwrap_or_default()
        ),
    }
    Ok(code)
}
