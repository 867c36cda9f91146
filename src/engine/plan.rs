//! Plan Builder
//!
//! Translates a [`RenumberIntent`] plus the scanned state of a unit into an
//! ordered list of renames, applied consistently to lesson files and the
//! images that share their `(unit, sequence)`.
//!
//! # Intents
//!
//! | Intent     | Mapping                                  | Execution order            |
//! |------------|------------------------------------------|----------------------------|
//! | Insert(N)  | `seq >= N` becomes `seq + 1`             | descending current seq     |
//! | CloseGaps  | lessons reassigned `1..=count` in order  | ascending target seq       |
//!
//! # Design
//!
//! - **Pure logic**: No I/O. The plan is computed from a [`UnitScan`].
//! - **Pruned**: Entries whose sequence would not change are dropped.
//! - **Deterministic**: Same scan + same intent gives the same plan.

use crate::locator::{Identifier, UnitScan};
use crate::report::RunReport;
use crate::types::{ArtifactFamily, RenumberIntent};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Plan Types
// ============================================================================

/// A single rename: one artifact moving to a new sequence number
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamePlanEntry {
    pub old_identifier: Identifier,
    pub new_sequence: u32,
    pub old_path: PathBuf,
    pub new_path: PathBuf,
}

impl RenamePlanEntry {
    pub fn new(old_identifier: Identifier, new_sequence: u32) -> Self {
        let old_path = old_identifier.path.clone();
        let new_path = old_identifier.path_with_sequence(new_sequence);
        Self {
            old_identifier,
            new_sequence,
            old_path,
            new_path,
        }
    }

    pub fn family(&self) -> ArtifactFamily {
        self.old_identifier.family
    }

    pub fn old_sequence(&self) -> u32 {
        self.old_identifier.sequence
    }

    pub fn old_name(&self) -> String {
        file_name(&self.old_path)
    }

    pub fn new_name(&self) -> String {
        file_name(&self.new_path)
    }
}

impl fmt::Display for RenamePlanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.family() {
            ArtifactFamily::Lesson => "",
            ArtifactFamily::Image => "images/",
        };
        write!(
            f,
            "{prefix}{} -> {prefix}{}",
            self.old_name(),
            self.new_name()
        )
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A complete renumbering plan for one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub intent: RenumberIntent,
    pub unit: u8,
    /// Lesson renames in execution order
    pub lessons: Vec<RenamePlanEntry>,
    /// Image renames in execution order, derived from the lesson mapping
    pub images: Vec<RenamePlanEntry>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty() && self.images.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lessons.len() + self.images.len()
    }

    /// All entries in execution order: lessons first, then images
    pub fn entries(&self) -> impl Iterator<Item = &RenamePlanEntry> {
        self.lessons.iter().chain(self.images.iter())
    }

    /// `(old_path, new_path)` for every entry, in execution order
    pub fn pairs(&self) -> Vec<(PathBuf, PathBuf)> {
        self.entries()
            .map(|e| (e.old_path.clone(), e.new_path.clone()))
            .collect()
    }

    /// Before/after preview lines, one block per family
    pub fn preview_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (title, entries) in [
            ("LESSON FILES TO RENAME:", &self.lessons),
            ("IMAGE FILES TO RENAME:", &self.images),
        ] {
            if entries.is_empty() {
                continue;
            }
            lines.push(title.to_string());
            lines.push("-".repeat(40));
            for entry in entries {
                lines.push(format!(
                    "  {:02} -> {:02}: {}",
                    entry.old_sequence(),
                    entry.new_sequence,
                    entry.old_name()
                ));
                lines.push(format!("      -> {}", entry.new_name()));
            }
        }
        lines.push(format!(
            "TOTAL CHANGES: {} lessons + {} images",
            self.lessons.len(),
            self.images.len()
        ));
        lines
    }

    /// Returns a summary of the plan for logging/display.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Renumber Plan: {} (unit {:02})", self.intent, self.unit),
            format!("  Operations ({}):", self.len()),
        ];
        for (i, entry) in self.entries().enumerate() {
            lines.push(format!("    {}. {}", i + 1, entry));
        }
        lines.join("\n")
    }
}

// ============================================================================
// Plan Calculation
// ============================================================================

/// Calculate the rename plan for `intent` over the scanned unit.
///
/// Image files whose sequence cannot be correlated to a lesson during
/// gap-closing are left alone and a skip is logged to `report`.
pub fn build_plan(scan: &UnitScan, intent: RenumberIntent, report: &mut RunReport) -> Plan {
    let (lessons, images) = match intent {
        RenumberIntent::Insert { at } => plan_insertion(scan, at),
        RenumberIntent::CloseGaps => plan_gap_closing(scan, report),
    };

    Plan {
        intent,
        unit: scan.unit,
        lessons,
        images,
    }
}

/// Shift every artifact at or after `at` up by one, highest sequence first.
///
/// The shift never wraps; a result past [`MAX_SEQUENCE`](crate::types::MAX_SEQUENCE)
/// is left for the validator to reject.
fn plan_insertion(scan: &UnitScan, at: u32) -> (Vec<RenamePlanEntry>, Vec<RenamePlanEntry>) {
    let shift = |artifacts: &[Identifier]| {
        let mut entries: Vec<RenamePlanEntry> = artifacts
            .iter()
            .filter(|a| a.sequence >= at)
            .map(|a| RenamePlanEntry::new(a.clone(), a.sequence.saturating_add(1)))
            .collect();
        // Stable: equal sequences keep their relative order
        entries.sort_by(|a, b| b.old_sequence().cmp(&a.old_sequence()));
        entries
    };

    (shift(&scan.lessons), shift(&scan.images))
}

/// Reassign lessons `1..=count` in scan order and carry images along.
fn plan_gap_closing(
    scan: &UnitScan,
    report: &mut RunReport,
) -> (Vec<RenamePlanEntry>, Vec<RenamePlanEntry>) {
    let mut mapping: HashMap<u32, u32> = HashMap::new();
    let mut lessons = Vec::new();

    for (index, lesson) in scan.lessons.iter().enumerate() {
        let new_sequence = index as u32 + 1;
        // First lesson holding a sequence decides where its images go
        mapping.entry(lesson.sequence).or_insert(new_sequence);
        if lesson.sequence != new_sequence {
            lessons.push(RenamePlanEntry::new(lesson.clone(), new_sequence));
        }
    }

    let mut images = Vec::new();
    for image in &scan.images {
        let Some(&new_sequence) = mapping.get(&image.sequence) else {
            report.warn(format!(
                "Skipping images/{}: no lesson {:02}-{:02} to follow",
                image.file_name(),
                image.unit,
                image.sequence
            ));
            continue;
        };
        if image.sequence != new_sequence {
            images.push(RenamePlanEntry::new(image.clone(), new_sequence));
        }
    }
    images.sort_by_key(|e| e.new_sequence);

    (lessons, images)
}
