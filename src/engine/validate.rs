//! Conflict Validator
//!
//! Two passes over a [`Plan`] before anything is mutated:
//!
//! 1. **Structural**: every new sequence fits the filename grammar, no two
//!    entries share a target, no target overwrites a file the plan does not
//!    move, and no entry writes a target before the entry currently holding
//!    that path has been moved away.
//! 2. **Duplicate content** (insertion only): a lesson being shifted whose
//!    name is close to another lesson's name (cheap gate) and whose content
//!    is close too (expensive check) is reported as a suspected copy-paste
//!    duplicate. This is a heuristic; the operator resolves it.

use crate::config::RenumberConfig;
use crate::engine::plan::Plan;
use crate::error::ValidationError;
use crate::locator::Identifier;
use crate::report::RunReport;
use crate::similarity;
use crate::types::MAX_SEQUENCE;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Run every check that applies to the plan's intent.
pub fn validate_plan(
    plan: &Plan,
    known_lessons: &[Identifier],
    config: &RenumberConfig,
    report: &mut RunReport,
) -> Result<(), ValidationError> {
    validate_structure(plan)?;

    if plan.intent.is_insertion() && config.duplicate_check {
        check_duplicates(plan, known_lessons, config, report)?;
    }

    Ok(())
}

/// Reject out-of-range sequences, collisions, overwrites of unrelated files
/// and unsafe ordering.
pub fn validate_structure(plan: &Plan) -> Result<(), ValidationError> {
    let entries: Vec<_> = plan.entries().collect();

    if let Some(entry) = entries.iter().find(|e| e.new_sequence > MAX_SEQUENCE) {
        return Err(ValidationError::SequenceOutOfRange {
            source_path: entry.old_path.clone(),
            sequence: entry.new_sequence,
            max: MAX_SEQUENCE,
        });
    }

    let mut targets: HashMap<&PathBuf, Vec<PathBuf>> = HashMap::new();
    for entry in &entries {
        targets
            .entry(&entry.new_path)
            .or_default()
            .push(entry.old_path.clone());
    }
    for entry in &entries {
        if let Some(sources) = targets.get(&entry.new_path) {
            if sources.len() > 1 {
                return Err(ValidationError::TargetCollision {
                    target: entry.new_path.clone(),
                    sources: sources.clone(),
                });
            }
        }
    }

    let old_index: HashMap<&PathBuf, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (&e.old_path, i))
        .collect();

    for (i, entry) in entries.iter().enumerate() {
        match old_index.get(&entry.new_path) {
            Some(&holder) if holder > i => {
                return Err(ValidationError::UnsafeOrder {
                    source_path: entry.old_path.clone(),
                    target: entry.new_path.clone(),
                });
            }
            Some(_) => {}
            None => {
                if path_exists(&entry.new_path) {
                    return Err(ValidationError::TargetExists {
                        target: entry.new_path.clone(),
                        source_path: entry.old_path.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}

fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Compare every lesson being shifted against every other known lesson.
pub fn check_duplicates(
    plan: &Plan,
    known_lessons: &[Identifier],
    config: &RenumberConfig,
    report: &mut RunReport,
) -> Result<(), ValidationError> {
    let mut contents: HashMap<PathBuf, Option<String>> = HashMap::new();
    let moving: HashSet<&PathBuf> = plan.lessons.iter().map(|e| &e.old_path).collect();

    for entry in &plan.lessons {
        let Some(content) = read_cached(&mut contents, &entry.old_path, report) else {
            continue;
        };
        let description = entry.old_identifier.description();

        for other in known_lessons {
            if other.path == entry.old_path {
                continue;
            }
            let name_similarity = similarity::ratio(&description, &other.description());
            if name_similarity <= config.name_similarity_threshold {
                continue;
            }

            let Some(other_content) = read_cached(&mut contents, &other.path, report) else {
                continue;
            };
            let content_similarity = similarity::ratio(&content, &other_content);
            if content_similarity > config.content_similarity_threshold {
                report.error(format!(
                    "DUPLICATE DETECTED: '{}' appears to be very similar to '{}'",
                    entry.old_name(),
                    other.file_name()
                ));
                report.error(format!("  - Filename similarity: {:.1}%", name_similarity * 100.0));
                report.error(format!(
                    "  - Content similarity: {:.1}%",
                    content_similarity * 100.0
                ));
                if moving.contains(&other.path) {
                    report.error("  - Both files are part of this renumbering");
                }
                report.error("  - This suggests duplicate lessons that should be consolidated");
                return Err(ValidationError::DuplicateSuspected {
                    file: entry.old_path.clone(),
                    other: other.path.clone(),
                    name_similarity,
                    content_similarity,
                });
            }
        }
    }

    Ok(())
}

fn read_cached(
    cache: &mut HashMap<PathBuf, Option<String>>,
    path: &Path,
    report: &mut RunReport,
) -> Option<String> {
    cache
        .entry(path.to_path_buf())
        .or_insert_with(|| match fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(e) => {
                report.warn(format!(
                    "Could not read {} for duplicate checking: {}",
                    path.display(),
                    e
                ));
                None
            }
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::plan::{build_plan, RenamePlanEntry};
    use crate::locator::{scan_all_lessons, scan_unit, Workspace};
    use crate::types::{ArtifactFamily, RenumberIntent};
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).expect("Should write file");
    }

    fn lesson_at(dir: &Path, seq: u32, suffix: &str) -> Identifier {
        Identifier {
            family: ArtifactFamily::Lesson,
            unit: 2,
            sequence: seq,
            suffix: suffix.to_string(),
            path: dir.join(ArtifactFamily::Lesson.file_name(2, seq, suffix)),
        }
    }

    fn plan_of(intent: RenumberIntent, lessons: Vec<RenamePlanEntry>) -> Plan {
        Plan {
            intent,
            unit: 2,
            lessons,
            images: Vec::new(),
        }
    }

    #[test]
    fn test_collision_rejected() {
        let tmp = TempDir::new().expect("Should create temp dir");
        // Two distinct sources forced onto the same target
        let a = RenamePlanEntry::new(lesson_at(tmp.path(), 3, "x"), 5);
        let mut b = RenamePlanEntry::new(lesson_at(tmp.path(), 4, "y"), 5);
        b.new_path = a.new_path.clone();

        let err = validate_structure(&plan_of(RenumberIntent::CloseGaps, vec![a, b])).unwrap_err();
        assert!(matches!(err, ValidationError::TargetCollision { ref sources, .. } if sources.len() == 2));
    }

    #[test]
    fn test_existing_target_rejected() {
        let tmp = TempDir::new().expect("Should create temp dir");
        write(tmp.path(), "02-03-x.md", "x");
        write(tmp.path(), "02-04-x.md", "unrelated");

        let entry = RenamePlanEntry::new(lesson_at(tmp.path(), 3, "x"), 4);
        let err = validate_structure(&plan_of(RenumberIntent::Insert { at: 3 }, vec![entry])).unwrap_err();
        assert!(matches!(err, ValidationError::TargetExists { .. }));
    }

    #[test]
    fn test_shift_past_max_sequence_rejected() {
        let tmp = TempDir::new().expect("Should create temp dir");
        write(tmp.path(), "02-998-x.md", "x");
        write(tmp.path(), "02-999-y.md", "y");
        let workspace = Workspace::new(tmp.path(), &RenumberConfig::default());
        let scan = scan_unit(&workspace, 2).expect("Should scan");

        let plan = build_plan(&scan, RenumberIntent::Insert { at: 998 }, &mut RunReport::new());
        assert_eq!(plan.lessons[0].new_sequence, MAX_SEQUENCE + 1);
        assert!(matches!(
            validate_structure(&plan).unwrap_err(),
            ValidationError::SequenceOutOfRange { sequence: 1000, .. }
        ));
    }

    #[test]
    fn test_target_vacated_by_earlier_entry_is_fine() {
        let tmp = TempDir::new().expect("Should create temp dir");
        write(tmp.path(), "02-03-x.md", "three");
        write(tmp.path(), "02-04-x.md", "four");

        // Descending order: 04 moves first, then 03 takes its old name
        let first = RenamePlanEntry::new(lesson_at(tmp.path(), 4, "x"), 5);
        let second = RenamePlanEntry::new(lesson_at(tmp.path(), 3, "x"), 4);
        let plan = plan_of(RenumberIntent::Insert { at: 3 }, vec![first.clone(), second.clone()]);
        assert!(validate_structure(&plan).is_ok());

        // Ascending order would overwrite 02-04-x.md before it moves
        let plan = plan_of(RenumberIntent::Insert { at: 3 }, vec![second, first]);
        assert!(matches!(
            validate_structure(&plan).unwrap_err(),
            ValidationError::UnsafeOrder { .. }
        ));
    }

    #[test]
    fn test_duplicate_copy_detected() {
        let tmp = TempDir::new().expect("Should create temp dir");
        let body = "# Reservoir Basics\n\nStorage, inflow and outflow elements.\n".repeat(5);
        write(tmp.path(), "02-01-intro.md", "# Intro\n");
        write(tmp.path(), "02-02-reservoir-basics.md", &body);
        write(tmp.path(), "02-03-reservoir-basic.md", &body);

        let workspace = Workspace::new(tmp.path(), &RenumberConfig::default());
        let scan = scan_unit(&workspace, 2).expect("Should scan");
        let known = scan_all_lessons(&workspace).expect("Should scan");
        let mut report = RunReport::new();
        let plan = build_plan(&scan, RenumberIntent::Insert { at: 2 }, &mut report);

        let err = validate_plan(&plan, &known, &RenumberConfig::default(), &mut report).unwrap_err();
        match err {
            ValidationError::DuplicateSuspected {
                name_similarity,
                content_similarity,
                ..
            } => {
                assert!(name_similarity > 0.8);
                assert!(content_similarity > 0.5);
            }
            other => panic!("Expected duplicate, got {:?}", other),
        }
        assert!(report.has_errors());
    }

    #[test]
    fn test_similar_names_different_content_pass() {
        let tmp = TempDir::new().expect("Should create temp dir");
        write(tmp.path(), "02-01-water-balance.md", &"alpha beta gamma\n".repeat(20));
        write(tmp.path(), "02-02-water-balances.md", &"0123456789\n".repeat(20));

        let workspace = Workspace::new(tmp.path(), &RenumberConfig::default());
        let scan = scan_unit(&workspace, 2).expect("Should scan");
        let known = scan_all_lessons(&workspace).expect("Should scan");
        let mut report = RunReport::new();
        let plan = build_plan(&scan, RenumberIntent::Insert { at: 1 }, &mut report);

        assert!(validate_plan(&plan, &known, &RenumberConfig::default(), &mut report).is_ok());
    }

    #[test]
    fn test_duplicate_check_skipped_for_gap_closing_and_when_disabled() {
        let tmp = TempDir::new().expect("Should create temp dir");
        let body = "same body\n".repeat(10);
        write(tmp.path(), "02-01-topic.md", &body);
        write(tmp.path(), "02-03-topics.md", &body);

        let workspace = Workspace::new(tmp.path(), &RenumberConfig::default());
        let scan = scan_unit(&workspace, 2).expect("Should scan");
        let known = scan_all_lessons(&workspace).expect("Should scan");
        let mut report = RunReport::new();

        let gaps = build_plan(&scan, RenumberIntent::CloseGaps, &mut report);
        assert!(validate_plan(&gaps, &known, &RenumberConfig::default(), &mut report).is_ok());

        let insert = build_plan(&scan, RenumberIntent::Insert { at: 1 }, &mut report);
        assert!(validate_plan(&insert, &known, &RenumberConfig::default(), &mut report).is_err());

        let config = RenumberConfig {
            duplicate_check: false,
            ..RenumberConfig::default()
        };
        assert!(validate_plan(&insert, &known, &config, &mut report).is_ok());
    }
}
