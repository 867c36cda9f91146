//! Artifact Locator
//!
//! Scans the working directory for lesson files (`UU-LL-suffix.md`) and the
//! images directory for image files (`UU_LL_suffix.png`), parsing each name
//! into an [`Identifier`]. Read-only.
//!
//! A name that starts like a unit's artifact (`UU-*-*.md`) but does not match
//! the strict grammar is skipped and recorded in [`UnitScan::skipped`]; the
//! same policy applies to every renumbering intent. So is a matching name
//! that is not valid UTF-8, since its suffix could not be carried over
//! byte for byte.

use crate::config::RenumberConfig;
use crate::error::Result;
use crate::types::{ArtifactFamily, MAX_SEQUENCE};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory layout a run operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    images_dir: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, config: &RenumberConfig) -> Self {
        let root = root.into();
        let images_dir = root.join(&config.images_dir);
        Self { root, images_dir }
    }

    /// Directory holding lesson files and snapshot directories
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding image files
    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Directory an artifact family lives in
    pub fn dir_for(&self, family: ArtifactFamily) -> &Path {
        match family {
            ArtifactFamily::Lesson => &self.root,
            ArtifactFamily::Image => &self.images_dir,
        }
    }
}

/// A parsed artifact filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identifier {
    pub family: ArtifactFamily,
    pub unit: u8,
    pub sequence: u32,
    /// Everything between the sequence separator and the extension, verbatim
    pub suffix: String,
    pub path: PathBuf,
}

impl Identifier {
    /// File name component of `path`
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path this artifact would have with a different sequence number
    pub fn path_with_sequence(&self, sequence: u32) -> PathBuf {
        let name = self.family.file_name(self.unit, sequence, &self.suffix);
        match self.path.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        }
    }

    /// Lowercased suffix used for name-similarity comparison
    pub fn description(&self) -> String {
        self.suffix.to_lowercase()
    }
}

/// Result of scanning one unit
#[derive(Debug, Clone, Default)]
pub struct UnitScan {
    pub unit: u8,
    /// Lessons in ascending sequence order (ties by filename)
    pub lessons: Vec<Identifier>,
    /// Images in ascending sequence order (ties by filename)
    pub images: Vec<Identifier>,
    /// Files that looked like this unit's artifacts but failed the strict grammar
    pub skipped: Vec<PathBuf>,
}

/// Sequence digits accepted by every lesson and image grammar
const SEQUENCE_PATTERN: &str = r"\d{1,3}";

/// Compiled filename grammar for one unit and family
struct Grammar {
    family: ArtifactFamily,
    unit: u8,
    /// Loose shape: `UU<sep>anything<sep>anything.ext`
    loose: Regex,
    /// Strict shape: `UU<sep>digits<sep>suffix.ext`
    strict: Regex,
}

impl Grammar {
    fn new(family: ArtifactFamily, unit: u8) -> Result<Self> {
        let sep = regex::escape(&family.separator().to_string());
        let ext = family.extension();
        let loose = Regex::new(&format!(r"^{unit:02}{sep}.*{sep}.*\.{ext}$"))
            .map_err(|e| crate::error::RenumberError::config(e.to_string()))?;
        let strict = Regex::new(&format!(r"^{unit:02}{sep}({SEQUENCE_PATTERN}){sep}(.*)\.{ext}$"))
            .map_err(|e| crate::error::RenumberError::config(e.to_string()))?;
        Ok(Self {
            family,
            unit,
            loose,
            strict,
        })
    }

    fn looks_like(&self, name: &str) -> bool {
        self.loose.is_match(name)
    }

    /// `None` if the name is not this unit's artifact at all,
    /// `Some(None)` if it looks like one but cannot be parsed.
    fn parse(&self, name: &str, path: &Path) -> Option<Option<Identifier>> {
        if !self.looks_like(name) {
            return None;
        }
        let parsed = self.strict.captures(name).and_then(|caps| {
            let sequence = caps[1].parse::<u32>().ok().filter(|s| *s <= MAX_SEQUENCE)?;
            Some(Identifier {
                family: self.family,
                unit: self.unit,
                sequence,
                suffix: caps[2].to_string(),
                path: path.to_path_buf(),
            })
        });
        Some(parsed)
    }
}

/// Scan `dir` for one family of one unit.
///
/// A missing directory yields no artifacts (a unit without images is normal).
fn scan_family(
    dir: &Path,
    family: ArtifactFamily,
    unit: u8,
    skipped: &mut Vec<PathBuf>,
) -> Result<Vec<Identifier>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let grammar = Grammar::new(family, unit)?;
    let mut found = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            let lossy = file_name.to_string_lossy();
            if grammar.looks_like(&lossy) {
                tracing::warn!("{} is not valid UTF-8, skipping", lossy);
                skipped.push(entry.path());
            }
            continue;
        };
        match grammar.parse(name, &entry.path()) {
            Some(Some(identifier)) => found.push(identifier),
            Some(None) => {
                tracing::warn!("Could not parse sequence number from {}, skipping", name);
                skipped.push(entry.path());
            }
            None => {}
        }
    }

    found.sort_by(|a, b| {
        a.sequence
            .cmp(&b.sequence)
            .then_with(|| a.file_name().cmp(&b.file_name()))
    });
    Ok(found)
}

/// Scan the lessons and images belonging to `unit`
pub fn scan_unit(workspace: &Workspace, unit: u8) -> Result<UnitScan> {
    let mut skipped = Vec::new();
    let lessons = scan_family(workspace.root(), ArtifactFamily::Lesson, unit, &mut skipped)?;
    let images = scan_family(
        workspace.images_dir(),
        ArtifactFamily::Image,
        unit,
        &mut skipped,
    )?;
    skipped.sort();

    Ok(UnitScan {
        unit,
        lessons,
        images,
        skipped,
    })
}

/// Every lesson file in the working directory, across all units,
/// sorted by filename
pub fn scan_all_lessons(workspace: &Workspace) -> Result<Vec<Identifier>> {
    let pattern = Regex::new(&format!(r"^(\d{{2}})-({SEQUENCE_PATTERN})-(.*)\.md$"))
        .map_err(|e| crate::error::RenumberError::config(e.to_string()))?;
    let mut lessons = Vec::new();

    for entry in fs::read_dir(workspace.root())? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(caps) = file_name.to_str().and_then(|name| pattern.captures(name)) else {
            continue;
        };
        let (Ok(unit), Ok(sequence)) = (caps[1].parse::<u8>(), caps[2].parse::<u32>()) else {
            continue;
        };
        lessons.push(Identifier {
            family: ArtifactFamily::Lesson,
            unit,
            sequence,
            suffix: caps[3].to_string(),
            path: entry.path(),
        });
    }

    lessons.sort_by_key(|l| l.file_name());
    Ok(lessons)
}

/// Pick the unit an insertion point refers to when none was given:
/// the unit of the first lesson (filename order) whose sequence is `>= at`.
pub fn determine_insertion_unit(all_lessons: &[Identifier], at: u32) -> Option<u8> {
    all_lessons
        .iter()
        .find(|lesson| lesson.sequence >= at)
        .map(|lesson| lesson.unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::create_dir_all(dir).expect("Should create dir");
        fs::write(dir.join(name), name).expect("Should write file");
    }

    fn workspace(tmp: &TempDir) -> Workspace {
        Workspace::new(tmp.path(), &RenumberConfig::default())
    }

    #[test]
    fn test_scan_orders_by_sequence() {
        let tmp = TempDir::new().expect("Should create temp dir");
        touch(tmp.path(), "02-10-late.md");
        touch(tmp.path(), "02-02-early.md");
        touch(tmp.path(), "02-01-first.md");
        touch(tmp.path(), "03-01-other-unit.md");
        touch(tmp.path(), "notes.md");

        let scan = scan_unit(&workspace(&tmp), 2).expect("Should scan");
        let sequences: Vec<u32> = scan.lessons.iter().map(|l| l.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 10]);
        assert_eq!(scan.lessons[2].suffix, "late");
        assert!(scan.skipped.is_empty());
    }

    #[test]
    fn test_scan_includes_images() {
        let tmp = TempDir::new().expect("Should create temp dir");
        touch(tmp.path(), "02-01-intro.md");
        let images = tmp.path().join("images");
        touch(&images, "02_03_chart.png");
        touch(&images, "02_01_diagram.png");
        touch(&images, "01_01_diagram.png");

        let scan = scan_unit(&workspace(&tmp), 2).expect("Should scan");
        assert_eq!(scan.images.len(), 2);
        assert_eq!(scan.images[0].sequence, 1);
        assert_eq!(scan.images[0].family, ArtifactFamily::Image);
        assert_eq!(scan.images[1].suffix, "chart");
    }

    #[test]
    fn test_unparsable_names_are_skipped() {
        let tmp = TempDir::new().expect("Should create temp dir");
        touch(tmp.path(), "02-01-intro.md");
        touch(tmp.path(), "02-xx-broken.md");

        let scan = scan_unit(&workspace(&tmp), 2).expect("Should scan");
        assert_eq!(scan.lessons.len(), 1);
        assert_eq!(scan.skipped, vec![tmp.path().join("02-xx-broken.md")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().expect("Should create temp dir");
        touch(tmp.path(), "02-01-a.md");
        let latin1 = tmp.path().join(OsStr::from_bytes(b"02-03-caf\xe9.md"));
        fs::write(&latin1, "cafe").expect("Should write file");

        let scan = scan_unit(&workspace(&tmp), 2).expect("Should scan");
        assert_eq!(scan.lessons.len(), 1);
        assert_eq!(scan.skipped, vec![latin1.clone()]);

        let all = scan_all_lessons(&workspace(&tmp)).expect("Should scan");
        assert_eq!(all.len(), 1);
        assert!(latin1.exists());
    }

    #[test]
    fn test_oversized_sequence_is_skipped() {
        let tmp = TempDir::new().expect("Should create temp dir");
        touch(tmp.path(), "02-01-a.md");
        touch(tmp.path(), "02-999-last.md");
        touch(tmp.path(), "02-4294967295-big.md");

        let scan = scan_unit(&workspace(&tmp), 2).expect("Should scan");
        let sequences: Vec<u32> = scan.lessons.iter().map(|l| l.sequence).collect();
        assert_eq!(sequences, vec![1, 999]);
        assert_eq!(scan.skipped, vec![tmp.path().join("02-4294967295-big.md")]);
    }

    #[test]
    fn test_all_lessons_uses_unit_grammar() {
        let tmp = TempDir::new().expect("Should create temp dir");
        touch(tmp.path(), "02-01-a.md");
        touch(tmp.path(), "02-100-x.md");

        let all = scan_all_lessons(&workspace(&tmp)).expect("Should scan");
        let unit = scan_unit(&workspace(&tmp), 2).expect("Should scan");
        assert_eq!(all.len(), unit.lessons.len());
        assert!(all.iter().any(|l| l.sequence == 100 && l.suffix == "x"));
        assert_eq!(determine_insertion_unit(&all, 50), Some(2));
    }

    #[test]
    fn test_missing_images_dir_is_empty() {
        let tmp = TempDir::new().expect("Should create temp dir");
        touch(tmp.path(), "02-01-intro.md");
        let scan = scan_unit(&workspace(&tmp), 2).expect("Should scan");
        assert!(scan.images.is_empty());
    }

    #[test]
    fn test_path_with_sequence_preserves_suffix() {
        let id = Identifier {
            family: ArtifactFamily::Lesson,
            unit: 2,
            sequence: 3,
            suffix: "working-with-temperature".to_string(),
            path: PathBuf::from("/course/02-03-working-with-temperature.md"),
        };
        assert_eq!(
            id.path_with_sequence(4),
            PathBuf::from("/course/02-04-working-with-temperature.md")
        );
    }

    #[test]
    fn test_determine_insertion_unit() {
        let tmp = TempDir::new().expect("Should create temp dir");
        touch(tmp.path(), "01-01-a.md");
        touch(tmp.path(), "01-02-b.md");
        touch(tmp.path(), "02-01-c.md");
        touch(tmp.path(), "02-03-d.md");

        let all = scan_all_lessons(&workspace(&tmp)).expect("Should scan");
        assert_eq!(all.len(), 4);
        assert_eq!(determine_insertion_unit(&all, 2), Some(1));
        assert_eq!(determine_insertion_unit(&all, 3), Some(2));
        assert_eq!(determine_insertion_unit(&all, 4), None);
    }
}
