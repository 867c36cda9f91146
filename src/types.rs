//! Core value types shared by the locator, plan builder and orchestration.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString};

/// Which family of sequenced artifact a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFamily {
    /// `UU-LL-suffix.md` in the working directory
    Lesson,
    /// `UU_LL_suffix.png` in the images directory
    Image,
}

impl ArtifactFamily {
    /// File extension (without the dot) for this family
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Lesson => "md",
            Self::Image => "png",
        }
    }

    /// Separator between unit, sequence and suffix
    pub const fn separator(self) -> char {
        match self {
            Self::Lesson => '-',
            Self::Image => '_',
        }
    }

    /// Build a filename from its parts, zero-padding unit and sequence to two digits
    pub fn file_name(self, unit: u8, sequence: u32, suffix: &str) -> String {
        let sep = self.separator();
        format!(
            "{:02}{sep}{:02}{sep}{}.{}",
            unit,
            sequence,
            suffix,
            self.extension()
        )
    }
}

/// What a renumbering run is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenumberIntent {
    /// Shift every sequence `>= at` up by one, vacating `at`
    Insert { at: u32 },
    /// Compress the unit's sequences into `1..=count`
    CloseGaps,
}

impl RenumberIntent {
    /// Returns true for insertion runs
    pub const fn is_insertion(self) -> bool {
        matches!(self, Self::Insert { .. })
    }
}

impl fmt::Display for RenumberIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert { at } => write!(f, "insert at {:02}", at),
            Self::CloseGaps => write!(f, "close gaps"),
        }
    }
}

/// Smallest accepted unit or insertion point
pub const MIN_NUMBER: u32 = 1;
/// Largest accepted unit or insertion point (two decimal digits)
pub const MAX_NUMBER: u32 = 99;
/// Largest sequence number a lesson or image name may carry
pub const MAX_SEQUENCE: u32 = 999;

/// Parse and range-check a unit identifier (`"2"` and `"02"` are both unit 2)
pub fn parse_unit(s: &str) -> Result<u8, String> {
    let value: u32 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a unit number", s))?;
    if !(MIN_NUMBER..=MAX_NUMBER).contains(&value) {
        return Err(format!(
            "unit must be between {} and {}, got {}",
            MIN_NUMBER, MAX_NUMBER, value
        ));
    }
    Ok(value as u8)
}

/// Parse and range-check an insertion point
pub fn parse_insertion_point(s: &str) -> Result<u32, String> {
    let value: u32 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a lesson number", s))?;
    if !(MIN_NUMBER..=MAX_NUMBER).contains(&value) {
        return Err(format!(
            "insertion point must be between {} and {}, got {}",
            MIN_NUMBER, MAX_NUMBER, value
        ));
    }
    Ok(value)
}
