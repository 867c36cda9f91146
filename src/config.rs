//! Configuration file handling for renumbering runs.
//!
//! The duplicate-detection thresholds, the images directory name and the
//! snapshot prefixes can be tuned from a JSON file instead of being baked in.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tunable settings for a renumbering run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenumberConfig {
    /// Filename similarity above which file contents are compared
    pub name_similarity_threshold: f64,
    /// Content similarity above which two lessons are reported as duplicates
    pub content_similarity_threshold: f64,
    /// Run the duplicate-content heuristic on insertion plans
    pub duplicate_check: bool,
    /// Name of the image directory, relative to the working directory
    pub images_dir: String,
    /// Snapshot directory prefix for insertion runs
    pub insert_backup_prefix: String,
    /// Snapshot directory prefix for gap-closing runs
    pub gap_backup_prefix: String,
}

impl Default for RenumberConfig {
    fn default() -> Self {
        Self {
            name_similarity_threshold: 0.8,
            content_similarity_threshold: 0.5,
            duplicate_check: true,
            images_dir: "images".to_string(),
            insert_backup_prefix: "backup".to_string(),
            gap_backup_prefix: "backup_gaps".to_string(),
        }
    }
}

impl RenumberConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("name_similarity_threshold", self.name_similarity_threshold),
            ("content_similarity_threshold", self.content_similarity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be between 0.0 and 1.0, got {}", name, value);
            }
        }

        let images_dir = self.images_dir.trim();
        if images_dir.is_empty() {
            anyhow::bail!("images_dir must not be empty");
        }
        if images_dir.contains('/') || images_dir.contains('\\') || images_dir == ".." {
            anyhow::bail!("images_dir must be a single directory name, got '{}'", images_dir);
        }

        for (name, prefix) in [
            ("insert_backup_prefix", &self.insert_backup_prefix),
            ("gap_backup_prefix", &self.gap_backup_prefix),
        ] {
            if prefix.trim().is_empty() {
                anyhow::bail!("{} must not be empty", name);
            }
            if prefix.contains('/') || prefix.contains('\\') {
                anyhow::bail!("{} must not contain path separators", name);
            }
        }

        Ok(())
    }
}
