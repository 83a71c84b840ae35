//! Project settings from an optional `specloom.toml`.
//!
//! ```toml
//! [integrity]
//! apps_dir = "apps"
//! parallel = true
//!
//! [logging]
//! level = "warn"
//! ```
//!
//! A missing file yields the defaults; command-line flags override both.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::integrity::DEFAULT_APPS_DIR;

pub const SETTINGS_FILE: &str = "specloom.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub integrity: IntegritySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegritySettings {
    /// Directory under the project root holding application packages.
    pub apps_dir: String,
    /// Probe implementations on multiple threads.
    pub parallel: bool,
}

impl Default for IntegritySettings {
    fn default() -> Self {
        Self {
            apps_dir: DEFAULT_APPS_DIR.to_string(),
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when it doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))
    }

    /// `specloom.toml` in the given directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load(&dir.join(SETTINGS_FILE))
    }
}
