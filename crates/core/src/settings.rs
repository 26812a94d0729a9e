//! User-tunable analysis settings.
//!
//! Read from `thrd.toml` at the workspace root, or from the editor's
//! `thrdLanguageServer` configuration section.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;

/// Settings file looked up at the workspace root.
pub const FILE_NAME: &str = "thrd.toml";

/// Configuration section name used by editors.
pub const EDITOR_SECTION: &str = "thrdLanguageServer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(alias = "maxNumberOfProblems")]
    pub max_number_of_problems: usize,
    pub lint: LintSettings,
    pub refresh: RefreshSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LintSettings {
    pub whitespace: bool,
    #[serde(alias = "indentWidth")]
    pub indent_width: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    #[serde(alias = "initialDelayMs")]
    pub initial_delay_ms: u64,
    #[serde(alias = "repeatDelayMs")]
    pub repeat_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_number_of_problems: 1000,
            lint: LintSettings::default(),
            refresh: RefreshSettings::default(),
        }
    }
}

impl Default for LintSettings {
    fn default() -> Self {
        LintSettings {
            whitespace: true,
            indent_width: 4,
        }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        RefreshSettings {
            initial_delay_ms: 20,
            repeat_delay_ms: 500,
        }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Settings, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load `thrd.toml` from `root`. A missing file yields the defaults.
    pub fn load(root: &Path) -> Result<Settings, Error> {
        let path = root.join(FILE_NAME);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Settings::default());
            }
            Err(source) => return Err(Error::Io { path, source }),
        };
        Settings::from_toml_str(&text).map_err(|source| Error::Settings { path, source })
    }

    /// Read settings from an editor configuration payload.
    ///
    /// Accepts either the whole settings object or just the
    /// `thrdLanguageServer` section.
    pub fn from_editor_json(value: &serde_json::Value) -> Result<Settings, serde_json::Error> {
        let section = value.get(EDITOR_SECTION).unwrap_or(value);
        Settings::deserialize(section)
    }
}
