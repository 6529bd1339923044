//! Configuration for macrorec
//!
//! Persists the small amount of state the recorder core and its embedding
//! presentation layer share between runs:
//!
//! - the stop hotkey that ends a capture session
//! - where macro files live
//! - countdown lengths the embedding UI shows before capture/playback start
//!
//! # Data location
//!
//! Configuration is stored in the platform-appropriate config directory under
//! `macrorec/config.json`:
//!
//! - **Linux**: `~/.config/macrorec/`
//! - **macOS**: `~/Library/Application Support/macrorec/`
//! - **Windows**: `%APPDATA%\macrorec\`
//!
//! Macro files default to `<data dir>/macrorec/macros/`, one JSON file per
//! macro, unless `macros_dir` overrides it.

use crate::error::{MacroError, Result};
use crate::types::NamedKey;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config/data directories
pub const APP_ID: &str = "macrorec";

/// Config filename inside the config directory
pub const CONFIG_FILE: &str = "config.json";

/// File extension for persisted macros
pub const MACRO_FILE_EXTENSION: &str = "json";

/// Persistent application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Key that stops an active capture session; filtered out of recordings
    #[serde(default = "default_stop_key")]
    pub stop_key: NamedKey,

    /// Directory holding macro files; `None` uses the platform data dir
    #[serde(default)]
    pub macros_dir: Option<PathBuf>,

    /// Seconds the embedding UI counts down before capture starts
    #[serde(default = "default_countdown")]
    pub capture_countdown_secs: u32,

    /// Seconds the embedding UI counts down before playback starts
    #[serde(default = "default_countdown")]
    pub playback_countdown_secs: u32,
}

fn default_stop_key() -> NamedKey {
    NamedKey::F12
}

fn default_countdown() -> u32 {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stop_key: default_stop_key(),
            macros_dir: None,
            capture_countdown_secs: default_countdown(),
            playback_countdown_secs: default_countdown(),
        }
    }
}

impl AppConfig {
    /// Platform-appropriate path of the config file
    pub fn default_config_path() -> Result<PathBuf> {
        let dir = dirs_next::config_dir()
            .ok_or_else(|| MacroError::Config("no config directory on this platform".into()))?;
        Ok(dir.join(APP_ID).join(CONFIG_FILE))
    }

    /// Load the config from the default location, falling back to defaults
    /// when the file does not exist or cannot be parsed
    pub fn load_or_default() -> Self {
        match Self::default_config_path().and_then(|p| Self::load(&p)) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("using default config: {}", e);
                Self::default()
            }
        }
    }

    /// Load the config from a specific path
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| MacroError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Save the config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path()?)
    }

    /// Save the config to a specific path, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| MacroError::Config(format!("failed to encode config: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Directory where macro files are stored
    pub fn macros_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.macros_dir {
            return dir.clone();
        }
        dirs_next::data_dir()
            .map(|d| d.join(APP_ID).join("macros"))
            .unwrap_or_else(|| PathBuf::from("macros"))
    }

    /// Macros directory, created on demand
    pub fn ensure_macros_dir(&self) -> Result<PathBuf> {
        let dir = self.macros_dir();
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}
