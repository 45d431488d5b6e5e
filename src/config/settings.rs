//! User settings file (`~/.kestrel/settings.toml`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::KestrelError;

/// Values read from the settings file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: Option<String>,
    pub max_tools: Option<usize>,
    pub optional_essentials_enabled: Option<bool>,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    pub request_timeout_ms: Option<u64>,
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, KestrelError> {
        let raw = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(KestrelError::Io(err)),
        };
        toml::from_str(&raw).map_err(|e| {
            KestrelError::Configuration(format!("invalid settings file {}: {e}", path.display()))
        })
    }

    /// Write settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), KestrelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string(self)
            .map_err(|e| KestrelError::Configuration(format!("cannot serialize settings: {e}")))?;
        fs::write(path, serialized)?;
        Ok(())
    }
}

/// `~/.kestrel/settings.toml`, or `.kestrel/settings.toml` without a home dir.
pub fn default_settings_path() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".kestrel"))
        .unwrap_or_else(|| PathBuf::from(".kestrel"))
        .join("settings.toml")
}
