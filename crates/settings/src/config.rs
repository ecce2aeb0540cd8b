//! Settings file

use std::path::{Path, PathBuf};

use pocket_core::Configuration;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{default_config_dir, default_settings_path, expand_path, Result, SettingsError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Runtime limits and timings
    #[serde(default)]
    pub configuration: Configuration,

    /// Starting dispatcher URLs
    #[serde(default)]
    pub dispatchers: Vec<String>,

    /// Durable key-value store for dispatchers and sessions.
    /// `None` keeps everything in memory.
    #[serde(default = "default_store_path")]
    pub store_path: Option<String>,

    /// Reload persisted sessions on startup
    #[serde(default = "default_true")]
    pub restore_sessions: bool,

    /// Custom settings file path (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_store_path() -> Option<String> {
    Some(default_config_dir().join("store.json").display().to_string())
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            configuration: Configuration::default(),
            dispatchers: Vec::new(),
            store_path: default_store_path(),
            restore_sessions: true,
            config_path: None,
        }
    }
}

impl Settings {
    /// Load settings from the default path, or create defaults
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&default_settings_path())
    }

    /// Load settings from a specific path, or create defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let mut settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            settings.config_path = Some(path.to_path_buf());
            info!("Loaded settings from {:?}", path);
            Ok(settings)
        } else {
            Ok(Self {
                config_path: Some(path.to_path_buf()),
                ..Self::default()
            })
        }
    }

    /// Save settings to the path they were loaded from
    pub fn save(&self) -> Result<()> {
        let path = self.config_path.clone().unwrap_or_else(default_settings_path);
        self.save_to(&path)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::ParseError)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Parsed dispatcher URLs
    pub fn dispatcher_urls(&self) -> Result<Vec<Url>> {
        self.dispatchers
            .iter()
            .map(|raw| {
                Url::parse(raw.trim()).map_err(|e| SettingsError::InvalidDispatcher {
                    url: raw.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// Store location with `~` expanded
    pub fn store_path(&self) -> Option<PathBuf> {
        self.store_path
            .as_deref()
            .map(|p| expand_path(Path::new(p)))
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
