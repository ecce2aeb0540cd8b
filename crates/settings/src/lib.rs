//! Pocket Settings
//!
//! Client settings file: runtime configuration, starting dispatchers and the
//! location of the durable session store.
//!
//! ## Usage
//!
//! ```no_run
//! use pocket_settings::Settings;
//!
//! let mut settings = Settings::load_or_default()?;
//! settings.configuration.max_sessions = 3;
//! settings.dispatchers.push("https://dispatch-1.example.com".to_string());
//! settings.save()?;
//! # Ok::<(), pocket_settings::SettingsError>(())
//! ```

mod config;
mod paths;

pub use config::Settings;
pub use paths::{default_config_dir, expand_path};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Failed to create config directory: {0}")]
    CreateDirError(std::io::Error),

    #[error("Invalid dispatcher URL '{url}': {reason}")]
    InvalidDispatcher { url: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Get the default settings file path
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.json")
}
