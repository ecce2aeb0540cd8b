//! Platform config locations

use std::path::{Path, PathBuf};

/// Overrides the config directory when set
const CONFIG_DIR_ENV: &str = "POCKET_CONFIG_DIR";

/// Replace a leading `~` with the user's home directory
pub fn expand_path(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}

/// Default config directory for the current platform
///
/// - `$POCKET_CONFIG_DIR` when set
/// - macOS: `~/Library/Application Support/Pocket`
/// - Windows: `%APPDATA%\Pocket`
/// - elsewhere: `$XDG_CONFIG_HOME/pocket` or `~/.config/pocket`
pub fn default_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return expand_path(Path::new(&dir));
    }

    #[cfg(target_os = "macos")]
    {
        home_dir()
            .map(|h| h.join("Library/Application Support/Pocket"))
            .unwrap_or_else(|| PathBuf::from(".pocket"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("Pocket")
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                home_dir()
                    .map(|h| h.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("."))
            })
            .join("pocket")
    }
}
