use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "bookmark-sync";

/// Cross-platform configuration directory manager
pub struct ConfigManager;

impl ConfigManager {
    /// Get the main configuration directory path following platform conventions:
    /// - Linux: $XDG_CONFIG_HOME/bookmark-sync or ~/.config/bookmark-sync
    /// - macOS: ~/Library/Application Support/bookmark-sync
    /// - Windows: %APPDATA%\bookmark-sync
    pub fn config_dir() -> Result<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
                Ok(PathBuf::from(xdg_config).join(APP_DIR))
            } else {
                let home = dirs::home_dir().context("Failed to get home directory")?;
                Ok(home.join(".config").join(APP_DIR))
            }
        }

        #[cfg(target_os = "macos")]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join("Library").join("Application Support").join(APP_DIR))
        }

        #[cfg(target_os = "windows")]
        {
            Ok(dirs::config_dir()
                .context("Failed to get Windows config directory")?
                .join(APP_DIR))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join(format!(".{APP_DIR}")))
        }
    }

    /// Get the settings file path (config.toml)
    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Durable key-value store holding the sync lock and sync state
    pub fn store_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("store.json"))
    }

    /// Session store holding the backup listing cache
    pub fn session_store_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("session.json"))
    }

    /// Default location of the local bookmark tree file
    pub fn tree_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("bookmarks.json"))
    }

    /// Get the operation history file path
    pub fn operation_history_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("operation-history.json"))
    }

    /// Get the snapshots directory path
    pub fn snapshots_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("snapshots"))
    }

    /// Get the log file path
    pub fn log_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("bookmark-sync.log"))
    }

    /// Ensure the configuration directory exists
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
        Ok(config_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_paths() {
        let config_dir = ConfigManager::config_dir().unwrap();
        assert!(config_dir.to_string_lossy().contains("bookmark-sync"));

        let settings = ConfigManager::settings_path().unwrap();
        assert!(settings.to_string_lossy().ends_with("config.toml"));

        let store = ConfigManager::store_path().unwrap();
        assert!(store.to_string_lossy().ends_with("store.json"));

        let history_path = ConfigManager::operation_history_path().unwrap();
        assert!(history_path.to_string_lossy().contains("operation-history.json"));

        let snapshots = ConfigManager::snapshots_dir().unwrap();
        assert!(snapshots.starts_with(&config_dir));

        let log = ConfigManager::log_file_path().unwrap();
        assert!(log.to_string_lossy().contains("bookmark-sync.log"));
    }

    #[test]
    #[serial]
    #[cfg(target_os = "linux")]
    fn test_xdg_config_home_respected() {
        let previous = std::env::var("XDG_CONFIG_HOME").ok();
        std::env::set_var("XDG_CONFIG_HOME", "/tmp/test-xdg-config");
        let config_dir = ConfigManager::config_dir().unwrap();
        assert_eq!(config_dir, PathBuf::from("/tmp/test-xdg-config/bookmark-sync"));
        match previous {
            Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }
}
