use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backup::BackupSettings;
use crate::scheduler::AutoSync;
use crate::sync::EngineOptions;
use crate::tree::ReplicaKind;

/// Environment variable that overrides the stored WebDAV password
pub const PASSWORD_ENV: &str = "BOOKMARK_SYNC_PASSWORD";

/// User settings, persisted as `config.toml`
///
/// Every field has a default, so a partial file (or none at all) loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// WebDAV endpoint, e.g. `https://cloud.example/remote.php/dav/files/alice`
    #[serde(default)]
    pub webdav_url: String,

    #[serde(default)]
    pub username: String,

    /// Prefer the `BOOKMARK_SYNC_PASSWORD` environment variable over storing this
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,

    /// Collection holding the backups, relative to `webdav_url`
    #[serde(default = "default_remote_directory")]
    pub remote_directory: String,

    /// Name of this device in backup file names
    #[serde(default = "default_replica_label")]
    pub replica_label: String,

    #[serde(default)]
    pub replica_kind: ReplicaKind,

    /// Local bookmark tree file; defaults to `bookmarks.json` in the config directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_file: Option<PathBuf>,

    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    #[serde(default = "default_lock_settle_delay_ms")]
    pub lock_settle_delay_ms: u64,

    #[serde(default = "default_backup_window_secs")]
    pub backup_window_secs: u64,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_listing_ttl_secs")]
    pub listing_ttl_secs: u64,

    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: usize,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_auto_sync_interval_secs")]
    pub auto_sync_interval_secs: u64,

    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,

    /// Gzip backups before upload
    #[serde(default = "default_true")]
    pub compress: bool,
}

fn default_remote_directory() -> String {
    "bookmarks".to_string()
}

fn default_replica_label() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "default".to_string())
}

fn default_lock_timeout_secs() -> u64 {
    60
}

fn default_lock_settle_delay_ms() -> u64 {
    200
}

fn default_backup_window_secs() -> u64 {
    60
}

fn default_retention_days() -> u32 {
    3
}

fn default_listing_ttl_secs() -> u64 {
    300
}

fn default_download_timeout_secs() -> u64 {
    30
}

fn default_snapshot_limit() -> usize {
    crate::snapshot::DEFAULT_SNAPSHOT_LIMIT
}

fn default_history_limit() -> usize {
    crate::history::MAX_HISTORY_SIZE
}

fn default_auto_sync_interval_secs() -> u64 {
    15 * 60
}

fn default_debounce_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            webdav_url: String::new(),
            username: String::new(),
            password: String::new(),
            remote_directory: default_remote_directory(),
            replica_label: default_replica_label(),
            replica_kind: ReplicaKind::default(),
            tree_file: None,
            lock_timeout_secs: default_lock_timeout_secs(),
            lock_settle_delay_ms: default_lock_settle_delay_ms(),
            backup_window_secs: default_backup_window_secs(),
            retention_days: default_retention_days(),
            listing_ttl_secs: default_listing_ttl_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            snapshot_limit: default_snapshot_limit(),
            history_limit: default_history_limit(),
            auto_sync_interval_secs: default_auto_sync_interval_secs(),
            debounce_secs: default_debounce_secs(),
            compress: true,
        }
    }
}

impl SyncSettings {
    /// Load settings from the default location, applying environment overrides
    pub fn load() -> Result<Self> {
        Ok(Self::load_from(&Self::settings_path()?)?.with_env_overrides())
    }

    /// Load settings from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: SyncSettings = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(settings)
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn settings_path() -> Result<PathBuf> {
        crate::config::ConfigManager::settings_path()
    }

    /// Replaces the password with `BOOKMARK_SYNC_PASSWORD` when it is set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            if !password.is_empty() {
                self.password = password;
            }
        }
        self
    }

    /// True once a WebDAV endpoint has been configured
    pub fn is_configured(&self) -> bool {
        !self.webdav_url.trim().is_empty()
    }

    /// Checks the settings needed to talk to the server
    pub fn validate(&self) -> Result<()> {
        if !self.is_configured() {
            bail!("No WebDAV URL configured. Run `bookmark-sync init` first.");
        }
        if !(self.webdav_url.starts_with("http://") || self.webdav_url.starts_with("https://")) {
            bail!("WebDAV URL must start with http:// or https://: {}", self.webdav_url);
        }
        if self.remote_directory.trim_matches('/').is_empty() {
            bail!("Remote directory must not be empty");
        }
        Ok(())
    }

    /// Local tree file, falling back to the config directory
    pub fn tree_path(&self) -> Result<PathBuf> {
        match &self.tree_file {
            Some(path) => Ok(path.clone()),
            None => crate::config::ConfigManager::tree_path(),
        }
    }

    pub fn backup_settings(&self) -> BackupSettings {
        BackupSettings {
            directory: self.remote_directory.trim_matches('/').to_string(),
            replica_label: self.replica_label.clone(),
            backup_window: Duration::from_secs(self.backup_window_secs),
            retention_days: self.retention_days,
            compress: self.compress,
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            holder: format!("{}-{}", self.replica_label, std::process::id()),
            backup: self.backup_settings(),
            lock_timeout: Duration::from_secs(self.lock_timeout_secs),
            lock_settle_delay: Duration::from_millis(self.lock_settle_delay_ms),
            listing_ttl: Duration::from_secs(self.listing_ttl_secs),
            download_timeout: Duration::from_secs(self.download_timeout_secs),
        }
    }

    pub fn auto_sync(&self) -> AutoSync {
        AutoSync::new(
            Duration::from_secs(self.auto_sync_interval_secs),
            Duration::from_secs(self.debounce_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = SyncSettings::default();
        assert!(!settings.is_configured());
        assert_eq!(settings.remote_directory, "bookmarks");
        assert_eq!(settings.retention_days, 3);
        assert_eq!(settings.backup_window_secs, 60);
        assert!(settings.compress);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: SyncSettings = toml::from_str(
            r#"
webdav_url = "https://dav.example/files"
replica_kind = "firefox"
retention_days = 7
"#,
        )
        .unwrap();

        assert_eq!(settings.replica_kind, ReplicaKind::Firefox);
        assert_eq!(settings.retention_days, 7);
        assert_eq!(settings.listing_ttl_secs, 300);
        assert_eq!(settings.lock_settle_delay_ms, 200);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let settings = SyncSettings {
            webdav_url: "https://dav.example".to_string(),
            username: "alice".to_string(),
            replica_label: "laptop".to_string(),
            ..SyncSettings::default()
        };
        settings.save_to(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("password"));
        assert_eq!(SyncSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let settings = SyncSettings {
            webdav_url: "ftp://dav.example".to_string(),
            ..SyncSettings::default()
        };
        assert!(settings.validate().is_err());
        assert!(SyncSettings::default().validate().is_err());
    }

    #[test]
    #[serial]
    fn test_password_env_override() {
        std::env::set_var(PASSWORD_ENV, "s3cret");
        let settings = SyncSettings {
            password: "stored".to_string(),
            ..SyncSettings::default()
        }
        .with_env_overrides();
        std::env::remove_var(PASSWORD_ENV);

        assert_eq!(settings.password, "s3cret");
    }

    #[test]
    fn test_engine_options_follow_settings() {
        let settings = SyncSettings {
            remote_directory: "/sync/bookmarks/".to_string(),
            backup_window_secs: 10,
            lock_settle_delay_ms: 5,
            ..SyncSettings::default()
        };
        let options = settings.engine_options();
        assert_eq!(options.backup.directory, "sync/bookmarks");
        assert_eq!(options.backup.backup_window, Duration::from_secs(10));
        assert_eq!(options.lock_settle_delay, Duration::from_millis(5));
    }
}
