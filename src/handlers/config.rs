//! Configuration command handlers

use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::ConfigManager;
use crate::settings::SyncSettings;
use crate::tree::ReplicaKind;

/// Values to change with `bookmark-sync config --set-...`
#[derive(Debug, Default, Clone)]
pub struct ConfigUpdate {
    pub webdav_url: Option<String>,
    pub username: Option<String>,
    pub remote_directory: Option<String>,
    pub replica_label: Option<String>,
    pub replica_kind: Option<ReplicaKind>,
    pub retention_days: Option<u32>,
    pub backup_window_secs: Option<u64>,
    pub auto_sync_interval_secs: Option<u64>,
    pub compress: Option<bool>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.webdav_url.is_none()
            && self.username.is_none()
            && self.remote_directory.is_none()
            && self.replica_label.is_none()
            && self.replica_kind.is_none()
            && self.retention_days.is_none()
            && self.backup_window_secs.is_none()
            && self.auto_sync_interval_secs.is_none()
            && self.compress.is_none()
    }

    /// Applies the update, returning a line per changed setting
    pub fn apply(self, settings: &mut SyncSettings) -> Vec<String> {
        let mut changes = Vec::new();

        if let Some(url) = self.webdav_url {
            changes.push(format!("Set WebDAV URL to {url}"));
            settings.webdav_url = url;
        }
        if let Some(username) = self.username {
            changes.push(format!("Set username to {username}"));
            settings.username = username;
        }
        if let Some(directory) = self.remote_directory {
            changes.push(format!("Set remote directory to {directory}"));
            settings.remote_directory = directory;
        }
        if let Some(label) = self.replica_label {
            changes.push(format!("Set replica label to {label}"));
            settings.replica_label = label;
        }
        if let Some(kind) = self.replica_kind {
            changes.push(format!("Set replica kind to {}", kind.as_str()));
            settings.replica_kind = kind;
        }
        if let Some(days) = self.retention_days {
            changes.push(format!("Set retention to {days} days"));
            settings.retention_days = days;
        }
        if let Some(secs) = self.backup_window_secs {
            changes.push(format!("Set backup window to {secs}s"));
            settings.backup_window_secs = secs;
        }
        if let Some(secs) = self.auto_sync_interval_secs {
            changes.push(format!("Set auto-sync interval to {secs}s"));
            settings.auto_sync_interval_secs = secs;
        }
        if let Some(compress) = self.compress {
            changes.push(format!("Set compression to {compress}"));
            settings.compress = compress;
        }

        changes
    }
}

/// Handle config command with `--set-...` flags
pub fn handle_config_update(update: ConfigUpdate) -> Result<()> {
    if update.is_empty() {
        return handle_config_show();
    }

    let mut settings = SyncSettings::load_from(&ConfigManager::settings_path()?)
        .context("Failed to load current configuration")?;
    for change in update.apply(&mut settings) {
        println!("{}", change.green());
    }
    settings.save().context("Failed to save configuration")?;
    println!("\n{} Configuration saved", "✓".green().bold());

    Ok(())
}

/// Handle config --show
pub fn handle_config_show() -> Result<()> {
    let settings = SyncSettings::load()?;
    let path = ConfigManager::settings_path()?;

    println!("{}", "Current Configuration:".bold());
    println!("  {}: {}", "File".cyan(), path.display());
    println!(
        "  {}: {}",
        "WebDAV URL".cyan(),
        if settings.webdav_url.is_empty() { "Not set" } else { settings.webdav_url.as_str() }
    );
    println!("  {}: {}", "Username".cyan(), settings.username);
    println!(
        "  {}: {}",
        "Password".cyan(),
        if settings.password.is_empty() { "Not set" } else { "********" }
    );
    println!("  {}: {}", "Remote directory".cyan(), settings.remote_directory);
    println!(
        "  {}: {} ({})",
        "Replica".cyan(),
        settings.replica_label,
        settings.replica_kind.as_str()
    );
    println!("  {}: {}", "Tree file".cyan(), settings.tree_path()?.display());
    println!("  {}: {}s", "Backup window".cyan(), settings.backup_window_secs);
    println!("  {}: {} days", "Retention".cyan(), settings.retention_days);
    println!("  {}: {}s", "Auto-sync interval".cyan(), settings.auto_sync_interval_secs);
    println!("  {}: {}s", "Debounce".cyan(), settings.debounce_secs);
    println!("  {}: {}", "Compression".cyan(), settings.compress);
    println!("  {}: {}", "Snapshots kept".cyan(), settings.snapshot_limit);

    Ok(())
}
