//! Initialization handlers
//!
//! First-time setup: collects the WebDAV endpoint and device identity,
//! saves them to `config.toml` and checks the server can be reached.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use inquire::{Password, Select, Text};
use std::path::PathBuf;

use crate::config::ConfigManager;
use crate::settings::{SyncSettings, PASSWORD_ENV};
use crate::tree::{count_bookmarks, BookmarkTree, FileTree, ReplicaKind};

use super::{build_engine, is_interactive};

/// Arguments to `bookmark-sync init`; anything missing is prompted for
#[derive(Debug, Default, Clone)]
pub struct InitArgs {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub replica_label: Option<String>,
    pub kind: Option<ReplicaKind>,
    pub tree_file: Option<PathBuf>,
    pub remote_directory: Option<String>,
}

/// Check if bookmark-sync has been initialized
pub fn is_initialized() -> Result<bool> {
    let path = ConfigManager::settings_path()?;
    if !path.exists() {
        return Ok(false);
    }
    Ok(SyncSettings::load_from(&path)?.is_configured())
}

fn prompt_text(label: &str, placeholder: &str, default: Option<&str>) -> Result<String> {
    let mut prompt = Text::new(label).with_placeholder(placeholder);
    if let Some(default) = default {
        prompt = prompt.with_default(default);
    }
    prompt.prompt().with_context(|| format!("Failed to get {}", label.trim_end_matches(':')))
}

/// Fills in the settings from `args`, prompting for what is missing
fn collect_settings(args: InitArgs, mut settings: SyncSettings) -> Result<SyncSettings> {
    let interactive = is_interactive();

    settings.webdav_url = match args.url {
        Some(url) => url,
        None if interactive => prompt_text(
            "WebDAV URL:",
            "https://cloud.example.com/remote.php/dav/files/alice",
            (!settings.webdav_url.is_empty()).then_some(settings.webdav_url.as_str()),
        )?,
        None if settings.is_configured() => settings.webdav_url,
        None => bail!("No WebDAV URL given. Pass --url or run interactively."),
    };

    settings.username = match args.username {
        Some(username) => username,
        None if interactive => prompt_text(
            "Username:",
            "alice",
            (!settings.username.is_empty()).then_some(settings.username.as_str()),
        )?,
        None => settings.username,
    };

    if let Some(password) = args.password {
        settings.password = password;
    } else if interactive && std::env::var(PASSWORD_ENV).is_err() {
        settings.password = Password::new("Password:")
            .without_confirmation()
            .with_help_message("Stored in config.toml; set BOOKMARK_SYNC_PASSWORD to keep it out of the file")
            .prompt()
            .context("Failed to get password")?;
    }

    settings.replica_label = match args.replica_label {
        Some(label) => label,
        None if interactive => prompt_text(
            "Device name:",
            "laptop",
            Some(settings.replica_label.as_str()),
        )?,
        None => settings.replica_label,
    };

    settings.replica_kind = match args.kind {
        Some(kind) => kind,
        None if interactive => Select::new(
            "Browser family:",
            vec![ReplicaKind::Chromium, ReplicaKind::Firefox],
        )
        .prompt()
        .context("Failed to get browser family")?,
        None => settings.replica_kind,
    };

    if let Some(directory) = args.remote_directory {
        settings.remote_directory = directory;
    }
    if let Some(tree_file) = args.tree_file {
        settings.tree_file = Some(tree_file);
    }

    settings.validate()?;
    Ok(settings)
}

/// Handle init command
pub async fn handle_init(args: InitArgs) -> Result<()> {
    println!("{}", "Setting up bookmark sync".cyan().bold());

    let path = ConfigManager::settings_path()?;
    let existing = SyncSettings::load_from(&path)?;
    let settings = collect_settings(args, existing)?;

    ConfigManager::ensure_config_dir()?;
    settings.save().context("Failed to save configuration")?;
    println!("{} Saved {}", "✓".green(), path.display());

    let tree_path = settings.tree_path()?;
    let tree = FileTree::load(&tree_path, settings.replica_kind)
        .with_context(|| format!("Failed to create bookmark tree at {}", tree_path.display()))?;
    let local = tree.get_tree().await?;
    println!(
        "{} Local tree: {} ({} bookmarks)",
        "✓".green(),
        tree_path.display(),
        count_bookmarks(&local)
    );

    let engine = build_engine(&settings.with_env_overrides())?;
    if !engine.backups().remote().is_online().await {
        println!(
            "{} Could not reach {}. Settings were saved; sync will start once the server is reachable.",
            "!".yellow(),
            engine.endpoint()
        );
        return Ok(());
    }

    engine
        .backups()
        .ensure_directory()
        .await
        .context("Failed to prepare the remote directory")?;
    println!("{} Connected to {}", "✓".green(), engine.endpoint());

    println!("{}", "✓ Ready to sync!".green().bold());
    println!("  Run {} to synchronize this device.", "bookmark-sync sync".cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_settings_from_args() {
        if is_interactive() {
            return;
        }
        let args = InitArgs {
            url: Some("https://dav.example/files/alice".to_string()),
            username: Some("alice".to_string()),
            password: Some("secret".to_string()),
            replica_label: Some("laptop".to_string()),
            kind: Some(ReplicaKind::Firefox),
            tree_file: None,
            remote_directory: Some("sync".to_string()),
        };

        let settings = collect_settings(args, SyncSettings::default()).unwrap();
        assert_eq!(settings.webdav_url, "https://dav.example/files/alice");
        assert_eq!(settings.replica_kind, ReplicaKind::Firefox);
        assert_eq!(settings.remote_directory, "sync");
        assert_eq!(settings.password, "secret");
    }

    #[test]
    fn test_collect_settings_requires_url() {
        if is_interactive() {
            return;
        }
        assert!(collect_settings(InitArgs::default(), SyncSettings::default()).is_err());
    }
}
