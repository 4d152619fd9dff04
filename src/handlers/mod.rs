//! Command handler modules
//!
//! Everything the `bookmark-sync` binary does beyond argument parsing,
//! organized by functionality area.

pub mod config;
pub mod history;
pub mod init;
pub mod snapshots;
pub mod sync;

use anyhow::{Context, Result};
use std::sync::Arc;

pub use config::{handle_config_show, handle_config_update, ConfigUpdate};
pub use history::{handle_history_clear, handle_history_list};
pub use init::{handle_init, is_initialized, InitArgs};
pub use snapshots::{handle_snapshots_clean, handle_snapshots_list, handle_snapshots_restore};
pub use sync::{handle_pull, handle_push, handle_status, handle_sync, handle_watch};

use crate::config::ConfigManager;
use crate::remote::WebDavClient;
use crate::settings::SyncSettings;
use crate::snapshot::SnapshotStore;
use crate::store::{FileStore, SharedStore};
use crate::sync::SyncEngine;
use crate::tree::FileTree;

/// Check if we're running in an interactive terminal
pub fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout)
}

/// Wires the engine from the saved settings and the config directory
pub fn build_engine(settings: &SyncSettings) -> Result<Arc<SyncEngine>> {
    settings.validate()?;

    let tree_path = settings.tree_path()?;
    let tree = FileTree::load(&tree_path, settings.replica_kind)
        .with_context(|| format!("Failed to load bookmark tree from {}", tree_path.display()))?;
    let remote = WebDavClient::new(&settings.webdav_url, &settings.username, &settings.password)
        .context("Failed to create WebDAV client")?;

    let store: SharedStore = Arc::new(FileStore::new(&ConfigManager::store_path()?));
    let session: SharedStore = Arc::new(FileStore::new(&ConfigManager::session_store_path()?));

    let engine = SyncEngine::new(
        Arc::new(tree),
        Arc::new(remote),
        store,
        Some(session),
        settings.engine_options(),
    )
    .with_snapshots(SnapshotStore::new(&ConfigManager::snapshots_dir()?, settings.snapshot_limit))
    .with_history(&ConfigManager::operation_history_path()?, settings.history_limit);

    Ok(Arc::new(engine))
}
