//! Snapshot command handlers
//!
//! Listing, restoring and cleaning the local safety-net snapshots.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use inquire::Confirm;

use crate::config::ConfigManager;
use crate::settings::SyncSettings;
use crate::snapshot::SnapshotStore;

use super::{build_engine, is_interactive};

fn open_store(settings: &SyncSettings) -> Result<SnapshotStore> {
    Ok(SnapshotStore::new(&ConfigManager::snapshots_dir()?, settings.snapshot_limit))
}

/// Handle snapshots list command
pub fn handle_snapshots_list() -> Result<()> {
    let store = open_store(&SyncSettings::load()?)?;
    let snapshots = store.list().context("Failed to list snapshots")?;

    if snapshots.is_empty() {
        println!("{}", "No snapshots yet.".yellow());
        return Ok(());
    }

    println!("{}", "Snapshots".cyan().bold());
    println!("{}", "=".repeat(80).cyan());
    for snapshot in &snapshots {
        println!(
            "  {}  {}  {:>5} bookmarks  {}",
            snapshot.id.green(),
            snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            snapshot.count,
            snapshot.reason.dimmed()
        );
    }

    Ok(())
}

/// Handle snapshots restore command
pub async fn handle_snapshots_restore(id: &str, yes: bool) -> Result<()> {
    let engine = build_engine(&SyncSettings::load()?)?;

    let snapshots = engine
        .snapshots()
        .context("Snapshots are not enabled")?;
    let target = snapshots
        .load(id)
        .with_context(|| format!("Failed to load snapshot {id}"))?;

    if !yes && is_interactive() {
        println!(
            "Snapshot {} from {} holds {} bookmarks ({}).",
            target.id.green(),
            target.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            target.count,
            target.reason
        );
        let confirm = Confirm::new("Replace your current bookmarks with this snapshot?")
            .with_default(false)
            .with_help_message("Your current bookmarks are snapshotted first")
            .prompt()
            .context("Failed to get confirmation")?;
        if !confirm {
            println!("{}", "Restore cancelled.".yellow());
            return Ok(());
        }
    }

    let outcome = engine.restore_snapshot(id).await;
    if !outcome.success {
        bail!("{}", outcome.message);
    }
    println!("{} {}", "✓".green(), outcome.message);
    Ok(())
}

/// Handle snapshots clean command
///
/// Keeps the `keep` newest snapshots; `0` deletes them all.
pub fn handle_snapshots_clean(keep: usize) -> Result<()> {
    let dir = ConfigManager::snapshots_dir()?;
    let deleted = if keep == 0 {
        SnapshotStore::new(&dir, 1).clear()
    } else {
        SnapshotStore::new(&dir, keep).prune()
    }
    .context("Failed to clean snapshots")?;

    if deleted > 0 {
        println!("{} Deleted {} snapshots", "✓".green(), deleted);
    } else {
        println!("{}", "No snapshots to delete".dimmed());
    }
    Ok(())
}
