//! Sync command handlers
//!
//! Push, pull, smart sync, status and the long-running watch mode.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use inquire::Select;

use crate::repository::RestoreMode;
use crate::settings::SyncSettings;
use crate::sync::{SyncAction, SyncEngine, SyncOutcome, Trigger};

use super::{build_engine, is_interactive};

fn print_outcome(outcome: &SyncOutcome) -> Result<()> {
    if outcome.success {
        println!("{} {}", "✓".green(), outcome.message);
        return Ok(());
    }
    match outcome.action {
        SyncAction::Failed => bail!("{}", outcome.message),
        _ => {
            println!("{} {}", "!".yellow(), outcome.message.yellow());
            Ok(())
        }
    }
}

/// Handle push command
///
/// `force` makes this a manual push: a newer remote backup is overwritten
/// and the tree is uploaded even when nothing changed.
pub async fn handle_push(force: bool) -> Result<()> {
    let engine = build_engine(&SyncSettings::load()?)?;
    println!("{}", "Pushing bookmarks...".cyan().bold());

    let trigger = if force { Trigger::Manual } else { Trigger::Auto };
    let outcome = engine.push(trigger).await;
    if outcome.action == SyncAction::Blocked {
        println!("  Run {} or {} to overwrite.", "bookmark-sync pull".cyan(), "bookmark-sync push --force".cyan());
    }
    print_outcome(&outcome)
}

/// Handle pull command
pub async fn handle_pull(merge: bool) -> Result<()> {
    let engine = build_engine(&SyncSettings::load()?)?;
    let mode = if merge { RestoreMode::Merge } else { RestoreMode::Overwrite };
    println!("{} ({} mode)", "Pulling bookmarks...".cyan().bold(), mode.as_str());

    print_outcome(&engine.pull(mode).await)
}

/// Handle sync command
///
/// On the first sync against a server that already has bookmarks, asks
/// which direction to take when running interactively.
pub async fn handle_sync() -> Result<()> {
    let engine = build_engine(&SyncSettings::load()?)?;
    println!("{}", "Syncing bookmarks...".cyan().bold());

    let outcome = engine.smart_sync(Trigger::Manual).await;
    if outcome.action != SyncAction::NeedsManualChoice {
        return print_outcome(&outcome);
    }

    println!("{} {}", "!".yellow(), outcome.message.yellow());
    if !is_interactive() {
        println!(
            "  Run {}, {} or {} to choose.",
            "bookmark-sync pull".cyan(),
            "bookmark-sync pull --merge".cyan(),
            "bookmark-sync push --force".cyan()
        );
        return Ok(());
    }

    resolve_first_sync(&engine).await
}

async fn resolve_first_sync(engine: &SyncEngine) -> Result<()> {
    let options = vec![
        "Merge: add the server's bookmarks to mine",
        "Pull: replace my bookmarks with the server's",
        "Push: replace the server's bookmarks with mine",
        "Cancel",
    ];
    let choice = Select::new("How should this device join?", options.clone())
        .with_help_message("A snapshot of your bookmarks is taken first either way")
        .prompt()
        .context("Failed to get selection")?;

    let outcome = if choice == options[0] {
        engine.pull(RestoreMode::Merge).await
    } else if choice == options[1] {
        engine.pull(RestoreMode::Overwrite).await
    } else if choice == options[2] {
        engine.push(Trigger::Manual).await
    } else {
        println!("{}", "Sync cancelled.".yellow());
        return Ok(());
    };
    print_outcome(&outcome)
}

/// Handle status command
pub async fn handle_status(json: bool) -> Result<()> {
    let engine = build_engine(&SyncSettings::load()?)?;
    let status = engine.status().await.context("Failed to read sync status")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Sync Status".cyan().bold());
    println!("{}", "=".repeat(80).cyan());
    println!("  {}: {}", "Server".cyan(), status.endpoint);
    println!(
        "  {}: {}",
        "Connection".cyan(),
        if status.online { "online".green() } else { "offline".red() }
    );

    match &status.latest {
        Some(latest) => {
            println!("  {}: {}", "Latest backup".cyan(), latest);
            println!(
                "  {}: {} by {} ({} bookmarks, revision {})",
                "Written".cyan(),
                latest.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                latest.replica_label,
                latest.bookmark_count,
                latest.revision
            );
        }
        None if status.online => println!("  {}: none", "Latest backup".cyan()),
        None => {}
    }
    println!("  {}: {}", "Backups on server".cyan(), status.backup_count);

    let last_sync = if status.last_sync_time == 0 {
        "never".to_string()
    } else {
        chrono::DateTime::<chrono::Utc>::from_timestamp_millis(status.last_sync_time)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| status.last_sync_time.to_string())
    };
    println!("  {}: {}", "Last sync".cyan(), last_sync);

    if status.remote_is_newer() {
        println!("  {}", "The server has changes this device has not pulled yet.".yellow());
    }
    if let Some(lock) = &status.lock {
        println!("  {}: held by {}", "Lock".cyan(), lock.holder.yellow());
    }

    Ok(())
}

/// Handle watch command: sync periodically until interrupted
pub async fn handle_watch() -> Result<()> {
    let settings = SyncSettings::load()?;
    let engine = build_engine(&settings)?;

    println!(
        "{} every {}s (Ctrl+C to stop)",
        "Watching bookmarks,".cyan().bold(),
        settings.auto_sync_interval_secs
    );

    let first = engine.smart_sync(Trigger::Auto).await;
    if let Err(e) = print_outcome(&first) {
        log::warn!("Initial sync failed: {}", e);
    }

    let handle = settings.auto_sync().spawn(engine);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    println!("\n{}", "Stopping...".cyan());
    handle.shutdown().await;
    Ok(())
}
