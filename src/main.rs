use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use bookmark_sync::handlers::{self, ConfigUpdate, InitArgs};
use bookmark_sync::logger;
use bookmark_sync::tree::ReplicaKind;

#[derive(Parser)]
#[command(name = "bookmark-sync")]
#[command(about = "Keep bookmark trees consistent across browsers through a WebDAV server", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the WebDAV server and this device
    Init {
        /// WebDAV endpoint URL
        #[arg(long)]
        url: Option<String>,

        #[arg(short, long)]
        username: Option<String>,

        /// Prefer the BOOKMARK_SYNC_PASSWORD environment variable
        #[arg(long)]
        password: Option<String>,

        /// Name of this device in backup file names
        #[arg(long)]
        label: Option<String>,

        /// Browser family of the local tree: chromium or firefox
        #[arg(long)]
        kind: Option<ReplicaKind>,

        /// Local bookmark tree file
        #[arg(long)]
        tree_file: Option<PathBuf>,

        /// Remote collection holding the backups
        #[arg(long)]
        remote_directory: Option<String>,
    },

    /// Upload the local bookmarks to the server
    Push {
        /// Overwrite a newer server backup and upload even when unchanged
        #[arg(short, long)]
        force: bool,
    },

    /// Replace the local bookmarks with the latest server backup
    Pull {
        /// Add the server's bookmarks instead of replacing the local tree
        #[arg(short, long)]
        merge: bool,
    },

    /// Pull or push, whichever side is behind
    Sync,

    /// Show server, backup and lock status
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync periodically and on local changes until interrupted
    Watch,

    /// Manage local safety-net snapshots
    Snapshots {
        #[command(subcommand)]
        action: SnapshotAction,
    },

    /// View or clear the operation history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Configure sync settings
    Config {
        #[arg(long)]
        set_url: Option<String>,

        #[arg(long)]
        set_username: Option<String>,

        #[arg(long)]
        set_remote_directory: Option<String>,

        #[arg(long)]
        set_label: Option<String>,

        #[arg(long)]
        set_kind: Option<ReplicaKind>,

        /// Days to keep backups that are not the newest
        #[arg(long)]
        set_retention_days: Option<u32>,

        /// Seconds within which a device's backups replace each other
        #[arg(long)]
        set_backup_window: Option<u64>,

        /// Seconds between automatic syncs in watch mode
        #[arg(long)]
        set_interval: Option<u64>,

        /// Gzip backups before upload
        #[arg(long)]
        set_compress: Option<bool>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// List snapshots, newest first
    List,

    /// Restore the local tree from a snapshot
    Restore {
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete old snapshots
    Clean {
        /// Number of newest snapshots to keep
        #[arg(long, default_value_t = 0)]
        keep: usize,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List recent operations
    List {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Clear all history
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = logger::init_logger() {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let cli = Cli::parse();

    let needs_setup = !matches!(cli.command, Commands::Init { .. } | Commands::Config { .. });
    if needs_setup && !handlers::is_initialized()? {
        println!(
            "{} Run {} first.",
            "Not configured.".yellow(),
            "bookmark-sync init".cyan()
        );
        return Ok(());
    }

    match cli.command {
        Commands::Init {
            url,
            username,
            password,
            label,
            kind,
            tree_file,
            remote_directory,
        } => {
            handlers::handle_init(InitArgs {
                url,
                username,
                password,
                replica_label: label,
                kind,
                tree_file,
                remote_directory,
            })
            .await?;
        }
        Commands::Push { force } => {
            handlers::handle_push(force).await?;
        }
        Commands::Pull { merge } => {
            handlers::handle_pull(merge).await?;
        }
        Commands::Sync => {
            handlers::handle_sync().await?;
        }
        Commands::Status { json } => {
            handlers::handle_status(json).await?;
        }
        Commands::Watch => {
            handlers::handle_watch().await?;
        }
        Commands::Snapshots { action } => match action {
            SnapshotAction::List => handlers::handle_snapshots_list()?,
            SnapshotAction::Restore { id, yes } => {
                handlers::handle_snapshots_restore(&id, yes).await?;
            }
            SnapshotAction::Clean { keep } => handlers::handle_snapshots_clean(keep)?,
        },
        Commands::History { action } => match action {
            HistoryAction::List { limit } => handlers::handle_history_list(limit)?,
            HistoryAction::Clear { yes } => handlers::handle_history_clear(yes)?,
        },
        Commands::Config {
            set_url,
            set_username,
            set_remote_directory,
            set_label,
            set_kind,
            set_retention_days,
            set_backup_window,
            set_interval,
            set_compress,
            show,
        } => {
            if show {
                handlers::handle_config_show()?;
            } else {
                handlers::handle_config_update(ConfigUpdate {
                    webdav_url: set_url,
                    username: set_username,
                    remote_directory: set_remote_directory,
                    replica_label: set_label,
                    replica_kind: set_kind,
                    retention_days: set_retention_days,
                    backup_window_secs: set_backup_window,
                    auto_sync_interval_secs: set_interval,
                    compress: set_compress,
                })?;
            }
        }
    }

    Ok(())
}
