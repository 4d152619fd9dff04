//! Push, pull and smart sync.
//!
//! Every strategy follows the same frame: check connectivity, take the
//! shared sync lock, run, release the lock on every exit path, and report a
//! [`SyncOutcome`] instead of an error. The engine is `Send + Sync` and is
//! shared between the CLI and the auto-sync scheduler behind an `Arc`.

mod pull;
mod push;
mod smart;
mod status;

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::backup::{BackupSettings, BackupStore, ListingCache, DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_LISTING_TTL};
use crate::error::{SyncError, SyncResult};
use crate::history::{OperationHistory, OperationRecord, OperationType, MAX_HISTORY_SIZE};
use crate::lock::{SyncLock, DEFAULT_LOCK_TIMEOUT, DEFAULT_SETTLE_DELAY};
use crate::remote::RemoteStorage;
use crate::repository::Repository;
use crate::snapshot::SnapshotStore;
use crate::state::SyncStateStore;
use crate::store::SharedStore;
use crate::tree::{BookmarkTree, TreeNode};

pub use status::SyncStatus;

/// Who asked for a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Scheduler or change notification. Never overwrites newer remote data.
    Auto,
    /// Explicit user request. May overwrite a newer remote backup and
    /// re-uploads even when nothing changed.
    Manual,
}

/// Observable engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncPhase {
    Idle,
    Checking,
    Syncing,
    Success,
    Error,
    NeedsManualChoice,
}

/// What a strategy ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncAction {
    Pushed,
    Pulled,
    Merged,
    Skipped,
    Restored,
    /// First sync against a server that already has data.
    NeedsManualChoice,
    /// Auto push refused because the remote is newer.
    Blocked,
    Failed,
}

impl SyncAction {
    pub fn as_str(&self) -> &str {
        match self {
            SyncAction::Pushed => "pushed",
            SyncAction::Pulled => "pulled",
            SyncAction::Merged => "merged",
            SyncAction::Skipped => "skipped",
            SyncAction::Restored => "restored",
            SyncAction::NeedsManualChoice => "needs-manual-choice",
            SyncAction::Blocked => "blocked",
            SyncAction::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a strategy run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub success: bool,
    pub action: SyncAction,
    pub message: String,
    /// Set when `action` is [`SyncAction::Failed`].
    pub error: Option<SyncError>,
}

impl SyncOutcome {
    pub fn done(action: SyncAction, message: impl Into<String>) -> Self {
        Self {
            success: true,
            action,
            message: message.into(),
            error: None,
        }
    }

    /// A run that stopped without error but did not sync.
    pub fn declined(action: SyncAction, message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::done(action, message)
        }
    }

    pub fn failed(error: SyncError) -> Self {
        Self {
            success: false,
            action: SyncAction::Failed,
            message: error.user_message(),
            error: Some(error),
        }
    }
}

/// Tunables of a [`SyncEngine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Identifies this context in the sync lock.
    pub holder: String,
    pub backup: BackupSettings,
    pub lock_timeout: Duration,
    pub lock_settle_delay: Duration,
    pub listing_ttl: Duration,
    pub download_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            holder: uuid::Uuid::new_v4().to_string(),
            backup: BackupSettings::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            lock_settle_delay: DEFAULT_SETTLE_DELAY,
            listing_ttl: DEFAULT_LISTING_TTL,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }
}

pub struct SyncEngine {
    repository: Repository,
    remote: Arc<dyn RemoteStorage>,
    backups: BackupStore,
    lock: SyncLock,
    state: SyncStateStore,
    snapshots: Option<SnapshotStore>,
    history: Option<(PathBuf, usize)>,
    holder: String,
    phase: Mutex<SyncPhase>,
}

impl SyncEngine {
    /// # Arguments
    /// * `store` - Durable key-value store shared by every device context
    /// * `session` - Optional short-lived store for the listing cache
    pub fn new(
        tree: Arc<dyn BookmarkTree>,
        remote: Arc<dyn RemoteStorage>,
        store: SharedStore,
        session: Option<SharedStore>,
        options: EngineOptions,
    ) -> Self {
        let cache = ListingCache::new(session, options.listing_ttl);
        let backups = BackupStore::new(remote.clone(), options.backup, cache, options.download_timeout);
        let repository = Repository::new(tree, backups.replica_label());
        let lock = SyncLock::new(store.clone())
            .with_timeout(options.lock_timeout)
            .with_settle_delay(options.lock_settle_delay);

        Self {
            repository,
            remote,
            backups,
            lock,
            state: SyncStateStore::new(store),
            snapshots: None,
            history: None,
            holder: options.holder,
            phase: Mutex::new(SyncPhase::Idle),
        }
    }

    /// Take a safety-net snapshot before every local mutation.
    pub fn with_snapshots(mut self, snapshots: SnapshotStore) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Record operations in the history file at `path`.
    pub fn with_history(mut self, path: &Path, limit: usize) -> Self {
        self.history = Some((path.to_path_buf(), limit));
        self
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock()
    }

    pub fn endpoint(&self) -> &str {
        self.remote.endpoint()
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn snapshots(&self) -> Option<&SnapshotStore> {
        self.snapshots.as_ref()
    }

    pub fn sync_state(&self) -> &SyncStateStore {
        &self.state
    }

    /// Uploads the local tree.
    pub async fn push(&self, trigger: Trigger) -> SyncOutcome {
        if let Err(outcome) = self.begin(true).await {
            return outcome;
        }
        let result = self.run_push(trigger, false).await;
        self.finish(OperationType::Push, result).await
    }

    /// Applies the newest remote backup.
    pub async fn pull(&self, mode: crate::repository::RestoreMode) -> SyncOutcome {
        if let Err(outcome) = self.begin(true).await {
            return outcome;
        }
        let result = self.run_pull(mode).await;
        self.finish(OperationType::Pull, result).await
    }

    /// Picks push, pull or nothing.
    pub async fn smart_sync(&self, trigger: Trigger) -> SyncOutcome {
        if let Err(outcome) = self.begin(true).await {
            return outcome;
        }
        let result = self.run_smart(trigger).await;
        self.finish(OperationType::Push, result).await
    }

    /// Rolls the local tree back to a safety-net snapshot. Works offline.
    pub async fn restore_snapshot(&self, id: &str) -> SyncOutcome {
        if let Err(outcome) = self.begin(false).await {
            return outcome;
        }
        let result = self.run_restore(id).await;
        self.finish(OperationType::Restore, result).await
    }

    async fn begin(&self, require_online: bool) -> Result<(), SyncOutcome> {
        self.set_phase(SyncPhase::Checking);

        if require_online && !self.remote.is_online().await {
            self.set_phase(SyncPhase::Error);
            return Err(SyncOutcome::failed(SyncError::Offline(format!(
                "{} is unreachable",
                self.remote.endpoint()
            ))));
        }

        match self.lock.acquire(&self.holder).await {
            Ok(true) => {
                self.set_phase(SyncPhase::Syncing);
                Ok(())
            }
            Ok(false) => {
                log::info!("Sync lock is held elsewhere, not syncing");
                self.set_phase(SyncPhase::Error);
                Err(SyncOutcome::failed(SyncError::LockContention))
            }
            Err(e) => {
                self.set_phase(SyncPhase::Error);
                Err(SyncOutcome::failed(e))
            }
        }
    }

    async fn finish(&self, operation: OperationType, result: SyncResult<SyncOutcome>) -> SyncOutcome {
        if let Err(e) = self.lock.release(&self.holder).await {
            log::warn!("Failed to release sync lock: {}", e);
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("{} failed: {}", operation.as_str(), e);
                self.record_history(
                    OperationRecord::new(operation, self.endpoint(), SyncAction::Failed.as_str(), &e.user_message())
                        .failed(),
                );
                SyncOutcome::failed(e)
            }
        };

        self.set_phase(match outcome.action {
            SyncAction::NeedsManualChoice => SyncPhase::NeedsManualChoice,
            _ if outcome.success => SyncPhase::Success,
            SyncAction::Blocked => SyncPhase::Idle,
            _ => SyncPhase::Error,
        });
        outcome
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.lock() = phase;
    }

    /// Saves `tree` as a safety-net snapshot, if snapshots are enabled.
    fn take_snapshot(&self, tree: &TreeNode, reason: &str) -> SyncResult<Option<String>> {
        match &self.snapshots {
            Some(snapshots) => Ok(Some(snapshots.create(tree, reason)?.id)),
            None => Ok(None),
        }
    }

    fn record_history(&self, record: OperationRecord) {
        let Some((path, limit)) = &self.history else {
            return;
        };
        let result = OperationHistory::from_path(Some(path.clone())).and_then(|history| {
            let mut history = history.with_limit(*limit);
            history.add_operation(record)
        });
        if let Err(e) = result {
            log::warn!("Failed to record operation history: {:#}", e);
        }
    }

    async fn run_restore(&self, id: &str) -> SyncResult<SyncOutcome> {
        let snapshots = self
            .snapshots
            .as_ref()
            .ok_or_else(|| SyncError::Config("snapshots are not enabled".into()))?;
        let target = snapshots.load(id)?;

        let local = self.repository.tree().get_tree().await?;
        let safety = self.take_snapshot(&local, "before restore")?;
        let stats = self.repository.restore_tree(&target.tree).await?;

        let message = format!(
            "Restored snapshot {} from {} ({})",
            target.id,
            target.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            stats
        );
        self.record_history(
            OperationRecord::new(OperationType::Restore, self.endpoint(), SyncAction::Restored.as_str(), &message)
                .with_bookmark_count(target.count)
                .with_snapshot(safety),
        );
        Ok(SyncOutcome::done(SyncAction::Restored, message))
    }
}

/// Default history size when none is configured.
pub const DEFAULT_HISTORY_LIMIT: usize = MAX_HISTORY_SIZE;

/// True if any system root holds at least one node.
fn has_content(root: &TreeNode) -> bool {
    root.children().iter().any(|system_root| !system_root.children().is_empty())
}
