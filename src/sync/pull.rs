use crate::error::{SyncError, SyncResult};
use crate::history::{OperationRecord, OperationType};
use crate::repository::RestoreMode;

use super::{SyncAction, SyncEngine, SyncOutcome};

impl SyncEngine {
    /// Downloads the newest backup and applies it to the local tree.
    pub(super) async fn run_pull(&self, mode: RestoreMode) -> SyncResult<SyncOutcome> {
        let endpoint = self.endpoint().to_string();
        let Some((record, remote)) = self.backups.read_latest().await? else {
            return Err(SyncError::RemoteNotFound(format!(
                "no backups in {}",
                self.backups.settings().directory
            )));
        };
        remote.root()?;

        let local = self.repository.tree().get_tree().await?;
        let snapshot_id = self.take_snapshot(&local, "before pull")?;

        log::info!("Applying backup {} ({} mode)", record, mode.as_str());
        let stats = self.repository.restore(&remote, mode).await?;
        self.state
            .set_last_sync_time(&endpoint, OperationType::Pull, record.timestamp_millis())
            .await?;

        let action = match mode {
            RestoreMode::Overwrite => SyncAction::Pulled,
            RestoreMode::Merge => SyncAction::Merged,
        };
        let message = format!("Applied backup {}: {}", record, stats);
        if stats.failed > 0 {
            log::warn!("{} item(s) could not be applied", stats.failed);
        }

        self.record_history(
            OperationRecord::new(OperationType::Pull, &endpoint, action.as_str(), &message)
                .with_bookmark_count(record.bookmark_count)
                .with_snapshot(snapshot_id),
        );
        Ok(SyncOutcome::done(action, message))
    }
}
