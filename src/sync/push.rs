use crate::error::{SyncError, SyncResult};
use crate::history::{OperationRecord, OperationType};
use crate::tree::compare;

use super::{has_content, SyncAction, SyncEngine, SyncOutcome, Trigger};

impl SyncEngine {
    /// Uploads the local tree unless the remote already matches it.
    ///
    /// `freshness_checked` is set by smart sync once it has decided local
    /// content should win; the newer-remote guard is skipped then.
    pub(super) async fn run_push(&self, trigger: Trigger, freshness_checked: bool) -> SyncResult<SyncOutcome> {
        let local = self.repository.tree().get_tree().await?;
        if !has_content(&local) {
            return Err(SyncError::EmptyLocalTree);
        }

        let endpoint = self.endpoint().to_string();
        let upload = self.repository.create_snapshot_for_upload().await?;
        let latest = self.backups.latest_fresh().await?;

        if let Some(latest) = &latest {
            let last_sync = self.state.last_sync_time(&endpoint).await?;
            if trigger == Trigger::Auto && !freshness_checked && latest.timestamp_millis() > last_sync {
                log::warn!("Remote backup {} is newer than the last sync, not pushing", latest);
                return Ok(SyncOutcome::declined(
                    SyncAction::Blocked,
                    "Remote has newer bookmarks, pull them first",
                ));
            }

            let forced_resync = trigger == Trigger::Manual && latest.replica_label == self.backups.replica_label();
            if !forced_resync {
                match self.backups.read(latest).await {
                    Ok(remote) => {
                        let identical = match (upload.root(), remote.root()) {
                            (Ok(local_root), Ok(remote_root)) => compare(local_root, remote_root),
                            _ => false,
                        };
                        if identical {
                            self.state
                                .set_last_sync_time(&endpoint, OperationType::Push, latest.timestamp_millis())
                                .await?;
                            log::info!("Remote backup {} already matches local bookmarks", latest);
                            return Ok(SyncOutcome::done(
                                SyncAction::Skipped,
                                "Remote backup already matches local bookmarks",
                            ));
                        }
                    }
                    Err(e @ (SyncError::MalformedBackup(_) | SyncError::DecompressionFailure(_))) => {
                        log::warn!("Unreadable remote backup {} will be superseded: {}", latest, e);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let snapshot_id = self.take_snapshot(&local, "before push")?;
        let written = self.backups.write(&upload).await?;
        self.state
            .set_last_sync_time(&endpoint, OperationType::Push, written.record.timestamp_millis())
            .await?;

        let message = match &written.replaced {
            Some(old) => format!(
                "Replaced backup {} with {} ({} bookmarks)",
                old, written.record, upload.metadata.bookmark_count
            ),
            None => format!(
                "Uploaded backup {} ({} bookmarks)",
                written.record, upload.metadata.bookmark_count
            ),
        };
        log::info!("{}", message);

        self.record_history(
            OperationRecord::new(OperationType::Push, &endpoint, SyncAction::Pushed.as_str(), &message)
                .with_bookmark_count(upload.metadata.bookmark_count)
                .with_snapshot(snapshot_id),
        );
        Ok(SyncOutcome::done(SyncAction::Pushed, message))
    }
}
