use crate::error::{SyncError, SyncResult};
use crate::history::OperationType;
use crate::repository::{RemoteSnapshot, RestoreMode};
use crate::tree::compare;

use super::{has_content, SyncAction, SyncEngine, SyncOutcome, Trigger};

impl SyncEngine {
    /// Decides between push, pull and doing nothing.
    ///
    /// Never touches either side on the first sync against a server that
    /// already holds bookmarks; the user has to pick a direction.
    pub(super) async fn run_smart(&self, trigger: Trigger) -> SyncResult<SyncOutcome> {
        let endpoint = self.endpoint().to_string();

        let Some(latest) = self.backups.latest_fresh().await? else {
            log::info!("No remote backup yet, pushing");
            return self.run_push(trigger, true).await;
        };

        let remote: Option<RemoteSnapshot> = match self.backups.read(&latest).await {
            Ok(remote) => Some(remote),
            Err(e @ (SyncError::MalformedBackup(_) | SyncError::DecompressionFailure(_))) => {
                log::warn!("Ignoring unreadable remote backup {}: {}", latest, e);
                None
            }
            Err(e) => return Err(e),
        };
        let remote_root = remote.as_ref().and_then(|snapshot| snapshot.root().ok());

        let upload = self.repository.create_snapshot_for_upload().await?;
        if let (Some(remote_root), Ok(local_root)) = (remote_root, upload.root()) {
            if compare(local_root, remote_root) {
                self.state
                    .set_last_sync_time(&endpoint, OperationType::Push, latest.timestamp_millis())
                    .await?;
                return Ok(SyncOutcome::done(SyncAction::Skipped, "Already in sync"));
            }
        }

        if !remote_root.is_some_and(has_content) {
            log::info!("Remote backup {} holds no bookmarks, pushing", latest);
            return self.run_push(trigger, true).await;
        }

        let last_sync = self.state.last_sync_time(&endpoint).await?;
        if last_sync == 0 {
            log::info!("First sync against {}, waiting for a manual choice", endpoint);
            return Ok(SyncOutcome::declined(
                SyncAction::NeedsManualChoice,
                "The server already has bookmarks: choose whether to push, pull or merge",
            ));
        }

        if latest.timestamp_millis() > last_sync {
            log::info!("Remote backup {} is newer than the last sync, pulling", latest);
            self.run_pull(RestoreMode::Overwrite).await
        } else {
            log::info!("Local bookmarks changed since the last sync, pushing");
            self.run_push(trigger, true).await
        }
    }
}
