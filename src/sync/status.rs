use serde::Serialize;

use crate::backup::BackupFileRecord;
use crate::error::SyncResult;
use crate::lock::SyncLockRecord;

use super::{SyncEngine, SyncPhase};

/// Snapshot of what this device knows about the remote, built from the
/// directory listing alone.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub endpoint: String,
    pub online: bool,
    pub backup_count: usize,
    #[serde(skip)]
    pub latest: Option<BackupFileRecord>,
    /// Milliseconds since the epoch, 0 if this endpoint was never synced.
    pub last_sync_time: i64,
    pub lock: Option<SyncLockRecord>,
    pub phase: SyncPhase,
}

impl SyncStatus {
    /// True if the newest backup was written after the last sync.
    pub fn remote_is_newer(&self) -> bool {
        self.latest
            .as_ref()
            .is_some_and(|latest| latest.timestamp_millis() > self.last_sync_time)
    }
}

impl SyncEngine {
    pub async fn status(&self) -> SyncResult<SyncStatus> {
        let endpoint = self.endpoint().to_string();
        let online = self.remote.is_online().await;

        let backups = if online { self.backups.list().await? } else { Vec::new() };
        let last_sync_time = self.state.last_sync_time(&endpoint).await?;
        let lock = self.lock.current().await?;

        Ok(SyncStatus {
            endpoint,
            online,
            backup_count: backups.len(),
            latest: backups.into_iter().next(),
            last_sync_time,
            lock,
            phase: self.phase(),
        })
    }
}
