//! Last-sync bookkeeping, scoped to the configured remote endpoint.

use serde::{Deserialize, Serialize};

use crate::error::SyncResult;
use crate::history::OperationType;
use crate::store::{get_json, set_json, SharedStore};

/// Key under which the sync state record lives.
pub const SYNC_STATE_KEY: &str = "syncState";

/// When this device last completed a sync, and against which endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStateRecord {
    /// Completion time, milliseconds since the epoch.
    pub time: i64,
    pub endpoint_url: String,
    /// Direction of the sync that produced this record.
    pub kind: OperationType,
}

/// Reads and writes [`SyncStateRecord`] in the durable store.
///
/// A record written for a different endpoint is ignored, so switching
/// servers makes this device look like it has never synced.
pub struct SyncStateStore {
    store: SharedStore,
}

impl SyncStateStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// The record for `endpoint`, if any.
    pub async fn record(&self, endpoint: &str) -> SyncResult<Option<SyncStateRecord>> {
        Ok(get_json::<SyncStateRecord>(self.store.as_ref(), SYNC_STATE_KEY)
            .await?
            .filter(|record| record.endpoint_url == endpoint))
    }

    /// Last sync time against `endpoint` in milliseconds, or 0 for never.
    pub async fn last_sync_time(&self, endpoint: &str) -> SyncResult<i64> {
        Ok(self.record(endpoint).await?.map(|r| r.time).unwrap_or(0))
    }

    pub async fn set_last_sync_time(&self, endpoint: &str, kind: OperationType, time: i64) -> SyncResult<()> {
        let record = SyncStateRecord {
            time,
            endpoint_url: endpoint.to_string(),
            kind,
        };
        log::debug!("Recording {} sync at {} for {}", kind.as_str(), time, endpoint);
        set_json(self.store.as_ref(), SYNC_STATE_KEY, &record).await
    }

    pub async fn clear(&self) -> SyncResult<()> {
        self.store.remove(SYNC_STATE_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_never_synced_is_zero() {
        let state = SyncStateStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(state.last_sync_time("https://dav.example/").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_record_is_scoped_to_endpoint() {
        let state = SyncStateStore::new(Arc::new(MemoryStore::new()));
        state
            .set_last_sync_time("https://a.example/dav", OperationType::Push, 1_700_000_000_000)
            .await
            .unwrap();

        assert_eq!(
            state.last_sync_time("https://a.example/dav").await.unwrap(),
            1_700_000_000_000
        );
        assert_eq!(state.last_sync_time("https://b.example/dav").await.unwrap(), 0);

        let record = state.record("https://a.example/dav").await.unwrap().unwrap();
        assert_eq!(record.kind, OperationType::Push);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let state = SyncStateStore::new(Arc::new(MemoryStore::new()));
        state.set_last_sync_time("e", OperationType::Push, 1).await.unwrap();
        state.set_last_sync_time("e", OperationType::Pull, 2).await.unwrap();
        let record = state.record("e").await.unwrap().unwrap();
        assert_eq!((record.time, record.kind), (2, OperationType::Pull));

        state.clear().await.unwrap();
        assert!(state.record("e").await.unwrap().is_none());
    }
}
