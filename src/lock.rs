//! Cooperative mutual exclusion over the shared key-value store.
//!
//! The store has no compare-and-swap, so acquisition is optimistic: write a
//! record with a fresh lock id, wait, and check nobody overwrote it. Two
//! writers racing inside the settle window can both lose; they never both win
//! unless one re-reads before the other has written. A holder that crashes
//! is superseded once its record is older than the timeout.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::store::{get_json, set_json, SharedStore};

/// Key under which the single lock record lives.
pub const LOCK_KEY: &str = "syncLock";

/// A lock older than this is considered abandoned.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Pause between writing the record and checking it survived.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// The persisted lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLockRecord {
    /// Who took the lock (e.g. "background", "popup", a device label).
    pub holder: String,
    /// When it was taken, milliseconds since the epoch.
    pub timestamp: i64,
    /// Random id distinguishing this acquisition from any other.
    pub lock_id: String,
}

impl SyncLockRecord {
    /// True once the record is at least `timeout` old.
    pub fn is_expired(&self, now_ms: i64, timeout: Duration) -> bool {
        now_ms - self.timestamp >= timeout.as_millis() as i64
    }
}

/// Storage-based mutex shared by every context and device using the store.
pub struct SyncLock {
    store: SharedStore,
    timeout: Duration,
    settle_delay: Duration,
}

impl SyncLock {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            timeout: DEFAULT_LOCK_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Tries to take the lock for `holder`. Returns `false` on contention.
    pub async fn acquire(&self, holder: &str) -> SyncResult<bool> {
        let now = chrono::Utc::now().timestamp_millis();

        if let Some(existing) = get_json::<SyncLockRecord>(self.store.as_ref(), LOCK_KEY).await? {
            if !existing.is_expired(now, self.timeout) {
                log::debug!(
                    "Sync lock held by '{}' since {}ms ago",
                    existing.holder,
                    now - existing.timestamp
                );
                return Ok(false);
            }
            log::warn!(
                "Superseding expired sync lock held by '{}'",
                existing.holder
            );
        }

        let record = SyncLockRecord {
            holder: holder.to_string(),
            timestamp: now,
            lock_id: Uuid::new_v4().to_string(),
        };
        set_json(self.store.as_ref(), LOCK_KEY, &record).await?;

        tokio::time::sleep(self.settle_delay).await;

        let confirmed = get_json::<SyncLockRecord>(self.store.as_ref(), LOCK_KEY)
            .await?
            .map(|current| current.lock_id == record.lock_id)
            .unwrap_or(false);

        if confirmed {
            log::debug!("Sync lock acquired by '{}'", holder);
        } else {
            log::info!("Lost sync lock race for '{}'", holder);
        }
        Ok(confirmed)
    }

    /// Releases the lock if `holder` owns it. Returns whether anything was removed.
    pub async fn release(&self, holder: &str) -> SyncResult<bool> {
        match get_json::<SyncLockRecord>(self.store.as_ref(), LOCK_KEY).await? {
            Some(existing) if existing.holder == holder => {
                self.store.remove(LOCK_KEY).await?;
                log::debug!("Sync lock released by '{}'", holder);
                Ok(true)
            }
            Some(existing) => {
                log::warn!(
                    "Not releasing sync lock owned by '{}' on behalf of '{}'",
                    existing.holder,
                    holder
                );
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// The current, unexpired lock record.
    pub async fn current(&self) -> SyncResult<Option<SyncLockRecord>> {
        let now = chrono::Utc::now().timestamp_millis();
        Ok(get_json::<SyncLockRecord>(self.store.as_ref(), LOCK_KEY)
            .await?
            .filter(|record| !record.is_expired(now, self.timeout)))
    }

    pub async fn is_locked(&self) -> SyncResult<bool> {
        Ok(self.current().await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    fn lock_on(store: &SharedStore) -> SyncLock {
        SyncLock::new(store.clone()).with_settle_delay(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let lock = lock_on(&store);

        assert!(lock.acquire("a").await.unwrap());
        assert!(lock.is_locked().await.unwrap());
        assert!(!lock.acquire("b").await.unwrap());

        assert!(!lock.release("b").await.unwrap());
        assert!(lock.is_locked().await.unwrap());

        assert!(lock.release("a").await.unwrap());
        assert!(!lock.is_locked().await.unwrap());
        assert!(lock.acquire("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lock_is_superseded() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let stale = SyncLockRecord {
            holder: "crashed".into(),
            timestamp: chrono::Utc::now().timestamp_millis() - 61_000,
            lock_id: "old".into(),
        };
        set_json(store.as_ref(), LOCK_KEY, &stale).await.unwrap();

        let lock = lock_on(&store);
        assert!(!lock.is_locked().await.unwrap());
        assert!(lock.acquire("fresh").await.unwrap());
        assert_eq!(lock.current().await.unwrap().unwrap().holder, "fresh");
    }

    /// Pauses on every access so racing acquirers interleave between their
    /// read and their write.
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl KeyValueStore for SlowStore {
        async fn get(&self, key: &str) -> SyncResult<Option<serde_json::Value>> {
            tokio::time::sleep(self.delay).await;
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: serde_json::Value) -> SyncResult<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> SyncResult<()> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_acquires_never_both_win() {
        for _ in 0..20 {
            let store: SharedStore = Arc::new(SlowStore {
                inner: MemoryStore::new(),
                delay: Duration::from_millis(5),
            });
            let a = lock_on(&store);
            let b = lock_on(&store);

            // Both reads see no lock before either record is written.
            let (got_a, got_b) = tokio::join!(a.acquire("a"), b.acquire("b"));
            let (got_a, got_b) = (got_a.unwrap(), got_b.unwrap());
            assert!(!(got_a && got_b), "both contexts acquired the lock");
            assert!(got_a || got_b, "neither context acquired the lock");

            let holder = lock_on(&store).current().await.unwrap().unwrap().holder;
            assert_eq!(holder, if got_a { "a" } else { "b" });
        }
    }
}
