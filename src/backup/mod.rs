//! Versioned backups in the remote directory.
//!
//! Every push writes one file named after its own metadata (see
//! [`BackupFileRecord`]). Rapid successive pushes from the same replica
//! replace the newest file instead of piling up, and files older than the
//! retention period are pruned after each genuinely new backup.

mod cache;
mod download;
mod filename;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::error::SyncResult;
use crate::remote::{join_path, RemoteStorage};
use crate::repository::RemoteSnapshot;

pub use cache::{ListingCache, DEFAULT_LISTING_TTL};
pub use download::{gunzip, gzip, DownloadQueue, DEFAULT_DOWNLOAD_TIMEOUT};
pub use filename::{sanitize_label, BackupFileRecord, FILE_PREFIX};

/// Where and how backups are written.
#[derive(Debug, Clone)]
pub struct BackupSettings {
    /// Remote collection holding the backups.
    pub directory: String,
    pub replica_label: String,
    /// Same-replica writes closer together than this replace the newest file.
    pub backup_window: Duration,
    pub retention_days: u32,
    pub compress: bool,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            directory: "bookmarks".to_string(),
            replica_label: "default".to_string(),
            backup_window: Duration::from_secs(60),
            retention_days: 3,
            compress: true,
        }
    }
}

/// Result of [`BackupStore::write`].
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub record: BackupFileRecord,
    /// The file superseded within the backup window, now deleted.
    pub replaced: Option<BackupFileRecord>,
    pub pruned: Vec<BackupFileRecord>,
}

pub struct BackupStore {
    remote: Arc<dyn RemoteStorage>,
    settings: BackupSettings,
    cache: ListingCache,
    downloads: DownloadQueue,
}

impl BackupStore {
    pub fn new(
        remote: Arc<dyn RemoteStorage>,
        settings: BackupSettings,
        cache: ListingCache,
        download_timeout: Duration,
    ) -> Self {
        let downloads = DownloadQueue::new(remote.clone(), download_timeout);
        Self {
            remote,
            settings: BackupSettings {
                replica_label: sanitize_label(&settings.replica_label),
                ..settings
            },
            cache,
            downloads,
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStorage> {
        &self.remote
    }

    pub fn settings(&self) -> &BackupSettings {
        &self.settings
    }

    pub fn replica_label(&self) -> &str {
        &self.settings.replica_label
    }

    /// Creates the backup collection if it is missing.
    pub async fn ensure_directory(&self) -> SyncResult<()> {
        if !self.remote.exists(&self.settings.directory).await? {
            log::info!("Creating remote directory {}", self.settings.directory);
            self.remote.mkcol(&self.settings.directory).await?;
        }
        Ok(())
    }

    /// Backups in the remote directory, newest first. Served from the
    /// listing cache when it is fresh.
    pub async fn list(&self) -> SyncResult<Vec<BackupFileRecord>> {
        let directory = &self.settings.directory;
        let names = match self.cache.get(directory).await {
            Some(names) => {
                log::debug!("Using cached listing of {}", directory);
                names
            }
            None => {
                let names: Vec<String> = self
                    .remote
                    .list(directory)
                    .await?
                    .into_iter()
                    .filter(|entry| !entry.is_collection)
                    .map(|entry| entry.name)
                    .collect();
                self.cache.put(directory, &names).await;
                names
            }
        };

        let mut records: Vec<BackupFileRecord> = names
            .iter()
            .filter_map(|name| match BackupFileRecord::parse(name) {
                Ok(record) => Some(record),
                Err(_) => {
                    log::debug!("Ignoring foreign file {}", name);
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.revision.cmp(&a.revision))
        });
        Ok(records)
    }

    /// Lists the directory, bypassing the cache.
    pub async fn refresh(&self) -> SyncResult<Vec<BackupFileRecord>> {
        self.cache.invalidate().await;
        self.list().await
    }

    pub async fn latest(&self) -> SyncResult<Option<BackupFileRecord>> {
        Ok(self.list().await?.into_iter().next())
    }

    /// Newest backup according to a fresh listing.
    pub async fn latest_fresh(&self) -> SyncResult<Option<BackupFileRecord>> {
        Ok(self.refresh().await?.into_iter().next())
    }

    pub async fn read(&self, record: &BackupFileRecord) -> SyncResult<RemoteSnapshot> {
        let path = join_path(&self.settings.directory, &record.file_name());
        let body = self.downloads.download(&path).await?;
        RemoteSnapshot::from_json(&body)
    }

    /// Newest backup and its content, if any backup exists.
    pub async fn read_latest(&self) -> SyncResult<Option<(BackupFileRecord, RemoteSnapshot)>> {
        match self.latest_fresh().await? {
            Some(record) => {
                let snapshot = self.read(&record).await?;
                Ok(Some((record, snapshot)))
            }
            None => Ok(None),
        }
    }

    /// Uploads `snapshot`, named after its metadata timestamp.
    pub async fn write(&self, snapshot: &RemoteSnapshot) -> SyncResult<WriteOutcome> {
        let now = DateTime::<Utc>::from_timestamp_millis(snapshot.metadata.timestamp).unwrap_or_else(Utc::now);
        let count = snapshot.metadata.bookmark_count;
        let compress = self.settings.compress;

        self.ensure_directory().await?;
        let existing = self.refresh().await?;

        let replaced = existing
            .first()
            .filter(|newest| self.within_window(newest, now))
            .cloned();
        let record = match &replaced {
            Some(newest) => newest.next_revision(now, count, compress),
            None => BackupFileRecord::new(now, &self.settings.replica_label, count, compress),
        };

        let json = snapshot.to_json()?;
        let body = if compress { gzip(&json)? } else { json };
        let path = join_path(&self.settings.directory, &record.file_name());
        self.remote.put(&path, body).await?;
        log::info!("Uploaded backup {}", record);

        if let Some(old) = &replaced {
            let old_path = join_path(&self.settings.directory, &old.file_name());
            match self.remote.delete(&old_path).await {
                Ok(()) => log::info!("Replaced backup {} (within window)", old),
                Err(e) => log::warn!("Failed to delete replaced backup {}: {}", old, e),
            }
        }
        self.cache.invalidate().await;

        let pruned = if replaced.is_none() { self.prune(now).await? } else { Vec::new() };

        Ok(WriteOutcome {
            record,
            replaced,
            pruned,
        })
    }

    fn within_window(&self, newest: &BackupFileRecord, now: DateTime<Utc>) -> bool {
        if newest.replica_label != self.settings.replica_label {
            return false;
        }
        let age = now.signed_duration_since(newest.timestamp);
        match age.to_std() {
            Ok(age) => age < self.settings.backup_window,
            // The newest file claims to be from the future.
            Err(_) => false,
        }
    }

    /// Deletes backups older than the retention period. The newest backup
    /// is always kept.
    pub async fn prune(&self, now: DateTime<Utc>) -> SyncResult<Vec<BackupFileRecord>> {
        let cutoff = now - ChronoDuration::days(i64::from(self.settings.retention_days));
        let records = self.refresh().await?;

        let mut pruned = Vec::new();
        for record in records.iter().skip(1).filter(|r| r.timestamp < cutoff) {
            let path = join_path(&self.settings.directory, &record.file_name());
            match self.remote.delete(&path).await {
                Ok(()) => pruned.push(record.clone()),
                Err(e) => log::warn!("Failed to prune backup {}: {}", record, e),
            }
        }

        if !pruned.is_empty() {
            log::info!("Pruned {} backup(s) older than {} days", pruned.len(), self.settings.retention_days);
            self.cache.invalidate().await;
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use crate::repository::{SnapshotMetadata, CLIENT_VERSION};
    use crate::store::MemoryStore;
    use crate::tree::TreeNode;
    use chrono::TimeZone;

    fn snapshot_at(time: DateTime<Utc>, count: usize) -> RemoteSnapshot {
        RemoteSnapshot {
            metadata: SnapshotMetadata {
                timestamp: time.timestamp_millis(),
                client_version: CLIENT_VERSION.to_string(),
                replica: "laptop".to_string(),
                bookmark_count: count,
            },
            data: vec![TreeNode::folder("").with_children(vec![])],
        }
    }

    fn store_for(remote: &Arc<MemoryRemote>, label: &str) -> BackupStore {
        BackupStore::new(
            remote.clone(),
            BackupSettings {
                replica_label: label.to_string(),
                ..BackupSettings::default()
            },
            ListingCache::new(Some(Arc::new(MemoryStore::new())), DEFAULT_LISTING_TTL),
            DEFAULT_DOWNLOAD_TIMEOUT,
        )
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_writes_compressed_backup_and_reads_it_back() {
        let remote = Arc::new(MemoryRemote::default());
        let store = store_for(&remote, "laptop");

        let outcome = store.write(&snapshot_at(t0(), 3)).await.unwrap();
        assert_eq!(outcome.record.file_name(), "bookmarks_20250602_090000_laptop_3_v1.json.gz");
        assert!(outcome.replaced.is_none());
        assert_eq!(remote.file_names("bookmarks"), vec![outcome.record.file_name()]);

        let (latest, snapshot) = store.read_latest().await.unwrap().unwrap();
        assert_eq!(latest, outcome.record);
        assert_eq!(snapshot.metadata.bookmark_count, 3);
    }

    #[tokio::test]
    async fn test_same_replica_within_window_replaces_newest() {
        let remote = Arc::new(MemoryRemote::default());
        let store = store_for(&remote, "laptop");

        store.write(&snapshot_at(t0(), 3)).await.unwrap();
        let later = t0() + ChronoDuration::seconds(30);
        let outcome = store.write(&snapshot_at(later, 4)).await.unwrap();

        assert_eq!(outcome.record.revision, 2);
        assert_eq!(outcome.record.timestamp, later);
        assert_eq!(outcome.replaced.map(|r| r.revision), Some(1));
        assert_eq!(
            remote.file_names("bookmarks"),
            vec!["bookmarks_20250602_090030_laptop_4_v2.json.gz"]
        );
    }

    #[tokio::test]
    async fn test_other_replica_or_old_file_gets_new_backup() {
        let remote = Arc::new(MemoryRemote::default());
        store_for(&remote, "desktop").write(&snapshot_at(t0(), 3)).await.unwrap();

        let laptop = store_for(&remote, "laptop");
        let outcome = laptop
            .write(&snapshot_at(t0() + ChronoDuration::seconds(10), 3))
            .await
            .unwrap();
        assert!(outcome.replaced.is_none());

        let outcome = laptop
            .write(&snapshot_at(t0() + ChronoDuration::seconds(120), 3))
            .await
            .unwrap();
        assert!(outcome.replaced.is_none());
        assert_eq!(outcome.record.revision, 1);
        assert_eq!(remote.file_names("bookmarks").len(), 3);
    }

    #[tokio::test]
    async fn test_prunes_expired_backups_after_new_file() {
        let remote = Arc::new(MemoryRemote::default());
        let store = store_for(&remote, "laptop");

        store.write(&snapshot_at(t0(), 1)).await.unwrap();
        store
            .write(&snapshot_at(t0() + ChronoDuration::days(1), 2))
            .await
            .unwrap();
        let outcome = store
            .write(&snapshot_at(t0() + ChronoDuration::days(5), 3))
            .await
            .unwrap();

        assert_eq!(outcome.pruned.len(), 2);
        assert_eq!(remote.file_names("bookmarks"), vec![outcome.record.file_name()]);
    }

    #[tokio::test]
    async fn test_prune_never_deletes_newest() {
        let remote = Arc::new(MemoryRemote::default());
        let store = store_for(&remote, "laptop");
        store.write(&snapshot_at(t0(), 1)).await.unwrap();

        let pruned = store.prune(t0() + ChronoDuration::days(30)).await.unwrap();
        assert!(pruned.is_empty());
        assert_eq!(remote.file_names("bookmarks").len(), 1);
    }

    #[tokio::test]
    async fn test_listing_ignores_foreign_files_and_uses_cache() {
        let remote = Arc::new(MemoryRemote::default());
        remote.insert("bookmarks/readme.txt", b"hi".to_vec());
        remote.insert("bookmarks/bookmarks_20250602_090000_a_1_v1.json", b"{}".to_vec());
        let store = store_for(&remote, "laptop");

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);

        remote.insert("bookmarks/bookmarks_20250602_100000_b_1_v1.json", b"{}".to_vec());
        assert_eq!(store.list().await.unwrap().len(), 1);

        let fresh = store.refresh().await.unwrap();
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[0].replica_label, "b");
    }

    #[tokio::test]
    async fn test_empty_directory_has_no_latest() {
        let remote = Arc::new(MemoryRemote::default());
        let store = store_for(&remote, "laptop");
        assert!(store.latest().await.unwrap().is_none());
        assert!(store.read_latest().await.unwrap().is_none());
    }
}
