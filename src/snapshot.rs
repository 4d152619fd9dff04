//! Local safety-net snapshots.
//!
//! A copy of the whole local tree is written to disk before every operation
//! that mutates it (push, pull, snapshot restore), so a bad sync can always be
//! rolled back with `bookmark-sync snapshots restore <id>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::tree::{count_bookmarks, TreeNode};

/// Snapshots kept when no limit is configured.
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 5;

/// The local tree at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Full tree, including local ids.
    pub tree: TreeNode,
    /// What the snapshot was taken for, e.g. "before pull".
    pub reason: String,
    /// Number of bookmarks in `tree`.
    pub count: usize,
}

/// Directory of snapshot files, one `<id>.json` per snapshot.
pub struct SnapshotStore {
    dir: PathBuf,
    limit: usize,
}

impl SnapshotStore {
    /// # Arguments
    /// * `dir` - Directory holding the snapshot files, created on first write
    /// * `limit` - Number of snapshots kept; older ones are evicted first
    pub fn new(dir: &Path, limit: usize) -> Self {
        Self {
            dir: dir.to_path_buf(),
            limit: limit.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saves `tree` as a new snapshot and evicts the oldest ones over the limit.
    pub fn create(&self, tree: &TreeNode, reason: &str) -> SyncResult<Snapshot> {
        let snapshot = Snapshot {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            tree: tree.clone(),
            reason: reason.to_string(),
            count: count_bookmarks(tree),
        };

        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(self.path_for(&snapshot.id), json)?;
        log::info!(
            "Created snapshot {} ({} bookmarks, {})",
            snapshot.id,
            snapshot.count,
            reason
        );

        self.prune()?;
        Ok(snapshot)
    }

    /// All readable snapshots, newest first.
    pub fn list(&self) -> SyncResult<Vec<Snapshot>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            match read_snapshot(&path) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => log::warn!("Skipping unreadable snapshot {}: {}", path.display(), e),
            }
        }

        snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(snapshots)
    }

    pub fn load(&self, id: &str) -> SyncResult<Snapshot> {
        if Uuid::parse_str(id).is_err() {
            return Err(SyncError::Config(format!("invalid snapshot id: {id}")));
        }
        let path = self.path_for(id);
        if !path.exists() {
            return Err(SyncError::Io(format!("snapshot {id} not found")));
        }
        read_snapshot(&path)
    }

    /// Deletes snapshots beyond the retention limit.
    ///
    /// # Returns
    /// Number of snapshots deleted
    pub fn prune(&self) -> SyncResult<usize> {
        let snapshots = self.list()?;
        let mut removed = 0;
        for old in snapshots.iter().skip(self.limit) {
            fs::remove_file(self.path_for(&old.id))?;
            log::debug!("Evicted snapshot {}", old.id);
            removed += 1;
        }
        Ok(removed)
    }

    pub fn clear(&self) -> SyncResult<usize> {
        let snapshots = self.list()?;
        for snapshot in &snapshots {
            fs::remove_file(self.path_for(&snapshot.id))?;
        }
        Ok(snapshots.len())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

fn read_snapshot(path: &Path) -> SyncResult<Snapshot> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
