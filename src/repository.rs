//! Whole-tree backup creation and restore.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{SyncError, SyncResult};
use crate::reconcile::{ReconcileStats, Reconciler};
use crate::tree::index::path_label;
use crate::tree::{
    assign_hashes, count_bookmarks, find_matching_root, BookmarkTree, CanonicalRole, GlobalIndex,
    TreeNode,
};

/// Version string stamped into every uploaded backup.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header of a [`RemoteSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Creation time, milliseconds since the epoch.
    pub timestamp: i64,
    pub client_version: String,
    #[serde(default)]
    pub replica: String,
    #[serde(default)]
    pub bookmark_count: usize,
}

/// The document stored in a remote backup file.
///
/// `data` holds a single element: the minimized, hash-stamped top root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub metadata: SnapshotMetadata,
    pub data: Vec<TreeNode>,
}

impl RemoteSnapshot {
    /// The top root, or `MalformedBackup` if it or its children are missing.
    pub fn root(&self) -> SyncResult<&TreeNode> {
        let root = self
            .data
            .first()
            .ok_or_else(|| SyncError::MalformedBackup("backup contains no root".into()))?;
        if root.children.is_none() {
            return Err(SyncError::MalformedBackup("backup root has no children".into()));
        }
        Ok(root)
    }

    pub fn from_json(bytes: &[u8]) -> SyncResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| SyncError::MalformedBackup(e.to_string()))
    }

    pub fn to_json(&self) -> SyncResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// How a restore treats local content absent from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreMode {
    /// Local tree becomes an exact copy of the source.
    #[default]
    Overwrite,
    /// Missing items are added; nothing is moved or deleted.
    Merge,
}

impl RestoreMode {
    pub fn as_str(&self) -> &str {
        match self {
            RestoreMode::Overwrite => "overwrite",
            RestoreMode::Merge => "merge",
        }
    }
}

/// Reads the local tree for upload and writes remote content back into it.
pub struct Repository {
    tree: Arc<dyn BookmarkTree>,
    replica: String,
}

impl Repository {
    /// `replica` is the label recorded in uploaded metadata.
    pub fn new(tree: Arc<dyn BookmarkTree>, replica: &str) -> Self {
        Self {
            tree,
            replica: replica.to_string(),
        }
    }

    pub fn tree(&self) -> &Arc<dyn BookmarkTree> {
        &self.tree
    }

    /// Reads the local tree and packs it in wire form.
    pub async fn create_snapshot_for_upload(&self) -> SyncResult<RemoteSnapshot> {
        let local = self.tree.get_tree().await?;
        let minimized = assign_hashes(&local);
        let bookmark_count = count_bookmarks(&minimized);

        log::debug!("Packed {} bookmarks for upload", bookmark_count);

        Ok(RemoteSnapshot {
            metadata: SnapshotMetadata {
                timestamp: chrono::Utc::now().timestamp_millis(),
                client_version: CLIENT_VERSION.to_string(),
                replica: self.replica.clone(),
                bookmark_count,
            },
            data: vec![minimized],
        })
    }

    /// Applies a downloaded backup to the local tree.
    pub async fn restore(&self, snapshot: &RemoteSnapshot, mode: RestoreMode) -> SyncResult<ReconcileStats> {
        let root = snapshot.root()?;
        self.apply(root, mode).await
    }

    /// Makes the local tree match `tree`, e.g. a local safety-net snapshot.
    pub async fn restore_tree(&self, tree: &TreeNode) -> SyncResult<ReconcileStats> {
        if tree.children.is_none() {
            return Err(SyncError::MalformedBackup("snapshot root has no children".into()));
        }
        self.apply(&assign_hashes(tree), RestoreMode::Overwrite).await
    }

    async fn apply(&self, remote_root: &TreeNode, mode: RestoreMode) -> SyncResult<ReconcileStats> {
        let local = self.tree.get_tree().await?;
        let index = GlobalIndex::build(&local);
        let mut reconciler = Reconciler::new(self.tree.as_ref(), &index);

        for remote in remote_root.children() {
            if CanonicalRole::of(remote).is_none() {
                log::debug!("Skipping unmapped root '{}'", remote.title);
                continue;
            }
            let Some(local_root) = find_matching_root(remote, local.children()) else {
                log::debug!("No local counterpart for root '{}'", remote.title);
                continue;
            };
            let Some(local_id) = local_root.id.as_deref() else {
                continue;
            };

            match mode {
                RestoreMode::Overwrite => {
                    let label = path_label(local_root);
                    reconciler.reconcile(local_id, remote.children(), &label).await?
                }
                RestoreMode::Merge => reconciler.merge(local_id, remote.children()).await?,
            }
        }

        let stats = reconciler.stats();
        log::info!("Restore ({}) finished: {}", mode.as_str(), stats);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{compare, MemoryTree, ReplicaKind};

    fn chromium_with(children: Vec<TreeNode>) -> Arc<MemoryTree> {
        Arc::new(MemoryTree::from_tree(&TreeNode::folder("").with_id("0").with_children(vec![
            TreeNode::folder("Bookmarks bar")
                .with_id("1")
                .with_role("bookmarks-bar")
                .with_children(children),
            TreeNode::folder("Other bookmarks")
                .with_id("2")
                .with_role("other")
                .with_children(vec![TreeNode::bookmark("O", "https://o.example")]),
        ])))
    }

    #[tokio::test]
    async fn test_upload_snapshot_is_minimized() {
        let tree = chromium_with(vec![TreeNode::bookmark("A", "https://a.com").with_id("10")]);
        let repository = Repository::new(tree, "laptop");

        let snapshot = repository.create_snapshot_for_upload().await.unwrap();
        assert_eq!(snapshot.metadata.bookmark_count, 2);
        assert_eq!(snapshot.metadata.replica, "laptop");
        assert_eq!(snapshot.metadata.client_version, CLIENT_VERSION);

        let root = snapshot.root().unwrap();
        assert!(root.children()[0].children()[0].id.is_none());
        assert!(root.children()[0].children()[0].content_hash.is_some());

        let json = snapshot.to_json().unwrap();
        assert_eq!(RemoteSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_restores_chromium_backup_into_firefox() {
        let source = chromium_with(vec![
            TreeNode::bookmark("A", "https://a.com"),
            TreeNode::folder("Work").with_children(vec![TreeNode::bookmark("B", "https://b.com")]),
        ]);
        let snapshot = Repository::new(source, "chrome")
            .create_snapshot_for_upload()
            .await
            .unwrap();

        let firefox = Arc::new(MemoryTree::new(ReplicaKind::Firefox));
        let repository = Repository::new(firefox.clone(), "firefox");
        let stats = repository.restore(&snapshot, RestoreMode::Overwrite).await.unwrap();

        assert_eq!(stats.created, 4);
        assert!(compare(&firefox.snapshot(), snapshot.root().unwrap()));

        let toolbar = firefox.find_by_title("Bookmarks Toolbar").unwrap();
        assert_eq!(toolbar.children().len(), 2);
    }

    #[tokio::test]
    async fn test_unmapped_roots_are_left_alone() {
        let firefox = Arc::new(MemoryTree::new(ReplicaKind::Firefox));
        let remote_root = TreeNode::folder("").with_children(vec![TreeNode::folder("Bookmarks Menu")
            .with_role("menu________")
            .with_children(vec![TreeNode::bookmark("M", "https://m.example")])]);
        let snapshot = RemoteSnapshot {
            metadata: SnapshotMetadata {
                timestamp: 0,
                client_version: CLIENT_VERSION.into(),
                replica: "other-firefox".into(),
                bookmark_count: 1,
            },
            data: vec![assign_hashes(&remote_root)],
        };

        let stats = Repository::new(firefox.clone(), "ff")
            .restore(&snapshot, RestoreMode::Overwrite)
            .await
            .unwrap();
        assert!(stats.is_noop());
        assert_eq!(firefox.mutations().total(), 0);
    }

    #[tokio::test]
    async fn test_merge_keeps_local_only_content() {
        let local = chromium_with(vec![TreeNode::bookmark("Mine", "https://mine.example")]);
        let remote = chromium_with(vec![TreeNode::bookmark("Theirs", "https://theirs.example")]);
        let snapshot = Repository::new(remote, "r").create_snapshot_for_upload().await.unwrap();

        let stats = Repository::new(local.clone(), "l")
            .restore(&snapshot, RestoreMode::Merge)
            .await
            .unwrap();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.removed, 0);

        let bar = local.find_by_title("Bookmarks bar").unwrap();
        let titles: Vec<_> = bar.children().iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Mine", "Theirs"]);
    }

    #[tokio::test]
    async fn test_rejects_malformed_backups() {
        let tree = Arc::new(MemoryTree::new(ReplicaKind::Chromium));
        let repository = Repository::new(tree, "x");

        let empty = RemoteSnapshot {
            metadata: SnapshotMetadata {
                timestamp: 0,
                client_version: CLIENT_VERSION.into(),
                replica: String::new(),
                bookmark_count: 0,
            },
            data: vec![],
        };
        assert!(matches!(
            repository.restore(&empty, RestoreMode::Overwrite).await,
            Err(SyncError::MalformedBackup(_))
        ));

        let childless = RemoteSnapshot {
            data: vec![TreeNode::bookmark("not a root", "https://x.example")],
            ..empty
        };
        assert!(matches!(
            repository.restore(&childless, RestoreMode::Overwrite).await,
            Err(SyncError::MalformedBackup(_))
        ));

        assert!(matches!(
            RemoteSnapshot::from_json(b"{\"nope\": true}"),
            Err(SyncError::MalformedBackup(_))
        ));
    }
}
