//! Per-folder reconciliation of a local subtree onto a remote one.
//!
//! Overwrite mode runs three phases for every folder: remote children are
//! upserted in order (matching existing local nodes where possible, moving or
//! renaming them as needed), folders recurse, then whatever local child was
//! not claimed is deleted. Merge mode only ever creates.
//!
//! A node that was matched once in a run is "claimed" and never matched
//! again, so duplicates on the remote side produce duplicates locally in the
//! same order. Failures on one node are logged and counted; the rest of the
//! batch still runs.

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{SyncError, SyncResult};
use crate::tree::{
    content_hash, is_system_root, normalize_url, BookmarkTree, CreateDetails, Destination,
    GlobalIndex, Location, NodeChanges, NodeId, TreeNode,
};

/// What a reconciliation run did to the local tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub moved: usize,
    pub removed: usize,
    /// Nodes that could not be processed.
    pub failed: usize,
}

impl ReconcileStats {
    /// Number of successful mutations.
    pub fn mutations(&self) -> usize {
        self.created + self.updated + self.moved + self.removed
    }

    pub fn is_noop(&self) -> bool {
        self.mutations() == 0 && self.failed == 0
    }

    pub fn absorb(&mut self, other: ReconcileStats) {
        self.created += other.created;
        self.updated += other.updated;
        self.moved += other.moved;
        self.removed += other.removed;
        self.failed += other.failed;
    }
}

impl fmt::Display for ReconcileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} moved, {} removed",
            self.created, self.updated, self.moved, self.removed
        )?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}

/// A local node chosen to stand for a remote one.
#[derive(Debug, Clone)]
struct Candidate {
    id: NodeId,
    title: String,
    url: Option<String>,
}

impl From<&Location> for Candidate {
    fn from(location: &Location) -> Self {
        Self {
            id: location.id.clone(),
            title: location.title.clone(),
            url: location.url.clone(),
        }
    }
}

impl Candidate {
    fn from_node(node: &TreeNode) -> Option<Self> {
        Some(Self {
            id: node.id.clone()?,
            title: node.title.clone(),
            url: node.url.clone(),
        })
    }
}

/// Our view of one local folder's children while it is being processed.
///
/// Kept in step with every create and move we issue so positions can be
/// decided without re-reading the folder after each call.
struct FolderCursor {
    folder_id: NodeId,
    children: Vec<TreeNode>,
    last_placed: Option<NodeId>,
}

impl FolderCursor {
    async fn load(tree: &dyn BookmarkTree, folder_id: &str) -> SyncResult<Self> {
        Ok(Self {
            folder_id: folder_id.to_string(),
            children: tree.get_children(folder_id).await?,
            last_placed: None,
        })
    }

    async fn refresh(&mut self, tree: &dyn BookmarkTree) -> SyncResult<()> {
        self.children = tree.get_children(&self.folder_id).await?;
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|child| child.id.as_deref() == Some(id))
    }

    /// Slot right after the last node placed in this run.
    fn next_slot(&self) -> usize {
        self.last_placed
            .as_deref()
            .and_then(|id| self.position(id))
            .map(|position| position + 1)
            .unwrap_or(0)
    }
}

/// Converges local folders onto remote children.
///
/// One instance is used for a whole restore so that claims made under one
/// system root are respected under the others.
pub struct Reconciler<'a> {
    tree: &'a dyn BookmarkTree,
    index: &'a GlobalIndex,
    claimed: HashSet<NodeId>,
    removed: HashSet<NodeId>,
    stats: ReconcileStats,
}

impl<'a> Reconciler<'a> {
    /// `index` must describe `tree` as it was before this run.
    pub fn new(tree: &'a dyn BookmarkTree, index: &'a GlobalIndex) -> Self {
        Self {
            tree,
            index,
            claimed: HashSet::new(),
            removed: HashSet::new(),
            stats: ReconcileStats::default(),
        }
    }

    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }

    /// Makes `folder_id` hold exactly `remote_children`, in order.
    ///
    /// `path` is the folder's slash-joined path (e.g. `toolbar/Work`), used
    /// to find folders that moved elsewhere in the local tree.
    pub fn reconcile<'b>(
        &'b mut self,
        folder_id: &'b str,
        remote_children: &'b [TreeNode],
        path: &'b str,
    ) -> BoxFuture<'b, SyncResult<()>> {
        async move {
            let mut cursor = FolderCursor::load(self.tree, folder_id).await?;

            for remote in remote_children {
                let result = if remote.is_bookmark() {
                    self.upsert_bookmark(&mut cursor, remote).await
                } else {
                    self.upsert_folder(&mut cursor, remote, path).await
                };
                if let Err(e) = result {
                    log::warn!("Failed to reconcile '{}' under {}: {}", remote.title, path, e);
                    self.stats.failed += 1;
                }
            }

            self.remove_unclaimed(folder_id, path).await
        }
        .boxed()
    }

    /// Adds whatever in `remote_children` is missing from `folder_id`.
    ///
    /// Bookmarks are matched by normalized URL, folders by title. Nothing is
    /// moved or deleted.
    pub fn merge<'b>(
        &'b mut self,
        folder_id: &'b str,
        remote_children: &'b [TreeNode],
    ) -> BoxFuture<'b, SyncResult<()>> {
        async move {
            let mut current = self.tree.get_children(folder_id).await?;

            for remote in remote_children {
                if let Err(e) = self.merge_node(folder_id, &mut current, remote).await {
                    log::warn!("Failed to merge '{}': {}", remote.title, e);
                    self.stats.failed += 1;
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn upsert_bookmark(&mut self, cursor: &mut FolderCursor, remote: &TreeNode) -> SyncResult<()> {
        let url = remote.url.as_deref().unwrap_or_default();
        let hash = remote
            .content_hash
            .clone()
            .unwrap_or_else(|| content_hash(url, &remote.title));

        let found = self
            .match_by_hash(&cursor.folder_id, &hash)
            .or_else(|| self.match_sibling_url(cursor, url))
            .or_else(|| self.match_by_url(url));

        let Some(candidate) = found else {
            return self.create_in(cursor, remote).await;
        };
        self.claimed.insert(candidate.id.clone());

        let mut changes = NodeChanges::default();
        if candidate.title != remote.title {
            changes.title = Some(remote.title.clone());
        }
        if candidate.url.as_deref().map(normalize_url) != Some(normalize_url(url)) {
            changes.url = Some(url.to_string());
        }
        if changes.title.is_some() || changes.url.is_some() {
            self.tree.update(&candidate.id, changes).await?;
            self.stats.updated += 1;
        }

        self.place_or_recreate(cursor, &candidate, remote)
            .await
            .map(|_| ())
    }

    async fn upsert_folder(&mut self, cursor: &mut FolderCursor, remote: &TreeNode, path: &str) -> SyncResult<()> {
        let child_path = format!("{}/{}", path, remote.title);

        let found = self
            .match_sibling_folder(cursor, &remote.title)
            .or_else(|| self.match_folder_path(&cursor.folder_id, &child_path));

        let Some(candidate) = found else {
            return self.create_in(cursor, remote).await;
        };
        self.claimed.insert(candidate.id.clone());

        if candidate.title != remote.title {
            let changes = NodeChanges {
                title: Some(remote.title.clone()),
                url: None,
            };
            self.tree.update(&candidate.id, changes).await?;
            self.stats.updated += 1;
        }

        if !self.place_or_recreate(cursor, &candidate, remote).await? {
            return Ok(());
        }

        // Recursing can pull nodes out of this folder, so re-read it afterwards.
        let result = self
            .reconcile(&candidate.id, remote.children(), &child_path)
            .await;
        cursor.refresh(self.tree).await?;
        result
    }

    /// Places a matched node. If it lives elsewhere and cannot be moved here,
    /// releases it and creates a fresh copy of `remote` instead.
    ///
    /// Returns `false` when the fallback copy was created.
    async fn place_or_recreate(
        &mut self,
        cursor: &mut FolderCursor,
        candidate: &Candidate,
        remote: &TreeNode,
    ) -> SyncResult<bool> {
        match self.place(cursor, &candidate.id).await {
            Ok(()) => Ok(true),
            Err(e) if cursor.position(&candidate.id).is_none() => {
                log::warn!(
                    "Could not move '{}' into place, recreating it: {}",
                    remote.title,
                    e
                );
                self.claimed.remove(&candidate.id);
                self.create_in(cursor, remote).await?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Puts a claimed node right after the last node placed in this folder.
    ///
    /// A node already further along is left alone: anything between it and
    /// the previous placement is unclaimed so far and will either be deleted
    /// or moved behind it later.
    async fn place(&mut self, cursor: &mut FolderCursor, id: &str) -> SyncResult<()> {
        let slot = cursor.next_slot();

        match cursor.position(id) {
            Some(position) if position >= slot => {}
            Some(position) => {
                let target = slot - 1;
                self.move_to(&cursor.folder_id, id, target).await?;
                let node = cursor.children.remove(position);
                cursor.children.insert(target, node);
            }
            None => {
                let node = self.move_to(&cursor.folder_id, id, slot).await?;
                let slot = slot.min(cursor.children.len());
                cursor.children.insert(slot, node);
            }
        }

        cursor.last_placed = Some(id.to_string());
        Ok(())
    }

    async fn move_to(&mut self, parent_id: &str, id: &str, index: usize) -> SyncResult<TreeNode> {
        let destination = Destination {
            parent_id: parent_id.to_string(),
            index,
        };
        let node = self.tree.move_node(id, destination).await?;
        self.stats.moved += 1;
        Ok(node)
    }

    async fn create_in(&mut self, cursor: &mut FolderCursor, remote: &TreeNode) -> SyncResult<()> {
        let slot = cursor.next_slot();

        let node = if remote.is_bookmark() {
            self.create_bookmark(&cursor.folder_id, Some(slot), remote).await?
        } else {
            self.create_subtree(&cursor.folder_id, Some(slot), remote).await?
        };

        let id = node
            .id
            .clone()
            .ok_or_else(|| SyncError::tree("created node has no id"))?;
        let slot = slot.min(cursor.children.len());
        cursor.children.insert(slot, node);
        cursor.last_placed = Some(id);
        Ok(())
    }

    async fn create_bookmark(&mut self, parent_id: &str, index: Option<usize>, remote: &TreeNode) -> SyncResult<TreeNode> {
        let node = self
            .tree
            .create(CreateDetails {
                parent_id: parent_id.to_string(),
                index,
                title: remote.title.clone(),
                url: remote.url.clone(),
            })
            .await?;
        self.stats.created += 1;
        if let Some(id) = node.id.clone() {
            self.claimed.insert(id);
        }
        Ok(node)
    }

    /// Creates a folder and everything below it without any matching.
    fn create_subtree<'b>(
        &'b mut self,
        parent_id: &'b str,
        index: Option<usize>,
        remote: &'b TreeNode,
    ) -> BoxFuture<'b, SyncResult<TreeNode>> {
        async move {
            let folder = self
                .tree
                .create(CreateDetails {
                    parent_id: parent_id.to_string(),
                    index,
                    title: remote.title.clone(),
                    url: None,
                })
                .await?;
            self.stats.created += 1;

            let folder_id = folder
                .id
                .clone()
                .ok_or_else(|| SyncError::tree("created folder has no id"))?;
            self.claimed.insert(folder_id.clone());

            for child in remote.children() {
                let result = if child.is_bookmark() {
                    self.create_bookmark(&folder_id, None, child).await.map(|_| ())
                } else {
                    self.create_subtree(&folder_id, None, child).await.map(|_| ())
                };
                if let Err(e) = result {
                    log::warn!("Failed to create '{}': {}", child.title, e);
                    self.stats.failed += 1;
                }
            }

            Ok(folder)
        }
        .boxed()
    }

    async fn remove_unclaimed(&mut self, folder_id: &str, path: &str) -> SyncResult<()> {
        let children = self.tree.get_children(folder_id).await?;

        for child in children {
            let Some(id) = child.id.clone() else {
                continue;
            };
            if self.claimed.contains(&id) || is_system_root(&child) {
                continue;
            }

            let result = if child.is_bookmark() {
                self.tree.remove(&id).await
            } else {
                self.tree.remove_tree(&id).await
            };
            match result {
                Ok(()) => {
                    log::debug!("Removed '{}' from {}", child.title, path);
                    self.removed.insert(id);
                    self.stats.removed += 1;
                }
                Err(e) => {
                    log::warn!("Failed to remove '{}' from {}: {}", child.title, path, e);
                    self.stats.failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn merge_node(
        &mut self,
        folder_id: &str,
        current: &mut Vec<TreeNode>,
        remote: &TreeNode,
    ) -> SyncResult<()> {
        if let Some(url) = remote.url.as_deref() {
            let wanted = normalize_url(url);
            let present = current
                .iter()
                .any(|child| child.url.as_deref().map(normalize_url).as_deref() == Some(wanted.as_str()));
            if !present {
                let node = self.create_bookmark(folder_id, None, remote).await?;
                current.push(node);
            }
            return Ok(());
        }

        let existing = current
            .iter()
            .find(|child| child.is_folder() && child.title == remote.title)
            .and_then(|child| child.id.clone());

        match existing {
            Some(id) => self.merge(&id, remote.children()).await,
            None => {
                let node = self.create_subtree(folder_id, None, remote).await?;
                current.push(node);
                Ok(())
            }
        }
    }

    /// False once a node has been claimed, deleted, or sat under a deleted folder.
    fn is_available(&self, id: &str) -> bool {
        !self.claimed.contains(id)
            && !self.removed.contains(id)
            && !self
                .index
                .ancestors(id)
                .iter()
                .any(|ancestor| self.removed.contains(*ancestor))
    }

    /// Prefers a copy already in this folder over one elsewhere.
    fn match_by_hash(&self, folder_id: &str, hash: &str) -> Option<Candidate> {
        let available: Vec<&Location> = self
            .index
            .by_hash(hash)
            .iter()
            .filter(|location| self.is_available(&location.id))
            .collect();

        available
            .iter()
            .find(|location| location.parent_id.as_deref() == Some(folder_id))
            .or_else(|| available.first())
            .map(|location| Candidate::from(*location))
    }

    fn match_sibling_url(&self, cursor: &FolderCursor, url: &str) -> Option<Candidate> {
        let wanted = normalize_url(url);
        cursor
            .children
            .iter()
            .filter(|child| child.id.as_deref().is_some_and(|id| self.is_available(id)))
            .find(|child| child.url.as_deref().map(normalize_url).as_deref() == Some(wanted.as_str()))
            .and_then(Candidate::from_node)
    }

    fn match_by_url(&self, url: &str) -> Option<Candidate> {
        self.index
            .by_url(url)
            .iter()
            .find(|location| self.is_available(&location.id))
            .map(Candidate::from)
    }

    fn match_sibling_folder(&self, cursor: &FolderCursor, title: &str) -> Option<Candidate> {
        cursor
            .children
            .iter()
            .filter(|child| child.is_folder() && !is_system_root(child))
            .filter(|child| child.id.as_deref().is_some_and(|id| self.is_available(id)))
            .find(|child| child.title == title)
            .and_then(Candidate::from_node)
    }

    fn match_folder_path(&self, folder_id: &str, path: &str) -> Option<Candidate> {
        let location = self.index.folder_at(path)?;
        let usable = location.id != folder_id
            && self.is_available(&location.id)
            && !self.index.is_within(folder_id, &location.id);
        usable.then(|| Candidate::from(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{assign_hashes, compare, MemoryTree, ReplicaKind};
    use async_trait::async_trait;

    fn local_bar(children: Vec<TreeNode>) -> MemoryTree {
        MemoryTree::from_tree(&TreeNode::folder("").with_id("0").with_children(vec![
            TreeNode::folder("Bookmarks bar")
                .with_id("1")
                .with_role("bookmarks-bar")
                .with_children(children),
            TreeNode::folder("Other bookmarks").with_id("2").with_role("other"),
        ]))
    }

    async fn run(tree: &dyn BookmarkTree, remote: &[TreeNode]) -> ReconcileStats {
        let index = GlobalIndex::build(&tree.get_tree().await.unwrap());
        let mut reconciler = Reconciler::new(tree, &index);
        reconciler.reconcile("1", remote, "toolbar").await.unwrap();
        reconciler.stats()
    }

    fn titles(tree: &MemoryTree, id: &str) -> Vec<String> {
        fn find<'t>(node: &'t TreeNode, id: &str) -> Option<&'t TreeNode> {
            if node.id.as_deref() == Some(id) {
                return Some(node);
            }
            node.children().iter().find_map(|c| find(c, id))
        }
        let snapshot = tree.snapshot();
        find(&snapshot, id)
            .map(|n| n.children().iter().map(|c| c.title.clone()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_trailing_slash_is_not_a_change() {
        let tree = local_bar(vec![TreeNode::bookmark("A", "https://a.com/").with_id("10")]);
        let remote = vec![assign_hashes(&TreeNode::bookmark("A", "https://a.com"))];

        let stats = run(&tree, &remote).await;
        assert_eq!(stats.created, 0);
        assert_eq!(stats.removed, 0);
        assert_eq!(tree.mutations().total(), 0);
        assert_eq!(tree.snapshot().children()[0].children()[0].id.as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn test_extra_local_bookmark_is_the_only_thing_removed() {
        let tree = local_bar(vec![
            TreeNode::bookmark("A", "https://a.com").with_id("10"),
            TreeNode::bookmark("X", "https://x.com").with_id("11"),
            TreeNode::bookmark("B", "https://b.com").with_id("12"),
        ]);
        let remote = vec![
            assign_hashes(&TreeNode::bookmark("A", "https://a.com")),
            assign_hashes(&TreeNode::bookmark("B", "https://b.com")),
        ];

        let stats = run(&tree, &remote).await;
        assert_eq!(
            stats,
            ReconcileStats {
                removed: 1,
                ..Default::default()
            }
        );
        assert_eq!(titles(&tree, "1"), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_reorders_and_renames_in_place() {
        let tree = local_bar(vec![
            TreeNode::bookmark("B", "https://b.com").with_id("10"),
            TreeNode::bookmark("A old", "https://a.com").with_id("11"),
        ]);
        let remote = vec![
            assign_hashes(&TreeNode::bookmark("A", "https://a.com")),
            assign_hashes(&TreeNode::bookmark("B", "https://b.com")),
        ];

        let stats = run(&tree, &remote).await;
        assert_eq!(stats.created, 0);
        assert_eq!(stats.removed, 0);
        assert_eq!(stats.updated, 1);
        assert_eq!(titles(&tree, "1"), vec!["A", "B"]);
        // Same node, renamed rather than recreated.
        assert_eq!(tree.snapshot().children()[0].children()[0].id.as_deref(), Some("11"));
    }

    #[tokio::test]
    async fn test_bookmark_moved_out_of_a_folder_keeps_its_id() {
        let tree = local_bar(vec![TreeNode::folder("Work")
            .with_id("20")
            .with_children(vec![TreeNode::bookmark("A", "https://a.com").with_id("21")])]);
        let remote = vec![
            assign_hashes(&TreeNode::bookmark("A", "https://a.com")),
            assign_hashes(&TreeNode::folder("Work")),
        ];

        let stats = run(&tree, &remote).await;
        assert_eq!(stats.moved, 1);
        assert_eq!(stats.created, 0);
        assert_eq!(stats.removed, 0);

        let bar = tree.snapshot().children()[0].clone();
        assert_eq!(bar.children()[0].id.as_deref(), Some("21"));
        assert_eq!(bar.children()[1].id.as_deref(), Some("20"));
        assert!(bar.children()[1].children().is_empty());
    }

    #[tokio::test]
    async fn test_converges_on_remote_content() {
        let tree = local_bar(vec![
            TreeNode::bookmark("Old", "https://old.example").with_id("10"),
            TreeNode::folder("Stale").with_id("11").with_children(vec![
                TreeNode::bookmark("Deep", "https://deep.example").with_id("12"),
            ]),
            TreeNode::folder("Work").with_id("13").with_children(vec![
                TreeNode::bookmark("Docs", "https://docs.example").with_id("14"),
            ]),
        ]);

        let remote_root = TreeNode::folder("").with_id("0").with_children(vec![
            TreeNode::folder("Bookmarks bar")
                .with_role("bookmarks-bar")
                .with_children(vec![
                    TreeNode::folder("Work").with_children(vec![
                        TreeNode::bookmark("Deep", "https://deep.example"),
                        TreeNode::bookmark("Docs", "https://docs.example"),
                        TreeNode::folder("Nested")
                            .with_children(vec![TreeNode::bookmark("N", "https://n.example")]),
                    ]),
                    TreeNode::bookmark("New", "https://new.example"),
                    TreeNode::bookmark("New", "https://new.example"),
                ]),
            TreeNode::folder("Other bookmarks").with_role("other"),
        ]);
        let remote_root = assign_hashes(&remote_root);
        let remote_bar = remote_root.children()[0].children().to_vec();

        let stats = run(&tree, &remote_bar).await;
        assert_eq!(stats.failed, 0);
        assert!(compare(&tree.snapshot(), &remote_root));

        let second = run(&tree, &remote_bar).await;
        assert!(second.is_noop(), "second run was not a no-op: {second}");
    }

    #[tokio::test]
    async fn test_merge_only_adds() {
        let tree = local_bar(vec![
            TreeNode::bookmark("Local", "https://local.example").with_id("10"),
            TreeNode::folder("Work").with_id("11").with_children(vec![
                TreeNode::bookmark("A", "https://a.com/").with_id("12"),
            ]),
        ]);
        let remote = vec![
            TreeNode::folder("Work").with_children(vec![
                TreeNode::bookmark("A", "https://a.com"),
                TreeNode::bookmark("B", "https://b.com"),
            ]),
            TreeNode::bookmark("Remote", "https://remote.example"),
        ];

        let index = GlobalIndex::build(&tree.snapshot());
        let mut reconciler = Reconciler::new(&tree, &index);
        reconciler.merge("1", &remote).await.unwrap();

        let stats = reconciler.stats();
        assert_eq!(stats.created, 2);
        assert_eq!(stats.removed + stats.moved + stats.updated, 0);
        assert_eq!(titles(&tree, "1"), vec!["Local", "Work", "Remote"]);
        assert_eq!(titles(&tree, "11"), vec!["A", "B"]);
    }

    /// Wraps a tree and refuses to create nodes with a given title.
    struct Refusing {
        inner: MemoryTree,
        title: &'static str,
    }

    #[async_trait]
    impl BookmarkTree for Refusing {
        async fn get_tree(&self) -> SyncResult<TreeNode> {
            self.inner.get_tree().await
        }
        async fn get_children(&self, id: &str) -> SyncResult<Vec<TreeNode>> {
            self.inner.get_children(id).await
        }
        async fn create(&self, details: CreateDetails) -> SyncResult<TreeNode> {
            if details.title == self.title {
                return Err(SyncError::tree("refused"));
            }
            self.inner.create(details).await
        }
        async fn update(&self, id: &str, changes: NodeChanges) -> SyncResult<TreeNode> {
            self.inner.update(id, changes).await
        }
        async fn move_node(&self, id: &str, destination: Destination) -> SyncResult<TreeNode> {
            self.inner.move_node(id, destination).await
        }
        async fn remove(&self, id: &str) -> SyncResult<()> {
            self.inner.remove(id).await
        }
        async fn remove_tree(&self, id: &str) -> SyncResult<()> {
            self.inner.remove_tree(id).await
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_the_batch() {
        let tree = Refusing {
            inner: MemoryTree::new(ReplicaKind::Chromium),
            title: "boom",
        };
        let remote = vec![
            TreeNode::bookmark("first", "https://1.example"),
            TreeNode::bookmark("boom", "https://2.example"),
            TreeNode::bookmark("third", "https://3.example"),
        ];

        let stats = run(&tree, &remote).await;
        assert_eq!(stats.created, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(titles(&tree.inner, "1"), vec!["first", "third"]);
    }

    #[test]
    fn test_stats_display() {
        let stats = ReconcileStats {
            created: 1,
            removed: 2,
            failed: 1,
            ..Default::default()
        };
        assert_eq!(stats.to_string(), "1 created, 0 updated, 0 moved, 2 removed, 1 failed");
    }
}
