use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::normalize::ReplicaKind;
use super::{BookmarkTree, CreateDetails, Destination, NodeChanges, NodeId, TreeNode};
use crate::error::{SyncError, SyncResult};
use crate::store::write_atomic;

/// First id handed out to new nodes; keeps clear of well-known root ids.
const FIRST_GENERATED_ID: u64 = 100;

#[derive(Debug, Clone)]
struct Entry {
    parent: Option<NodeId>,
    title: String,
    url: Option<String>,
    role_tag: Option<String>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Arena {
    nodes: HashMap<NodeId, Entry>,
    root: NodeId,
    next_id: u64,
}

impl Arena {
    fn fresh_id(&mut self) -> NodeId {
        loop {
            let candidate = self.next_id.to_string();
            self.next_id += 1;
            if !self.nodes.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn entry(&self, id: &str) -> SyncResult<&Entry> {
        self.nodes
            .get(id)
            .ok_or_else(|| SyncError::tree(format!("node {id} does not exist")))
    }

    fn insert_subtree(&mut self, node: &TreeNode, parent: Option<NodeId>) -> NodeId {
        let id = match node.id.clone() {
            Some(id) if !self.nodes.contains_key(&id) => id,
            _ => self.fresh_id(),
        };

        self.nodes.insert(
            id.clone(),
            Entry {
                parent,
                title: node.title.clone(),
                url: node.url.clone(),
                role_tag: node.role_tag.clone(),
                children: Vec::new(),
            },
        );

        let mut child_ids = Vec::new();
        for child in node.children() {
            child_ids.push(self.insert_subtree(child, Some(id.clone())));
        }
        if let Some(entry) = self.nodes.get_mut(&id) {
            entry.children = child_ids;
        }

        id
    }

    fn position_of(&self, id: &str, parent: Option<&NodeId>) -> Option<usize> {
        let parent = parent?;
        self.nodes
            .get(parent)?
            .children
            .iter()
            .position(|child| child == id)
    }

    fn to_node(&self, id: &str, deep: bool) -> SyncResult<TreeNode> {
        let entry = self.entry(id)?;
        let children = if entry.url.is_some() {
            None
        } else if deep {
            let mut out = Vec::with_capacity(entry.children.len());
            for child in &entry.children {
                out.push(self.to_node(child, true)?);
            }
            Some(out)
        } else {
            None
        };

        Ok(TreeNode {
            id: Some(id.to_string()),
            parent_id: entry.parent.clone(),
            index: self.position_of(id, entry.parent.as_ref()),
            title: entry.title.clone(),
            url: entry.url.clone(),
            children,
            content_hash: None,
            role_tag: entry.role_tag.clone(),
        })
    }

    fn detach(&mut self, id: &str) {
        let parent = self.nodes.get(id).and_then(|entry| entry.parent.clone());
        if let Some(parent) = parent {
            if let Some(parent_entry) = self.nodes.get_mut(&parent) {
                parent_entry.children.retain(|child| child != id);
            }
        }
    }

    fn drop_subtree(&mut self, id: &str) -> usize {
        let children = self
            .nodes
            .get(id)
            .map(|entry| entry.children.clone())
            .unwrap_or_default();
        let mut removed = 1;
        for child in children {
            removed += self.drop_subtree(&child);
        }
        self.nodes.remove(id);
        removed
    }

    fn is_descendant(&self, id: &str, ancestor: &str) -> bool {
        let mut current = self.nodes.get(id).and_then(|entry| entry.parent.clone());
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes.get(&parent).and_then(|entry| entry.parent.clone());
        }
        false
    }

    fn folder(&self, id: &str) -> SyncResult<&Entry> {
        let entry = self.entry(id)?;
        if entry.url.is_some() {
            return Err(SyncError::tree(format!("node {id} is not a folder")));
        }
        Ok(entry)
    }
}

/// Count of mutating calls made against a [`MemoryTree`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationCounts {
    pub created: usize,
    pub updated: usize,
    pub moved: usize,
    pub removed: usize,
}

impl MutationCounts {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.moved + self.removed
    }
}

/// In-process bookmark store with browser-like semantics.
///
/// Used by tests and as the backing store of [`FileTree`].
#[derive(Debug)]
pub struct MemoryTree {
    arena: Mutex<Arena>,
    counts: Mutex<MutationCounts>,
}

impl MemoryTree {
    /// An empty tree with the system roots of `kind`.
    pub fn new(kind: ReplicaKind) -> Self {
        let roots = kind
            .default_roots()
            .iter()
            .map(|(id, tag, title)| TreeNode::folder(title).with_id(id).with_role(tag))
            .collect();
        let root = TreeNode::folder("")
            .with_id(kind.top_root_id())
            .with_children(roots);
        Self::from_tree(&root)
    }

    /// Builds a store from a nested tree. Missing or duplicate ids are replaced.
    pub fn from_tree(root: &TreeNode) -> Self {
        let mut arena = Arena {
            nodes: HashMap::new(),
            root: String::new(),
            next_id: FIRST_GENERATED_ID,
        };
        arena.root = arena.insert_subtree(root, None);

        Self {
            arena: Mutex::new(arena),
            counts: Mutex::new(MutationCounts::default()),
        }
    }

    /// Id of the top root.
    pub fn root_id(&self) -> NodeId {
        self.arena.lock().root.clone()
    }

    /// The whole tree, synchronously.
    pub fn snapshot(&self) -> TreeNode {
        let arena = self.arena.lock();
        arena
            .to_node(&arena.root, true)
            .unwrap_or_else(|_| TreeNode::folder(""))
    }

    /// Mutations performed since creation or the last reset.
    pub fn mutations(&self) -> MutationCounts {
        *self.counts.lock()
    }

    pub fn reset_mutations(&self) {
        *self.counts.lock() = MutationCounts::default();
    }

    /// Finds the first node with the given title, depth first.
    pub fn find_by_title(&self, title: &str) -> Option<TreeNode> {
        fn find(node: &TreeNode, title: &str) -> Option<TreeNode> {
            if node.title == title {
                return Some(node.clone());
            }
            node.children().iter().find_map(|child| find(child, title))
        }
        find(&self.snapshot(), title)
    }
}

#[async_trait]
impl BookmarkTree for MemoryTree {
    async fn get_tree(&self) -> SyncResult<TreeNode> {
        let arena = self.arena.lock();
        arena.to_node(&arena.root, true)
    }

    async fn get_children(&self, id: &str) -> SyncResult<Vec<TreeNode>> {
        let arena = self.arena.lock();
        let entry = arena.folder(id)?;
        entry
            .children
            .iter()
            .map(|child| arena.to_node(child, false))
            .collect()
    }

    async fn create(&self, details: CreateDetails) -> SyncResult<TreeNode> {
        let mut arena = self.arena.lock();
        let sibling_count = arena.folder(&details.parent_id)?.children.len();
        let position = details.index.unwrap_or(sibling_count).min(sibling_count);

        let id = arena.fresh_id();
        arena.nodes.insert(
            id.clone(),
            Entry {
                parent: Some(details.parent_id.clone()),
                title: details.title,
                url: details.url,
                role_tag: None,
                children: Vec::new(),
            },
        );
        if let Some(parent) = arena.nodes.get_mut(&details.parent_id) {
            parent.children.insert(position, id.clone());
        }

        self.counts.lock().created += 1;
        arena.to_node(&id, false)
    }

    async fn update(&self, id: &str, changes: NodeChanges) -> SyncResult<TreeNode> {
        let mut arena = self.arena.lock();
        let is_folder = arena.entry(id)?.url.is_none();
        if is_folder && changes.url.is_some() {
            return Err(SyncError::tree(format!("cannot set a URL on folder {id}")));
        }

        if let Some(entry) = arena.nodes.get_mut(id) {
            if let Some(title) = changes.title {
                entry.title = title;
            }
            if let Some(url) = changes.url {
                entry.url = Some(url);
            }
        }

        self.counts.lock().updated += 1;
        arena.to_node(id, false)
    }

    async fn move_node(&self, id: &str, destination: Destination) -> SyncResult<TreeNode> {
        let mut arena = self.arena.lock();
        if id == arena.root {
            return Err(SyncError::tree("cannot move the root"));
        }
        arena.entry(id)?;
        arena.folder(&destination.parent_id)?;
        if destination.parent_id == id || arena.is_descendant(&destination.parent_id, id) {
            return Err(SyncError::tree(format!("cannot move {id} into itself")));
        }

        arena.detach(id);
        if let Some(parent) = arena.nodes.get_mut(&destination.parent_id) {
            let position = destination.index.min(parent.children.len());
            parent.children.insert(position, id.to_string());
        }
        if let Some(entry) = arena.nodes.get_mut(id) {
            entry.parent = Some(destination.parent_id.clone());
        }

        self.counts.lock().moved += 1;
        arena.to_node(id, false)
    }

    async fn remove(&self, id: &str) -> SyncResult<()> {
        let mut arena = self.arena.lock();
        let entry = arena.entry(id)?;
        if !entry.children.is_empty() {
            return Err(SyncError::tree(format!("folder {id} is not empty")));
        }
        arena.detach(id);
        arena.nodes.remove(id);

        self.counts.lock().removed += 1;
        Ok(())
    }

    async fn remove_tree(&self, id: &str) -> SyncResult<()> {
        let mut arena = self.arena.lock();
        if id == arena.root {
            return Err(SyncError::tree("cannot remove the root"));
        }
        arena.entry(id)?;
        arena.detach(id);
        arena.drop_subtree(id);

        self.counts.lock().removed += 1;
        Ok(())
    }
}

/// A [`MemoryTree`] persisted to a JSON file after every mutation.
///
/// Lets the command-line host stand in for a browser profile.
#[derive(Debug)]
pub struct FileTree {
    inner: MemoryTree,
    path: PathBuf,
}

impl FileTree {
    /// Loads the tree at `path`, creating an empty one of `kind` if absent.
    pub fn load(path: &Path, kind: ReplicaKind) -> SyncResult<Self> {
        let inner = match fs::read_to_string(path) {
            Ok(content) => {
                let root: TreeNode = serde_json::from_str(&content)?;
                MemoryTree::from_tree(&root)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryTree::new(kind),
            Err(e) => return Err(e.into()),
        };

        let tree = Self {
            inner,
            path: path.to_path_buf(),
        };
        tree.persist()?;
        Ok(tree)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> SyncResult<()> {
        let json = serde_json::to_string_pretty(&self.inner.snapshot())?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }
}

#[async_trait]
impl BookmarkTree for FileTree {
    async fn get_tree(&self) -> SyncResult<TreeNode> {
        self.inner.get_tree().await
    }

    async fn get_children(&self, id: &str) -> SyncResult<Vec<TreeNode>> {
        self.inner.get_children(id).await
    }

    async fn create(&self, details: CreateDetails) -> SyncResult<TreeNode> {
        let node = self.inner.create(details).await?;
        self.persist()?;
        Ok(node)
    }

    async fn update(&self, id: &str, changes: NodeChanges) -> SyncResult<TreeNode> {
        let node = self.inner.update(id, changes).await?;
        self.persist()?;
        Ok(node)
    }

    async fn move_node(&self, id: &str, destination: Destination) -> SyncResult<TreeNode> {
        let node = self.inner.move_node(id, destination).await?;
        self.persist()?;
        Ok(node)
    }

    async fn remove(&self, id: &str) -> SyncResult<()> {
        self.inner.remove(id).await?;
        self.persist()
    }

    async fn remove_tree(&self, id: &str) -> SyncResult<()> {
        self.inner.remove_tree(id).await?;
        self.persist()
    }
}
