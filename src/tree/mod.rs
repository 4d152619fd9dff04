//! Bookmark tree model and the host tree-store abstraction.
//!
//! The engine never touches a browser directly. Everything it knows about the
//! local replica comes through [`BookmarkTree`], the same small set of
//! primitives every browser bookmark API offers.

pub mod compare;
pub mod hash;
pub mod index;
mod memory;
pub mod normalize;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;

pub use compare::{compare, extract_signatures};
pub use hash::{assign_hashes, content_hash, count_bookmarks};
pub use index::{GlobalIndex, Location};
pub use memory::{FileTree, MemoryTree, MutationCounts};
pub use normalize::{find_matching_root, is_system_root, normalize_url, CanonicalRole, ReplicaKind};

/// Local identifier of a node. Only meaningful on the replica that issued it.
pub type NodeId = String;

/// One bookmark or folder.
///
/// A node is a bookmark iff `url` is set. The same type is used for the
/// local tree (ids, parents and indices populated) and for the minimized
/// wire form (hashes populated, local fields dropped).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    /// Marks a system root. Only cross-replica identifier a folder can have.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_tag: Option<String>,
}

impl TreeNode {
    /// An empty folder.
    pub fn folder(title: &str) -> Self {
        Self {
            title: title.to_string(),
            children: Some(Vec::new()),
            ..Default::default()
        }
    }

    /// A bookmark.
    pub fn bookmark(title: &str, url: &str) -> Self {
        Self {
            title: title.to_string(),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_role(mut self, tag: &str) -> Self {
        self.role_tag = Some(tag.to_string());
        self
    }

    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn is_bookmark(&self) -> bool {
        self.url.is_some()
    }

    pub fn is_folder(&self) -> bool {
        self.url.is_none()
    }

    /// Children, or an empty slice for bookmarks and unexpanded folders.
    pub fn children(&self) -> &[TreeNode] {
        self.children.as_deref().unwrap_or(&[])
    }
}

/// Where to create a new node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDetails {
    pub parent_id: NodeId,
    /// Position among siblings; `None` appends.
    pub index: Option<usize>,
    pub title: String,
    /// `None` creates a folder.
    pub url: Option<String>,
}

/// Fields to change on an existing node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeChanges {
    pub title: Option<String>,
    pub url: Option<String>,
}

/// Target of a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub parent_id: NodeId,
    /// Final position among the new siblings.
    pub index: usize,
}

/// Host hierarchical bookmark store.
///
/// Mirrors the primitives browser bookmark APIs expose. Implementations
/// return nodes with `id`, `parent_id` and `index` populated.
#[async_trait]
pub trait BookmarkTree: Send + Sync {
    /// The whole tree, starting at the anonymous top root.
    async fn get_tree(&self) -> SyncResult<TreeNode>;

    /// Direct children of a folder, without their own children.
    async fn get_children(&self, id: &str) -> SyncResult<Vec<TreeNode>>;

    /// Creates a bookmark or folder.
    async fn create(&self, details: CreateDetails) -> SyncResult<TreeNode>;

    /// Renames a node or changes its URL.
    async fn update(&self, id: &str, changes: NodeChanges) -> SyncResult<TreeNode>;

    /// Moves a node to a new parent and/or position.
    async fn move_node(&self, id: &str, destination: Destination) -> SyncResult<TreeNode>;

    /// Removes a bookmark or an empty folder.
    async fn remove(&self, id: &str) -> SyncResult<()>;

    /// Removes a folder and everything below it.
    async fn remove_tree(&self, id: &str) -> SyncResult<()>;
}
