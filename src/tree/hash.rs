//! Content hashing and the minimized wire form of a tree.

use sha2::{Digest, Sha256};

use super::normalize::{is_system_root, normalize_url};
use super::TreeNode;

/// SHA-256 over the normalized URL and the title.
///
/// Position is deliberately not part of the digest so a bookmark keeps its
/// identity when it is moved or reordered.
pub fn content_hash(url: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_url(url).as_bytes());
    hasher.update(b"|");
    hasher.update(title.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash of a bookmark node, or `None` for folders.
pub fn node_hash(node: &TreeNode) -> Option<String> {
    node.url.as_deref().map(|url| content_hash(url, &node.title))
}

/// Rebuilds a minimized, hash-stamped copy of `node`.
///
/// Keeps title, url, content hash and children; system roots also keep a
/// role tag (their id is used when they have none) so the other side can
/// map them. Local ids, parents and indices are dropped.
pub fn assign_hashes(node: &TreeNode) -> TreeNode {
    let role_tag = if is_system_root(node) {
        node.role_tag.clone().or_else(|| node.id.clone())
    } else {
        None
    };

    TreeNode {
        id: None,
        parent_id: None,
        index: None,
        title: node.title.clone(),
        url: node.url.clone(),
        content_hash: node_hash(node),
        role_tag,
        children: if node.url.is_some() {
            None
        } else {
            Some(node.children().iter().map(assign_hashes).collect())
        },
    }
}

/// Number of bookmarks (not folders) in the subtree.
pub fn count_bookmarks(node: &TreeNode) -> usize {
    if node.is_bookmark() {
        1
    } else {
        node.children().iter().map(count_bookmarks).sum()
    }
}
