//! Whole-tree lookup tables used as a fallback when a node has moved.

use std::collections::HashMap;

use super::hash::node_hash;
use super::normalize::{is_system_root, is_top_root, normalize_url, CanonicalRole};
use super::{NodeId, TreeNode};

/// Where a node lived when the index was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Local id of the node.
    pub id: NodeId,
    /// Local id of its parent.
    pub parent_id: Option<NodeId>,
    /// Position among its siblings.
    pub index: usize,
    /// Title at build time.
    pub title: String,
    /// URL at build time (bookmarks only).
    pub url: Option<String>,
}

/// Lookup tables built from one full traversal of the local tree.
///
/// Rebuilt for every reconciliation; it describes the tree as it was before
/// the run started, so callers must track what they have since claimed or
/// removed.
#[derive(Debug, Default)]
pub struct GlobalIndex {
    hash_to_locations: HashMap<String, Vec<Location>>,
    url_to_locations: HashMap<String, Vec<Location>>,
    path_to_folder: HashMap<String, Location>,
    id_to_path: HashMap<NodeId, String>,
    parents: HashMap<NodeId, NodeId>,
}

impl GlobalIndex {
    /// Indexes every bookmark and non-root folder below `root`.
    pub fn build(root: &TreeNode) -> Self {
        let mut index = GlobalIndex::default();

        if is_top_root(root) {
            for system_root in root.children() {
                if let (Some(id), Some(parent)) = (system_root.id.clone(), root.id.clone()) {
                    index.parents.insert(id, parent);
                }
                let label = path_label(system_root);
                index.visit_children(system_root, &label);
            }
        } else {
            let label = path_label(root);
            index.visit_children(root, &label);
        }

        index
    }

    fn visit_children(&mut self, folder: &TreeNode, path: &str) {
        for (position, child) in folder.children().iter().enumerate() {
            let Some(id) = child.id.clone() else {
                continue;
            };
            if let Some(parent) = folder.id.clone() {
                self.parents.insert(id.clone(), parent);
            }

            let location = Location {
                id: id.clone(),
                parent_id: folder.id.clone(),
                index: child.index.unwrap_or(position),
                title: child.title.clone(),
                url: child.url.clone(),
            };

            if let Some(url) = child.url.as_deref() {
                if let Some(hash) = node_hash(child) {
                    self.hash_to_locations
                        .entry(hash)
                        .or_default()
                        .push(location.clone());
                }
                self.url_to_locations
                    .entry(normalize_url(url))
                    .or_default()
                    .push(location);
            } else if !is_system_root(child) {
                let child_path = format!("{}/{}", path, child.title);
                self.path_to_folder
                    .entry(child_path.clone())
                    .or_insert(location);
                self.id_to_path.insert(id, child_path.clone());
                self.visit_children(child, &child_path);
            }
        }
    }

    /// Every bookmark whose content hash equals `hash`.
    pub fn by_hash(&self, hash: &str) -> &[Location] {
        self.hash_to_locations
            .get(hash)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every bookmark whose URL normalizes to the same value as `url`.
    pub fn by_url(&self, url: &str) -> &[Location] {
        self.url_to_locations
            .get(&normalize_url(url))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The first folder found at a slash-joined path such as `toolbar/Work`.
    pub fn folder_at(&self, path: &str) -> Option<&Location> {
        self.path_to_folder.get(path)
    }

    /// Path of a folder by id.
    pub fn path_of(&self, id: &str) -> Option<&str> {
        self.id_to_path.get(id).map(String::as_str)
    }

    /// True if `id` sat somewhere below `ancestor` at build time.
    pub fn is_within(&self, id: &str, ancestor: &str) -> bool {
        let mut current = id;
        while let Some(parent) = self.parents.get(current) {
            if parent == ancestor {
                return true;
            }
            current = parent;
        }
        false
    }

    /// Ancestors of `id` at build time, nearest first.
    pub fn ancestors(&self, id: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parents.get(current) {
            out.push(parent.as_str());
            current = parent;
        }
        out
    }

    /// Number of indexed bookmarks.
    pub fn bookmark_count(&self) -> usize {
        self.hash_to_locations.values().map(Vec::len).sum()
    }

    /// Number of indexed folders.
    pub fn folder_count(&self) -> usize {
        self.id_to_path.len()
    }
}

/// First path segment for folders under a system root.
pub fn path_label(root: &TreeNode) -> String {
    match CanonicalRole::of(root) {
        Some(role) => role.as_str().to_string(),
        None => root.title.clone(),
    }
}
