//! The shared remote store.
//!
//! Backups live as flat files in one collection on a WebDAV server. The
//! engine only needs a handful of verbs, captured by [`RemoteStorage`];
//! paths are relative to the configured endpoint.

mod memory;
mod webdav;

use async_trait::async_trait;

use crate::error::SyncResult;

pub use memory::MemoryRemote;
pub use webdav::{parse_multistatus, PropfindEntry, WebDavClient};

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteEntry {
    /// File or collection name, without any directory part.
    pub name: String,
    pub size: Option<u64>,
    /// Server-reported modification time, as sent.
    pub modified: Option<String>,
    pub is_collection: bool,
}

/// Minimal WebDAV surface used by the storage layer.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Identifies the endpoint; sync state is scoped to it.
    fn endpoint(&self) -> &str;

    /// Cheap reachability probe.
    async fn is_online(&self) -> bool {
        true
    }

    /// Whether a file or collection exists (PROPFIND, depth 0).
    async fn exists(&self, path: &str) -> SyncResult<bool>;

    /// Direct children of a collection (PROPFIND, depth 1). A missing
    /// collection lists as empty.
    async fn list(&self, dir: &str) -> SyncResult<Vec<RemoteEntry>>;

    /// Uploads a file, replacing any existing one.
    async fn put(&self, path: &str, body: Vec<u8>) -> SyncResult<()>;

    /// Downloads a file, bypassing caches.
    async fn get(&self, path: &str) -> SyncResult<Vec<u8>>;

    /// Creates a collection. Succeeds if it already exists.
    async fn mkcol(&self, path: &str) -> SyncResult<()>;

    async fn delete(&self, path: &str) -> SyncResult<()>;
}

/// Joins a directory and a file name with exactly one slash.
pub fn join_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_matches('/');
    let name = name.trim_start_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joins_paths() {
        assert_eq!(join_path("bookmarks", "a.json"), "bookmarks/a.json");
        assert_eq!(join_path("/bookmarks/", "/a.json"), "bookmarks/a.json");
        assert_eq!(join_path("", "a.json"), "a.json");
    }
}
