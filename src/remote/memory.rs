use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use super::{RemoteEntry, RemoteStorage};
use crate::error::{SyncError, SyncResult};

fn clean(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    collections: BTreeSet<String>,
}

/// In-process remote with WebDAV-like semantics.
///
/// Uploading into a missing collection fails with a conflict, as real
/// servers do. Connectivity and download latency can be controlled.
#[derive(Debug)]
pub struct MemoryRemote {
    endpoint: String,
    state: Mutex<State>,
    online: AtomicBool,
    gets: AtomicUsize,
    get_delay: Mutex<Option<Duration>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new("memory://remote")
    }
}

impl MemoryRemote {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            state: Mutex::new(State::default()),
            online: AtomicBool::new(true),
            gets: AtomicUsize::new(0),
            get_delay: Mutex::new(None),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Makes every download take at least `delay`.
    pub fn set_get_delay(&self, delay: Option<Duration>) {
        *self.get_delay.lock() = delay;
    }

    /// Number of downloads served so far.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Writes a file directly, creating its collection.
    pub fn insert(&self, path: &str, body: Vec<u8>) {
        let path = clean(path);
        let mut state = self.state.lock();
        let parent = parent_of(&path).to_string();
        if !parent.is_empty() {
            state.collections.insert(parent);
        }
        state.files.insert(path, body);
    }

    /// Names of the files directly inside `dir`, sorted.
    pub fn file_names(&self, dir: &str) -> Vec<String> {
        let dir = clean(dir);
        self.state
            .lock()
            .files
            .keys()
            .filter(|path| parent_of(path) == dir)
            .map(|path| file_name(path).to_string())
            .collect()
    }

    fn ensure_online(&self) -> SyncResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::Offline(format!("{} is unreachable", self.endpoint)))
        }
    }
}

#[async_trait]
impl RemoteStorage for MemoryRemote {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    async fn exists(&self, path: &str) -> SyncResult<bool> {
        self.ensure_online()?;
        let path = clean(path);
        let state = self.state.lock();
        Ok(path.is_empty() || state.files.contains_key(&path) || state.collections.contains(&path))
    }

    async fn list(&self, dir: &str) -> SyncResult<Vec<RemoteEntry>> {
        self.ensure_online()?;
        let dir = clean(dir);
        let state = self.state.lock();

        let files = state
            .files
            .iter()
            .filter(|(path, _)| parent_of(path) == dir)
            .map(|(path, body)| RemoteEntry {
                name: file_name(path).to_string(),
                size: Some(body.len() as u64),
                modified: None,
                is_collection: false,
            });
        let collections = state
            .collections
            .iter()
            .filter(|path| parent_of(path) == dir && **path != dir)
            .map(|path| RemoteEntry {
                name: file_name(path).to_string(),
                is_collection: true,
                ..Default::default()
            });

        Ok(collections.chain(files).collect())
    }

    async fn put(&self, path: &str, body: Vec<u8>) -> SyncResult<()> {
        self.ensure_online()?;
        let path = clean(path);
        let mut state = self.state.lock();
        let parent = parent_of(&path);
        if !parent.is_empty() && !state.collections.contains(parent) {
            return Err(SyncError::RemoteConflict(format!("collection {parent} does not exist")));
        }
        state.files.insert(path, body);
        Ok(())
    }

    async fn get(&self, path: &str) -> SyncResult<Vec<u8>> {
        self.ensure_online()?;
        self.gets.fetch_add(1, Ordering::SeqCst);

        let delay = *self.get_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let path = clean(path);
        self.state
            .lock()
            .files
            .get(&path)
            .cloned()
            .ok_or(SyncError::RemoteNotFound(path))
    }

    async fn mkcol(&self, path: &str) -> SyncResult<()> {
        self.ensure_online()?;
        self.state.lock().collections.insert(clean(path));
        Ok(())
    }

    async fn delete(&self, path: &str) -> SyncResult<()> {
        self.ensure_online()?;
        let path = clean(path);
        let mut state = self.state.lock();
        if state.files.remove(&path).is_none() && !state.collections.remove(&path) {
            return Err(SyncError::RemoteNotFound(path));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_requires_collection() {
        let remote = MemoryRemote::default();
        let result = remote.put("bookmarks/a.json", b"{}".to_vec()).await;
        assert!(matches!(result, Err(SyncError::RemoteConflict(_))));

        remote.mkcol("bookmarks").await.unwrap();
        remote.put("bookmarks/a.json", b"{}".to_vec()).await.unwrap();
        assert!(remote.exists("bookmarks/a.json").await.unwrap());
        assert_eq!(remote.get("bookmarks/a.json").await.unwrap(), b"{}".to_vec());
    }

    #[tokio::test]
    async fn test_lists_direct_children_only() {
        let remote = MemoryRemote::default();
        remote.insert("bookmarks/a.json", vec![1]);
        remote.insert("bookmarks/old/b.json", vec![2]);
        remote.insert("c.json", vec![3]);

        let entries = remote.list("bookmarks").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["old", "a.json"]);
        assert!(entries[0].is_collection);
        assert_eq!(remote.file_names("bookmarks"), vec!["a.json"]);
    }

    #[tokio::test]
    async fn test_offline_fails_every_call() {
        let remote = MemoryRemote::default();
        remote.set_online(false);
        assert!(!remote.is_online().await);
        assert!(matches!(remote.list("").await, Err(SyncError::Offline(_))));
        assert!(matches!(remote.get("x").await, Err(SyncError::Offline(_))));
    }
}
