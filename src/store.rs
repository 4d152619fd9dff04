//! Key-value persistence used for the lock, sync state and listing cache.
//!
//! Values are JSON so records can evolve without a schema migration. Two
//! instances are usually wired in: a durable one shared by every context of
//! the host, and an optional session-scoped one used only for caching.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{SyncError, SyncResult};

/// Host key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> SyncResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> SyncResult<()>;

    async fn remove(&self, key: &str) -> SyncResult<()>;
}

/// Reads a typed record. A value that no longer deserializes is treated as absent.
pub async fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> SyncResult<Option<T>> {
    match store.get(key).await? {
        Some(value) => match serde_json::from_value(value) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                log::warn!("Ignoring unreadable value under '{}': {}", key, e);
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

/// Writes a typed record.
pub async fn set_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, record: &T) -> SyncResult<()> {
    let value = serde_json::to_value(record)?;
    store.set(key, value).await
}

/// Replaces `path` with `content` through a sibling `.tmp` file and a rename,
/// so readers see either the old file or the new one, never a partial write.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut temp_name = path.as_os_str().to_os_string();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let mut file = File::create(&temp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)
}

/// Shared handle to a store.
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Process-local store. Also serves as the session cache.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> SyncResult<Option<Value>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> SyncResult<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> SyncResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Durable store backed by a single JSON object on disk.
///
/// The file is re-read on every access so separate processes sharing it see
/// each other's writes, which is what the sync lock relies on.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every record. A file that no longer parses holds nothing
    /// worth keeping (lock, sync time, cache), so it reads as empty and the
    /// next write replaces it.
    fn read_all(&self) -> SyncResult<HashMap<String, Value>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => match serde_json::from_str(&content) {
                Ok(values) => Ok(values),
                Err(e) => {
                    log::warn!(
                        "Discarding unreadable store {}: {}",
                        self.path.display(),
                        e
                    );
                    Ok(HashMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(SyncError::Storage(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write_all(&self, values: &HashMap<String, Value>) -> SyncResult<()> {
        let content = serde_json::to_string_pretty(values)?;
        write_atomic(&self.path, content.as_bytes()).map_err(|e| {
            SyncError::Storage(format!("failed to write {}: {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> SyncResult<Option<Value>> {
        let _guard = self.guard.lock();
        Ok(self.read_all()?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> SyncResult<()> {
        let _guard = self.guard.lock();
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value);
        self.write_all(&values)
    }

    async fn remove(&self, key: &str) -> SyncResult<()> {
        let _guard = self.guard.lock();
        let mut values = self.read_all()?;
        if values.remove(key).is_some() {
            self.write_all(&values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get("k").await.unwrap().is_none());

        store.set("k", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));

        store.remove("k").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        let store = MemoryStore::new();
        let record = Record {
            name: "x".into(),
            count: 3,
        };
        set_json(&store, "rec", &record).await.unwrap();
        let loaded: Option<Record> = get_json(&store, "rec").await.unwrap();
        assert_eq!(loaded, Some(record));

        store.set("rec", json!("not a record")).await.unwrap();
        let loaded: Option<Record> = get_json(&store, "rec").await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_file_store_is_shared_between_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let first = FileStore::new(&path);
        let second = FileStore::new(&path);

        first.set("lock", json!({"holder": "a"})).await.unwrap();
        assert_eq!(
            second.get("lock").await.unwrap(),
            Some(json!({"holder": "a"}))
        );

        second.remove("lock").await.unwrap();
        assert!(first.get("lock").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_file_store_recovers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{\n  \"syncState\": {\"time\": 17").unwrap();

        let store = FileStore::new(&path);
        assert!(store.get("syncState").await.unwrap().is_none());

        store.set("lock", json!({"holder": "a"})).await.unwrap();
        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("lock").await.unwrap(), Some(json!({"holder": "a"})));
    }

    #[tokio::test]
    async fn test_file_store_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::new(&path);

        store.set("a", json!(1)).await.unwrap();
        store.set("b", json!(2)).await.unwrap();
        store.remove("a").await.unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["store.json".to_string()]);
    }
}
