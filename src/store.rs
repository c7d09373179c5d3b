use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use tracing::warn;

/// Default location of the on-disk store.
pub static DEFAULT_STORE_PATH: Lazy<PathBuf> = Lazy::new(|| {
    dirs::data_dir()
        .map(|d| d.join("ironlog").join("store.json"))
        .unwrap_or_else(|| PathBuf::from("ironlog-store.json"))
});

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store contains invalid data: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Narrow async key-value interface the session lifecycle is written against.
/// One implementation per target: `FileStore` for the CLI, `MemoryStore` for
/// tests and embedding.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Single-file JSON map. Values are always fully overwritten, never merged.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open_default() -> Self {
        Self::new(DEFAULT_STORE_PATH.clone())
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// A corrupt file is treated as empty and overwritten on the next write.
    fn read_map_or_empty(&self) -> BTreeMap<String, String> {
        match self.read_map() {
            Ok(map) => map,
            Err(err) => {
                warn!("discarding unreadable store at {}: {err}", self.path.display());
                BTreeMap::new()
            }
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(map)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_map()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.read_map_or_empty();
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.read_map_or_empty();
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// In-memory store for tests and in-process embedding.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.map
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.map.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_round_trips_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("store.json"));

        assert_eq!(store.get("workout_42").await.unwrap(), None);

        store.set("workout_42", "abc").await.unwrap();
        assert_eq!(
            store.get("workout_42").await.unwrap(),
            Some("abc".to_string())
        );

        store.remove("workout_42").await.unwrap();
        assert_eq!(store.get("workout_42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_overwrites_existing_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("store.json"));

        store.set("workout_1", "first").await.unwrap();
        store.set("workout_1", "second").await.unwrap();
        assert_eq!(
            store.get("workout_1").await.unwrap(),
            Some("second".to_string())
        );
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty_on_write_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }
}
