use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StorageError;

/// Durable key-value capability holding serialized blobs
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the blob under `key`; `None` if nothing was ever written
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the blob under `key`
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key inside a data directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write-then-rename so a crash mid-save never leaves a torn file
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("Saved {} ({} bytes)", path.display(), value.len());
        Ok(())
    }
}

/// Volatile store, for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with one blob
    pub fn with_entry(key: &str, value: impl Into<String>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(key.to_string(), value.into());
        Self {
            entries: Mutex::new(entries),
            unavailable: Default::default(),
        }
    }

    /// Make every subsequent read and write fail
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::StorageUnavailable(
                "memory store offline".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_missing_key_reads_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.read("recordings").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_write_creates_directory() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("data"));

        store.write("recordings", "[]").await.unwrap();
        store.write("recordings", "[1]").await.unwrap();

        assert_eq!(store.read("recordings").await.unwrap().as_deref(), Some("[1]"));
        assert!(store.dir().join("recordings.json").exists());
        assert!(!store.dir().join(".recordings.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_memory_store_unavailable() {
        let store = MemoryStore::with_entry("k", "v");
        assert_eq!(store.read("k").await.unwrap().as_deref(), Some("v"));

        store.set_unavailable(true);
        assert!(store.read("k").await.is_err());
        assert!(store.write("k", "w").await.is_err());

        store.set_unavailable(false);
        assert_eq!(store.read("k").await.unwrap().as_deref(), Some("v"));
    }
}
