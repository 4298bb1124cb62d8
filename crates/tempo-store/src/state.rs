//! Durable keyed records (the host's key-value storage for resume state).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;

/// A small durable key → JSON record store.
pub trait StateStore: Send + Sync {
    /// Read a record. Returns `None` if the key was never written or was removed.
    fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>>;
    fn put(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()>;
    /// Remove a record. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// One atomically written `<key>.json` file per record.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading state: {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("parsing state: {}", path.display()))?;
        Ok(Some(value))
    }

    fn put(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        let path = self.record_path(key);
        let data = serde_json::to_string_pretty(value)?;
        crate::write_atomic(&path, data.as_bytes())
            .with_context(|| format!("saving state: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "state record saved");
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let path = self.record_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing state: {}", path.display())),
        }
    }
}

/// In-process store for hosts that provide no disk storage.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("state store lock poisoned"))?;
        Ok(records.get(key).cloned())
    }

    fn put(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("state store lock poisoned"))?;
        records.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("state store lock poisoned"))?;
        records.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        assert!(store.get("resumable_session").unwrap().is_none());
    }

    #[test]
    fn file_store_put_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state"));
        let value = serde_json::json!({"session_id": "ses_1", "total_paused_ms": 40});

        store.put("resumable_session", &value).unwrap();
        assert_eq!(store.get("resumable_session").unwrap(), Some(value));
        assert!(dir.path().join("state/resumable_session.json").exists());

        store.remove("resumable_session").unwrap();
        assert!(store.get("resumable_session").unwrap().is_none());
        // second remove is a no-op
        store.remove("resumable_session").unwrap();
    }

    #[test]
    fn file_store_rejects_corrupt_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let store = FileStateStore::new(dir.path());
        assert!(store.get("broken").is_err());
    }

    #[test]
    fn memory_store_overwrites() {
        let store = MemoryStateStore::new();
        store.put("k", &serde_json::json!(1)).unwrap();
        store.put("k", &serde_json::json!(2)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(serde_json::json!(2)));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
