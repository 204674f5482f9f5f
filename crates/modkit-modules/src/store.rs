//! Durable per-user key/value storage
//!
//! The change queue and the installed-revision records live here. Every
//! access reads the backing document in full and every write replaces it
//! in full, so the persisted copy is always the source of truth.
//!
//! [`FileStore`] keeps one JSON document on disk. Writes go to a temp file
//! in the same directory and are renamed over the document while an
//! exclusive lock is held on a sidecar `.lock` file.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Minimal durable key/value contract
pub trait KeyValueStore {
    /// Raw JSON value stored under `key`
    fn get_raw(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `key`
    fn set_raw(&self, key: &str, value: Value) -> Result<()>;

    /// Delete `key`; deleting an absent key succeeds
    fn remove(&self, key: &str) -> Result<()>;
}

/// Typed helpers over any [`KeyValueStore`]
pub trait KeyValueStoreExt: KeyValueStore {
    /// Value under `key`, or `default` when absent.
    ///
    /// A present value that does not deserialize as `T` is an error; callers
    /// that can self-heal use [`KeyValueStore::get_raw`] instead.
    fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        match self.get_raw(key)? {
            Some(value) => serde_json::from_value(value)
                .with_context(|| format!("Stored value for {} has an unexpected shape", key)),
            None => Ok(default),
        }
    }

    fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize value for {}", key))?;
        self.set_raw(key, value)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

/// JSON document store on the local filesystem
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<state_dir>/state.json`
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join("state.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read store {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content)
            .with_context(|| format!("Failed to parse store {:?}", self.path))?
        {
            Value::Object(map) => Ok(map),
            other => {
                warn!(
                    "Store {:?} does not hold an object (found {}), starting empty",
                    self.path,
                    type_name(&other)
                );
                Ok(Map::new())
            }
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create store directory {:?}", parent))?;

        let content =
            serde_json::to_string_pretty(document).context("Failed to serialize store")?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .context("Failed to create temp store file")?;
        temp.write_all(content.as_bytes())
            .context("Failed to write temp store file")?;
        temp.as_file()
            .sync_all()
            .context("Failed to sync temp store file")?;
        temp.persist(&self.path)
            .with_context(|| format!("Failed to replace store {:?}", self.path))?;
        Ok(())
    }

    /// Read-modify-write under the exclusive lock
    fn update<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> Result<R> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory {:?}", parent))?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())
            .context("Failed to open store lock file")?;
        lock_file
            .lock_exclusive()
            .context("Failed to acquire exclusive lock on store")?;

        let mut document = self.read_document()?;
        let result = f(&mut document);
        self.write_document(&document)?;

        // lock released when `lock_file` is dropped
        Ok(result)
    }
}

impl KeyValueStore for FileStore {
    fn get_raw(&self, key: &str) -> Result<Option<Value>> {
        let document = self.read_document()?;
        Ok(document.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: Value) -> Result<()> {
        debug!("Store set {}", key);
        self.update(|document| {
            document.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        debug!("Store remove {}", key);
        self.update(|document| {
            document.remove(key);
        })
    }
}

/// In-process store, used by tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<Value>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: Value) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))?;
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))?;
        values.remove(key);
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_default_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(temp_dir.path());

        let value: i64 = store.get_or("missing", 7).unwrap();
        assert_eq!(value, 7);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_set_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = FileStore::in_dir(temp_dir.path());
            store.set("installed/Modkit.Modules.Easing", &3_i64).unwrap();
        }

        let store = FileStore::in_dir(temp_dir.path());
        let value: i64 = store.get_or("installed/Modkit.Modules.Easing", -1).unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn test_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(temp_dir.path());
        store.set("installed/a", &1_i64).unwrap();
        store.set("installed/b", &2_i64).unwrap();

        store.remove("installed/a").unwrap();
        store.remove("installed/never").unwrap();
        assert!(store.get_raw("installed/a").unwrap().is_none());
        assert_eq!(store.get_or("installed/b", 0_i64).unwrap(), 2);
    }

    #[test]
    fn test_wrong_shape_is_error() {
        let store = MemoryStore::new();
        store.set("queue", &"not a number").unwrap();
        let result: Result<i64> = store.get_or("queue", 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_non_object_document_reads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(temp_dir.path());
        fs::write(store.path(), "[1, 2, 3]").unwrap();

        assert!(store.get_raw("anything").unwrap().is_none());
        store.set("fresh", &true).unwrap();
        assert_eq!(store.get_raw("fresh").unwrap(), Some(Value::Bool(true)));
    }
}
