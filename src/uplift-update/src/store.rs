//! Persistent key-value store seam.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{UpdateError, UpdateResult};

/// Host key-value configuration store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value) -> UpdateResult<()>;
    fn delete(&self, key: &str) -> UpdateResult<()>;
}

/// Read and deserialize a key; undecodable values count as absent.
pub fn load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let value = store.get(key)?;
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::warn!(key, "Discarding undecodable stored value: {}", e);
            None
        }
    }
}

/// Serialize and write a key.
pub fn save<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> UpdateResult<()> {
    store.set(key, serde_json::to_value(value)?)
}

/// In-memory store, for hosts without persistence and for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> UpdateResult<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> UpdateResult<()> {
        self.values.write().remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON object file.
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so a crash never leaves a truncated file behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at the standard location (`~/.uplift/store.json`).
    pub fn open_default() -> UpdateResult<Self> {
        let dirs = uplift_common::get_app_dirs().ok_or_else(|| UpdateError::Store {
            message: "No home directory".to_string(),
        })?;
        dirs.ensure_dirs()?;
        Ok(Self::new(dirs.store_file()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Map<String, Value> {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                tracing::warn!(path = %self.path.display(), "Ignoring malformed store file");
                Map::new()
            }
        }
    }

    fn write_all(&self, map: Map<String, Value>) -> UpdateResult<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let content = serde_json::to_vec_pretty(&Value::Object(map))?;
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(&content)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| UpdateError::Store {
            message: format!("Failed to replace {}: {}", self.path.display(), e.error),
        })?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut Map<String, Value>)) -> UpdateResult<()> {
        let _guard = self.write_lock.lock();
        let mut map = self.read_all();
        f(&mut map);
        self.write_all(map)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.read_all().remove(key)
    }

    fn set(&self, key: &str, value: Value) -> UpdateResult<()> {
        self.modify(|map| {
            map.insert(key.to_string(), value);
        })
    }

    fn delete(&self, key: &str) -> UpdateResult<()> {
        self.modify(|map| {
            map.remove(key);
        })
    }
}
