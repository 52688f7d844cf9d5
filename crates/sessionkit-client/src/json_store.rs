//! File-backed [`ConfigStore`]: one JSON object per profile.
//!
//! The whole document is rewritten on every `put`, first to a sibling
//! temporary file and then renamed over the original, so a crash mid-write
//! leaves the previous document intact.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::debug;

use crate::{ConfigStore, StoreError};

#[derive(Debug)]
pub struct JsonFileConfigStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonFileConfigStore {
    /// A store for `profile` inside `dir`, at `<dir>/<profile>.json`.
    /// The directory is created if needed; the file on first write.
    pub fn open(dir: impl AsRef<Path>, profile: &str) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(format!("{profile}.json")),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Map<String, Value>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, doc: &Map<String, Value>) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(doc)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "config document written");
        Ok(())
    }

    fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut doc = self.read()?;
        doc.insert(key.to_string(), value);
        self.write(&doc)
    }

    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.read()?.remove(key))
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.get(key)? {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    fn put_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.put(key, Value::String(value.to_string()))
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        match self.get(key)? {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(_) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
                expected: "bool",
            }),
        }
    }

    fn put_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.put(key, Value::Bool(value))
    }
}
