//! Persistent key-value store contract and the bundled implementations.

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Contract for the persistence collaborator: structured data in and out,
/// keyed by namespace. Implementations must be callable from the
/// finalizer threads.
pub trait CacheStore: Send + Sync {
    fn load(&self, namespace: &str) -> Result<Option<Value>, String>;
    fn save(&self, namespace: &str, data: &Value) -> Result<(), String>;
}

fn validate_namespace(namespace: &str) -> Result<(), String> {
    if namespace.is_empty() {
        return Err("namespace cannot be empty".to_string());
    }
    if namespace
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Ok(());
    }
    Err("namespace contains unsupported characters".to_string())
}

/// One pretty-printed JSON file per namespace under a root directory.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn namespace_path(&self, namespace: &str) -> Result<PathBuf, String> {
        validate_namespace(namespace)?;
        Ok(self.root.join(format!("{namespace}.json")))
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self, namespace: &str) -> Result<Option<Value>, String> {
        let path = self.namespace_path(namespace)?;
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).map_err(|err| err.to_string())?;
        let value = serde_json::from_str::<Value>(&raw).map_err(|err| err.to_string())?;
        Ok(Some(value))
    }

    fn save(&self, namespace: &str, data: &Value) -> Result<(), String> {
        let path = self.namespace_path(namespace)?;
        fs::create_dir_all(&self.root)
            .map_err(|err| format!("Could not create store dir: {err}"))?;

        let payload = serde_json::to_string_pretty(data).map_err(|err| err.to_string())?;

        // Write-then-rename so a crash mid-save never truncates the file.
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let temp_path = self.root.join(format!(".{namespace}.{stamp}.tmp"));
        fs::write(&temp_path, payload).map_err(|err| err.to_string())?;

        fs::rename(&temp_path, &path).or_else(|rename_err| {
            if path.exists() {
                fs::remove_file(&path).map_err(|err| err.to_string())?;
                fs::rename(&temp_path, &path).map_err(|err| err.to_string())
            } else {
                Err(rename_err.to_string())
            }
        })
    }
}

/// In-memory store for tests and sessions without a writable disk.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self, namespace: &str) -> Result<Option<Value>, String> {
        validate_namespace(namespace)?;
        let entries = self
            .entries
            .lock()
            .map_err(|_| "Store lock poisoned".to_string())?;
        Ok(entries.get(namespace).cloned())
    }

    fn save(&self, namespace: &str, data: &Value) -> Result<(), String> {
        validate_namespace(namespace)?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| "Store lock poisoned".to_string())?;
        entries.insert(namespace.to_string(), data.clone());
        Ok(())
    }
}
