use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::AppError;

/// Synchronous key-value storage on this machine
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AppError>;
    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), AppError>;
}

/// One pretty-printed JSON file per key under a data directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, AppError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(FileStore { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(AppError::Validation(format!("Invalid document key: {}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AppError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        // write then rename so a crash never leaves half a document
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
        fs::rename(&tmp, &path)?;
        debug!(key, path = %path.display(), "Stored document locally");
        Ok(())
    }
}

/// In-process store, used when no data directory is wanted
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AppError> {
        let docs = self
            .docs
            .lock()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))?;
        Ok(docs.get(key).cloned())
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), AppError> {
        let mut docs = self
            .docs
            .lock()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))?;
        docs.insert(key.to_string(), value.clone());
        Ok(())
    }
}
