// src/store.rs
//! Client-side persistence: a tiny key-value storage seam plus the History
//! Catalog that lives under a single key in it.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::models::{derive_title, Conversation, Message};

pub const HISTORY_KEY: &str = "chatHistory";
pub const DARK_MODE_KEY: &str = "darkMode";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Synchronous string storage, the moral equivalent of a browser's localStorage.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.read().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.write().map_err(|_| StoreError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        // Write-then-rename so a crash never leaves a half-written catalog behind.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

/// The History Catalog plus the dark-mode preference.
///
/// The catalog is kept in memory and written back as a whole on every mutation.
pub struct ConversationStore {
    storage: Arc<dyn KeyValueStorage>,
    catalog: Vec<Conversation>,
    clock: Clock,
}

impl ConversationStore {
    pub fn open(storage: Arc<dyn KeyValueStorage>) -> Self {
        let catalog = match storage.get(HISTORY_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable chat history: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read chat history: {}", e);
                Vec::new()
            }
        };
        tracing::debug!("Loaded {} conversations from storage", catalog.len());

        Self {
            storage,
            catalog,
            clock: Box::new(|| chrono::Utc::now().timestamp_millis()),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Most recently created first.
    pub fn catalog(&self) -> &[Conversation] {
        &self.catalog
    }

    pub fn get(&self, id: i64) -> Option<&Conversation> {
        self.catalog.iter().find(|c| c.id == id)
    }

    /// Upserts the conversation and writes the catalog back.
    ///
    /// Returns `None` without touching storage when there is nothing to save,
    /// otherwise the id the conversation is stored under. A failed write
    /// leaves the in-memory catalog as it was.
    pub fn save(&mut self, id: Option<i64>, messages: &[Message]) -> Result<Option<i64>, StoreError> {
        let Some(first) = messages.first() else {
            return Ok(None);
        };

        let id = match id {
            Some(id) => id,
            None => self.fresh_id(),
        };
        let conversation = Conversation {
            id,
            title: derive_title(&first.content),
            messages: messages.to_vec(),
        };

        let mut catalog = self.catalog.clone();
        match catalog.iter_mut().find(|c| c.id == id) {
            Some(existing) => *existing = conversation,
            None => catalog.insert(0, conversation),
        }

        self.commit(catalog)?;
        Ok(Some(id))
    }

    /// Removes the conversation; returns whether anything was removed.
    /// Nothing changes, in memory or on disk, when the id is unknown or the write fails.
    pub fn delete(&mut self, id: i64) -> Result<bool, StoreError> {
        if self.get(id).is_none() {
            return Ok(false);
        }
        let catalog = self.catalog.iter().filter(|c| c.id != id).cloned().collect();
        self.commit(catalog)?;
        Ok(true)
    }

    pub fn dark_mode(&self) -> bool {
        matches!(self.storage.get(DARK_MODE_KEY), Ok(Some(ref v)) if v == "true")
    }

    pub fn set_dark_mode(&self, enabled: bool) -> Result<(), StoreError> {
        self.storage
            .set(DARK_MODE_KEY, if enabled { "true" } else { "false" })
    }

    fn fresh_id(&self) -> i64 {
        let mut id = (self.clock)();
        while self.get(id).is_some() {
            id += 1;
        }
        id
    }

    /// Writes `catalog` out and only then adopts it, so memory never runs
    /// ahead of storage.
    fn commit(&mut self, catalog: Vec<Conversation>) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&catalog)?;
        self.storage.set(HISTORY_KEY, &raw)?;
        self.catalog = catalog;
        Ok(())
    }
}
