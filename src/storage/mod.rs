//! Key/value storage backends.
//!
//! All backends store string values under string keys, mirroring the device
//! storage areas the client persists to. [`SafeStorage`] wraps any backend
//! and degrades to memory when the backend fails, so callers never have to
//! handle storage errors.

pub mod broadcasting;
pub mod file;
pub mod safe;

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::StorageResult;

pub use broadcasting::BroadcastStorage;
pub use file::FileStorage;
pub use safe::SafeStorage;

/// A string key/value storage area
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    fn remove_item(&self, key: &str) -> StorageResult<()>;

    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Read a value and remove it
    fn take_item(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self.get_item(key)?;
        if value.is_some() {
            self.remove_item(key)?;
        }
        Ok(value)
    }
}

/// In-memory storage area
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }

    fn take_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.remove(key).map(|(_, v)| v))
    }
}
