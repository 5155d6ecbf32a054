use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::{KeyValueStorage, MemoryStorage};
use crate::error::StorageError;

/// Infallible view over a storage backend.
///
/// The first failing operation (quota exceeded, storage blocked, I/O error)
/// switches the wrapper to an in-memory area for the rest of its life, so
/// state machines persisting through it keep working with session-only
/// persistence.
#[derive(Clone)]
pub struct SafeStorage {
    name: String,
    primary: Arc<dyn KeyValueStorage>,
    fallback: MemoryStorage,
    degraded: Arc<AtomicBool>,
}

impl SafeStorage {
    pub fn new(name: impl Into<String>, primary: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            name: name.into(),
            primary,
            fallback: MemoryStorage::new(),
            degraded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// In-memory only
    pub fn memory(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(MemoryStorage::new()))
    }

    /// Whether the primary backend has failed and memory is in use
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    fn degrade(&self, operation: &str, key: &str, err: &StorageError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(
                storage = %self.name,
                operation,
                key = %key,
                error = %err,
                "Storage failed, falling back to in-memory storage"
            );
        } else {
            debug!(storage = %self.name, operation, key = %key, error = %err, "Storage still failing");
        }
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        if !self.is_degraded() {
            match self.primary.get_item(key) {
                Ok(value) => return value,
                Err(e) => self.degrade("get", key, &e),
            }
        }
        self.fallback.get_item(key).ok().flatten()
    }

    pub fn set_item(&self, key: &str, value: &str) {
        if !self.is_degraded() {
            match self.primary.set_item(key, value) {
                Ok(()) => return,
                Err(e) => self.degrade("set", key, &e),
            }
        }
        let _ = self.fallback.set_item(key, value);
    }

    pub fn remove_item(&self, key: &str) {
        if !self.is_degraded() {
            match self.primary.remove_item(key) {
                Ok(()) => return,
                Err(e) => self.degrade("remove", key, &e),
            }
        }
        let _ = self.fallback.remove_item(key);
    }

    /// Read and remove a value
    pub fn take_item(&self, key: &str) -> Option<String> {
        if !self.is_degraded() {
            match self.primary.take_item(key) {
                Ok(value) => return value,
                Err(e) => self.degrade("take", key, &e),
            }
        }
        self.fallback.take_item(key).ok().flatten()
    }
}
