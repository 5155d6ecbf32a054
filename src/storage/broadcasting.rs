use std::sync::Arc;

use tracing::trace;

use super::KeyValueStorage;
use crate::broadcast::{ContextId, StorageChannel, StorageEvent};
use crate::error::StorageResult;

/// A shared storage area as seen from one context.
///
/// Writes go to the shared backend and, when they change the stored value,
/// are announced on the channel tagged with this context's ID. Writing the
/// value a key already holds is silent, so peers mirroring each other's
/// writes converge instead of echoing.
#[derive(Clone)]
pub struct BroadcastStorage {
    inner: Arc<dyn KeyValueStorage>,
    channel: StorageChannel,
    origin: ContextId,
}

impl BroadcastStorage {
    pub fn new(inner: Arc<dyn KeyValueStorage>, channel: StorageChannel, origin: ContextId) -> Self {
        Self {
            inner,
            channel,
            origin,
        }
    }

    pub fn origin(&self) -> ContextId {
        self.origin
    }

    pub fn channel(&self) -> &StorageChannel {
        &self.channel
    }

    fn announce(&self, key: &str, old_value: Option<String>, new_value: Option<String>) {
        let reached = self
            .channel
            .publish(StorageEvent::new(key, old_value, new_value, self.origin));
        trace!(key = %key, origin = %self.origin, reached, "Announced storage write");
    }
}

impl KeyValueStorage for BroadcastStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let old = self.inner.get_item(key)?;
        if old.as_deref() == Some(value) {
            return Ok(());
        }
        self.inner.set_item(key, value)?;
        self.announce(key, old, Some(value.to_string()));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let old = self.inner.get_item(key)?;
        if old.is_none() {
            return Ok(());
        }
        self.inner.remove_item(key)?;
        self.announce(key, old, None);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.inner.keys()
    }
}
