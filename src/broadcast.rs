//! Storage mutation broadcast between application contexts.
//!
//! Every context (a browser tab, a window, a test instance) that shares a
//! storage backend announces its writes on a [`StorageChannel`]. Peers
//! subscribe and reconcile their in-memory state when a key they care about
//! changes. The originating context never reacts to its own events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, trace, warn};
use uuid::Uuid;

/// Identifies the context that performed a write
pub type ContextId = Uuid;

/// A change to one storage key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEvent {
    /// Key that changed
    pub key: String,
    /// Value before the write (`None` if absent)
    pub old_value: Option<String>,
    /// Value after the write (`None` if removed)
    pub new_value: Option<String>,
    /// Context that performed the write
    pub origin: ContextId,
    /// When the write happened
    pub timestamp: DateTime<Utc>,
}

impl StorageEvent {
    pub fn new(
        key: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
        origin: ContextId,
    ) -> Self {
        Self {
            key: key.into(),
            old_value,
            new_value,
            origin,
            timestamp: Utc::now(),
        }
    }

    /// Whether the write removed the key
    pub fn is_removal(&self) -> bool {
        self.new_value.is_none()
    }
}

/// Statistics about channel activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Events delivered to at least one subscriber
    pub events_published: u64,
    /// Events published while nobody was listening
    pub events_dropped: u64,
    /// Count of events by key
    pub key_counts: HashMap<String, u64>,
}

/// Broadcast channel carrying storage events
#[derive(Clone)]
pub struct StorageChannel {
    sender: broadcast::Sender<StorageEvent>,
    capacity: usize,
    published: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    key_counts: Arc<DashMap<String, u64>>,
}

impl StorageChannel {
    /// Create a channel buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        info!(capacity, "Creating storage broadcast channel");
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            capacity: capacity.max(1),
            published: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
            key_counts: Arc::new(DashMap::new()),
        }
    }

    /// Get a receiver for subsequent events
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        trace!("New subscriber registered to storage channel");
        self.sender.subscribe()
    }

    /// Announce a write. Returns the number of receivers reached; having no
    /// receivers is not an error.
    pub fn publish(&self, event: StorageEvent) -> usize {
        let key = event.key.clone();
        trace!(key = %key, origin = %event.origin, "Publishing storage event");

        *self.key_counts.entry(key.clone()).or_insert(0) += 1;

        match self.sender.send(event) {
            Ok(receivers) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                trace!(receivers, "Storage event published");
                receivers
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "No receivers for storage event");
                0
            }
        }
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            events_published: self.published.load(Ordering::Relaxed),
            events_dropped: self.dropped.load(Ordering::Relaxed),
            key_counts: self
                .key_counts
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
        }
    }

    pub fn reset_stats(&self) {
        info!("Resetting storage channel statistics");
        self.published.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.key_counts.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for StorageChannel {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_BROADCAST_CAPACITY)
    }
}

/// Log a lagged receiver; consumers resync from storage afterwards
pub(crate) fn log_lagged(consumer: &str, skipped: u64) {
    warn!(
        consumer = %consumer,
        skipped,
        "Storage channel receiver lagged, events were skipped"
    );
}
