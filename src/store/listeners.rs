//! Listener registry shared by every store.
//!
//! Listeners are zero-argument callbacks invoked synchronously after a state
//! change has been applied. A failing listener (an `Err` return or a panic)
//! is logged and skipped; it never prevents the others from running.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error, trace};
use uuid::Uuid;

/// Identifier returned by `subscribe`, used to unsubscribe later
pub type ListenerId = Uuid;

/// Type of a registered listener
pub type Listener = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Registered listeners for one store
pub struct ListenerRegistry {
    /// Store name, used as the logging group
    group: String,
    /// Listeners keyed by ID, each tagged with its registration sequence
    listeners: DashMap<ListenerId, (u64, Listener)>,
    /// Monotonic registration counter, keeps notification order stable
    sequence: AtomicU64,
}

impl ListenerRegistry {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            listeners: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Register a listener and return its ID
    pub fn register(&self, listener: Listener) -> ListenerId {
        let id = Uuid::new_v4();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, (seq, listener));

        debug!(listener_id = %id, store = %self.group, "Registered listener");
        id
    }

    /// Remove a listener, returning whether it was registered
    pub fn unregister(&self, id: ListenerId) -> bool {
        let removed = self.listeners.remove(&id).is_some();

        if removed {
            debug!(listener_id = %id, store = %self.group, "Unregistered listener");
        } else {
            debug!(
                listener_id = %id,
                store = %self.group,
                "Attempted to unregister non-existent listener"
            );
        }

        removed
    }

    /// Number of registered listeners
    pub fn count(&self) -> usize {
        self.listeners.len()
    }

    /// Invoke every listener in registration order.
    ///
    /// The set is snapshotted first so listeners may subscribe, unsubscribe
    /// or update the store while being notified. Returns the number of
    /// listeners that completed successfully.
    pub fn notify(&self) -> usize {
        let mut snapshot: Vec<(u64, ListenerId, Listener)> = self
            .listeners
            .iter()
            .map(|entry| {
                let (seq, listener) = entry.value();
                (*seq, *entry.key(), Arc::clone(listener))
            })
            .collect();
        snapshot.sort_by_key(|(seq, _, _)| *seq);

        let mut delivered = 0;
        for (_, id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener())) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    error!(
                        listener_id = %id,
                        store = %self.group,
                        error = %e,
                        "Listener execution failed"
                    );
                }
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(
                        listener_id = %id,
                        store = %self.group,
                        panic = %reason,
                        "Listener panicked"
                    );
                }
            }
        }

        trace!(store = %self.group, delivered, "Notified listeners");
        delivered
    }
}
