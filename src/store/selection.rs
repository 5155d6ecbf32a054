use std::sync::Weak;

use tokio::sync::watch;

use super::listeners::{ListenerId, ListenerRegistry};

/// A live projection of a store's state.
///
/// This is the store's read hook: `get` reads the latest projection and
/// `changed` suspends until the projection differs from the last one seen.
/// Dropping the selection unsubscribes it from the store.
pub struct Selection<R> {
    receiver: watch::Receiver<R>,
    listener_id: ListenerId,
    registry: Weak<ListenerRegistry>,
}

impl<R: Clone> Selection<R> {
    pub(crate) fn new(
        receiver: watch::Receiver<R>,
        listener_id: ListenerId,
        registry: Weak<ListenerRegistry>,
    ) -> Self {
        Self {
            receiver,
            listener_id,
            registry,
        }
    }

    /// Latest projected value
    pub fn get(&self) -> R {
        self.receiver.borrow().clone()
    }

    /// Latest projected value, marking it as seen
    pub fn take(&mut self) -> R {
        self.receiver.borrow_and_update().clone()
    }

    /// Whether the projection changed since it was last seen
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the projection to change.
    ///
    /// Returns `false` once the store has been dropped and no further change
    /// can arrive.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    pub fn listener_id(&self) -> ListenerId {
        self.listener_id
    }
}

impl<R> Drop for Selection<R> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.listener_id);
        }
    }
}
