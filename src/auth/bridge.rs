use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::store::AuthStore;
use crate::broadcast::{log_lagged, StorageEvent};
use crate::storage::{BroadcastStorage, KeyValueStorage};

/// Keeps an [`AuthStore`] in step with token writes made by other contexts.
pub struct TokenChangeBridge;

impl TokenChangeBridge {
    /// Start listening on `storage`'s channel.
    ///
    /// The receiver is registered before this returns, so writes made right
    /// after the call are not missed.
    pub fn spawn(auth: AuthStore, storage: BroadcastStorage) -> TokenBridgeHandle {
        let mut events = storage.channel().subscribe();
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let origin = storage.origin();
        let token_key = auth.settings().token_key.clone();

        info!(origin = %origin, key = %token_key, "Starting token change bridge");

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = events.recv() => match received {
                        Ok(event) => {
                            if let Some(token) = relevant_token(&event, origin, &token_key) {
                                trace!(origin = %event.origin, "Token changed in another context");
                                auth.sync_token(&token);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            log_lagged("token-bridge", skipped);
                            resync(&auth, &storage, &token_key);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Storage channel closed, token bridge exiting");
                            break;
                        }
                    },

                    _ = shutdown_rx.recv() => {
                        debug!("Token bridge shutting down");
                        break;
                    }
                }
            }
        });

        TokenBridgeHandle {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }
}

/// The incoming token, if `event` is a foreign write to the token key
fn relevant_token(event: &StorageEvent, own_origin: uuid::Uuid, token_key: &str) -> Option<String> {
    if event.origin == own_origin || event.key != token_key {
        return None;
    }
    Some(event.new_value.clone().unwrap_or_default())
}

/// Reconcile from shared storage after missing events
fn resync(auth: &AuthStore, storage: &BroadcastStorage, token_key: &str) {
    match storage.get_item(token_key) {
        Ok(token) => auth.sync_token(token.as_deref().unwrap_or_default()),
        Err(e) => warn!(key = %token_key, error = %e, "Could not re-read token after lag"),
    }
}

/// Running bridge task; aborted when dropped
pub struct TokenBridgeHandle {
    shutdown: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TokenBridgeHandle {
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the task and wait for it to exit
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TokenBridgeHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
