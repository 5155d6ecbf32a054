//! Application context.
//!
//! One [`AppContext`] is one independent client instance (a tab, a window).
//! It owns its stores instead of reaching for process-wide globals. Contexts
//! that should stay in sync are built over the same shared storage backend
//! and [`StorageChannel`].

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::{ApiClient, HttpClient, ReqwestHttpClient};
use crate::auth::{AuthSession, AuthSettings, AuthStatus, AuthStore, TokenBridgeHandle, TokenChangeBridge};
use crate::broadcast::{ContextId, StorageChannel};
use crate::config::Config;
use crate::resources::DomainStores;
use crate::storage::{BroadcastStorage, KeyValueStorage, MemoryStorage, SafeStorage};

/// Printable view of a context's session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub context: ContextId,
    pub status: AuthStatus,
    pub has_token: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub storage_degraded: bool,
}

pub struct AppContext {
    id: ContextId,
    config: Arc<Config>,
    storage: BroadcastStorage,
    local: SafeStorage,
    auth: AuthStore,
    api: ApiClient,
    session: AuthSession,
    stores: DomainStores,
    bridge: Mutex<Option<TokenBridgeHandle>>,
}

impl AppContext {
    /// Build a context talking to the configured backend over reqwest
    pub fn new(config: Config, shared: Arc<dyn KeyValueStorage>, channel: StorageChannel) -> Self {
        let http = Arc::new(ReqwestHttpClient::new(std::time::Duration::from_secs(
            config.api.timeout_seconds.max(1),
        )));
        Self::with_http(config, shared, channel, http)
    }

    /// Build a context with an explicit HTTP client
    pub fn with_http(
        config: Config,
        shared: Arc<dyn KeyValueStorage>,
        channel: StorageChannel,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let id = Uuid::new_v4();
        let storage = BroadcastStorage::new(shared, channel, id);
        let local = SafeStorage::new("local", Arc::new(storage.clone()));
        let session_area = SafeStorage::memory("session");

        let auth = AuthStore::new(AuthSettings::from(&config.auth), local.clone(), session_area);
        let api = ApiClient::new(&config.api, http, Arc::new(auth.clone()));
        let session = AuthSession::new(auth.clone(), api.clone(), &config.auth);
        let stores = DomainStores::new();

        // Domain data belongs to the signed-in user
        let auth_api = auth.store().api();
        let listener_stores = stores.clone();
        auth.store().subscribe(move || {
            if auth_api.get_state()?.token.is_none() {
                listener_stores.reset();
            }
            Ok(())
        });

        info!(context = %id, status = ?auth.status(), "Application context created");

        Self {
            id,
            config: Arc::new(config),
            storage,
            local,
            auth,
            api,
            session,
            stores,
            bridge: Mutex::new(None),
        }
    }

    /// A context over private in-memory storage
    pub fn standalone(config: Config) -> Self {
        let capacity = config.broadcast.capacity;
        Self::new(config, Arc::new(MemoryStorage::new()), StorageChannel::new(capacity))
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &BroadcastStorage {
        &self.storage
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn stores(&self) -> &DomainStores {
        &self.stores
    }

    /// Start following token changes made by other contexts.
    ///
    /// Must be called within a tokio runtime. Returns `false` when the
    /// bridge was already running.
    pub fn start_token_bridge(&self) -> bool {
        let mut bridge = self.bridge.lock().unwrap_or_else(PoisonError::into_inner);
        if bridge.as_ref().is_some_and(TokenBridgeHandle::is_running) {
            return false;
        }
        *bridge = Some(TokenChangeBridge::spawn(self.auth.clone(), self.storage.clone()));
        true
    }

    pub fn is_bridge_running(&self) -> bool {
        self.bridge
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(TokenBridgeHandle::is_running)
    }

    pub fn summary(&self) -> SessionSummary {
        let state = self.auth.state();
        SessionSummary {
            context: self.id,
            status: state.status,
            has_token: state.token.is_some(),
            user: state.user.as_ref().and_then(|u| u.display_name()),
            role: state.user.as_ref().and_then(|u| u.role.clone()),
            error: state.error.clone(),
            storage_degraded: self.local.is_degraded(),
        }
    }

    /// Stop background work
    pub async fn shutdown(&self) {
        let handle = self
            .bridge
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
        debug!(context = %self.id, "Application context shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthUser;
    use crate::resources::Project;
    use serde_json::json;

    #[test]
    fn test_contexts_are_independent() {
        let a = AppContext::standalone(Config::default());
        let b = AppContext::standalone(Config::default());
        assert_ne!(a.id(), b.id());

        a.auth().set_credentials("tok", Some(AuthUser::with_email("a@b.com")));
        assert_eq!(b.auth().status(), AuthStatus::Idle);
    }

    #[test]
    fn test_sign_out_clears_domain_data() {
        let ctx = AppContext::standalone(Config::default());
        ctx.auth().set_credentials("tok", Some(AuthUser::with_email("a@b.com")));
        let project: Project = serde_json::from_value(json!({"id": 1, "name": "Gala"})).unwrap();
        ctx.stores().projects.upsert(project);

        ctx.auth().logout();
        assert!(ctx.stores().projects.items().is_empty());
    }

    #[test]
    fn test_summary() {
        let ctx = AppContext::standalone(Config::default());
        ctx.auth().set_credentials(
            "offline-demo",
            Some(AuthUser {
                first_name: Some("Demo".to_string()),
                role: Some("planner".to_string()),
                ..Default::default()
            }),
        );

        let summary = ctx.summary();
        assert_eq!(summary.status, AuthStatus::Offline);
        assert!(summary.has_token);
        assert_eq!(summary.user.as_deref(), Some("Demo"));
        assert_eq!(summary.role.as_deref(), Some("planner"));
        assert!(!summary.storage_degraded);
    }

    #[tokio::test]
    async fn test_bridge_lifecycle() {
        let ctx = AppContext::standalone(Config::default());
        assert!(ctx.start_token_bridge());
        assert!(!ctx.start_token_bridge());
        assert!(ctx.is_bridge_running());

        ctx.shutdown().await;
        assert!(!ctx.is_bridge_running());
    }
}
