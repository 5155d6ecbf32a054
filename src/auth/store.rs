use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::state::{AuthPatch, AuthState, AuthStatus, AuthUser, OfflineTokenPolicy, PersistedAuth};
use crate::api::TokenSource;
use crate::config::AuthConfig;
use crate::storage::SafeStorage;
use crate::store::{Selection, Store};

/// How long a manual logout signal stays valid before it is ignored
const MANUAL_LOGOUT_TTL_SECS: i64 = 10;

/// Resolved auth store settings
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub storage_key: String,
    pub token_key: String,
    pub manual_logout_key: String,
    pub session_expired_message: String,
    pub policy: OfflineTokenPolicy,
}

impl From<&AuthConfig> for AuthSettings {
    fn from(config: &AuthConfig) -> Self {
        Self {
            storage_key: config.storage_key.clone(),
            token_key: config.token_key.clone(),
            manual_logout_key: config.manual_logout_key.clone(),
            session_expired_message: config.session_expired_message.clone(),
            policy: OfflineTokenPolicy::new(config.offline_token_prefix.clone()),
        }
    }
}

/// Authentication state machine with persistence.
///
/// `local` is the device storage shared with other contexts; `session` is
/// this context's private area and only holds the manual logout flag. Every
/// applied change is written back to `local`.
#[derive(Clone)]
pub struct AuthStore {
    store: Store<AuthState>,
    local: SafeStorage,
    session: SafeStorage,
    settings: Arc<AuthSettings>,
}

impl AuthStore {
    /// Create the store, hydrating it from `local`
    pub fn new(settings: AuthSettings, local: SafeStorage, session: SafeStorage) -> Self {
        let initial = hydrate(&local, &settings);
        info!(status = ?initial.status, has_token = initial.token.is_some(), "Auth store created");

        let store = Store::new("auth", initial);
        let settings = Arc::new(settings);

        let api = store.api();
        let persist_storage = local.clone();
        let persist_settings = Arc::clone(&settings);
        store.subscribe(move || {
            let state = api.get_state()?;
            persist(&persist_storage, &persist_settings, &state)?;
            Ok(())
        });

        Self {
            store,
            local,
            session,
            settings,
        }
    }

    /// In-memory store with default settings
    pub fn in_memory() -> Self {
        Self::new(
            AuthSettings::from(&AuthConfig::default()),
            SafeStorage::memory("local"),
            SafeStorage::memory("session"),
        )
    }

    pub fn store(&self) -> &Store<AuthState> {
        &self.store
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub fn state(&self) -> Arc<AuthState> {
        self.store.get_state()
    }

    pub fn status(&self) -> AuthStatus {
        self.store.get_state().status
    }

    pub fn token(&self) -> Option<String> {
        self.store.get_state().token.clone()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.store.get_state().user.clone()
    }

    /// Live view of the status
    pub fn watch_status(&self) -> Selection<AuthStatus> {
        self.store.select(|s: &AuthState| s.status)
    }

    pub fn is_offline_token(&self, token: &str) -> bool {
        self.settings.policy.is_offline_token(token)
    }

    pub fn determine_status(&self, token: Option<&str>, user: Option<&AuthUser>) -> AuthStatus {
        self.settings.policy.determine_status(token, user)
    }

    /// Store a token and user. An empty token clears the session.
    pub fn set_credentials(&self, token: &str, user: Option<AuthUser>) -> AuthStatus {
        let token = token.trim();

        if token.is_empty() {
            debug!("Empty token supplied, clearing credentials");
            self.store.patch(AuthPatch {
                token: Some(None),
                user: Some(None),
                status: Some(AuthStatus::Idle),
                error: Some(None),
            });
            return AuthStatus::Idle;
        }

        let status = self.determine_status(Some(token), user.as_ref());
        self.store.patch(AuthPatch {
            token: Some(Some(token.to_string())),
            user: Some(user),
            status: Some(status),
            error: Some(None),
        });

        info!(status = ?status, "Credentials stored");
        status
    }

    /// Drop the session and the cached token key
    pub fn clear(&self) {
        self.store.replace(AuthState::default());
        self.local.remove_item(&self.settings.token_key);
        info!("Auth state cleared");
    }

    /// An identity lookup is in flight
    pub fn mark_checking(&self) {
        self.store.patch(AuthPatch {
            status: Some(AuthStatus::Checking),
            error: Some(None),
            ..Default::default()
        });
    }

    /// The last check failed; token and user are kept
    pub fn mark_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = %message, "Auth check failed");
        self.store.patch(AuthPatch {
            status: Some(AuthStatus::Error),
            error: Some(Some(message)),
            ..Default::default()
        });
    }

    /// Switch to offline mode, optionally attaching a notice
    pub fn mark_offline(&self, message: Option<String>) {
        self.store.patch(AuthPatch {
            status: Some(AuthStatus::Offline),
            error: Some(message),
            ..Default::default()
        });
    }

    /// Flag the next token removal as intentional
    pub fn signal_manual_logout(&self) {
        self.session
            .set_item(&self.settings.manual_logout_key, &Utc::now().to_rfc3339());
        debug!("Manual logout signalled");
    }

    /// Consume the manual logout flag, returning whether a fresh one was set
    fn consume_manual_logout(&self) -> bool {
        let Some(raw) = self.session.take_item(&self.settings.manual_logout_key) else {
            return false;
        };

        match DateTime::parse_from_rfc3339(&raw) {
            Ok(at) => {
                let age = Utc::now() - at.with_timezone(&Utc);
                let fresh = age <= Duration::seconds(MANUAL_LOGOUT_TTL_SECS);
                if !fresh {
                    debug!(age_secs = age.num_seconds(), "Ignoring stale manual logout signal");
                }
                fresh
            }
            Err(_) => {
                warn!(value = %raw, "Malformed manual logout flag, ignoring");
                false
            }
        }
    }

    /// Reconcile with a token observed outside this store
    pub fn sync_token(&self, token: &str) {
        let token = token.trim().to_string();

        if token.is_empty() {
            let manual = self.consume_manual_logout();
            let expired_message = self.settings.session_expired_message.clone();

            let previous = self.status();
            self.store.update(move |s| {
                if !manual && s.status.is_active_session() {
                    s.error = Some(expired_message);
                } else if s.status == AuthStatus::Error {
                    // The failed check referred to the token being dropped
                    s.error = None;
                }
                s.token = None;
                s.user = None;
                s.status = AuthStatus::Idle;
            });

            if manual {
                info!("Token removed after manual logout");
            } else if previous.is_active_session() {
                warn!(previous = ?previous, "Token disappeared, session expired");
            }
            return;
        }

        // Adopt the user saved alongside this token by whoever wrote it
        let shared_user = self
            .persisted()
            .filter(|p| p.token.as_deref().map(str::trim) == Some(token.as_str()))
            .map(|p| p.user);

        let policy = self.settings.policy.clone();
        self.store.update(move |s| {
            let keep_error = s.status == AuthStatus::Error;
            if let Some(user) = shared_user {
                s.user = user;
            }
            s.status = policy.determine_status(Some(&token), s.user.as_ref());
            s.token = Some(token);
            if !keep_error {
                s.error = None;
            }
        });
        debug!(status = ?self.status(), "Token synchronized");
    }

    fn persisted(&self) -> Option<PersistedAuth> {
        read_persisted(&self.local, &self.settings)
    }

    /// Intentional sign-out
    pub fn logout(&self) {
        self.signal_manual_logout();
        self.sync_token("");
        self.clear();
    }

    /// Return to the initial state and wipe persisted keys
    pub fn reset(&self) {
        self.store.replace(AuthState::default());
        self.local.remove_item(&self.settings.storage_key);
        self.local.remove_item(&self.settings.token_key);
        self.session.remove_item(&self.settings.manual_logout_key);
        info!("Auth store reset");
    }
}

impl TokenSource for AuthStore {
    fn bearer_token(&self) -> Option<String> {
        self.token()
    }
}

fn read_persisted(local: &SafeStorage, settings: &AuthSettings) -> Option<PersistedAuth> {
    let raw = local.get_item(&settings.storage_key)?;

    match serde_json::from_str::<PersistedAuth>(&raw) {
        Ok(persisted) => Some(persisted),
        Err(e) => {
            warn!(key = %settings.storage_key, error = %e, "Discarding unreadable persisted auth state");
            None
        }
    }
}

fn hydrate(local: &SafeStorage, settings: &AuthSettings) -> AuthState {
    read_persisted(local, settings)
        .map(|persisted| persisted.into_state(&settings.policy))
        .unwrap_or_default()
}

fn persist(local: &SafeStorage, settings: &AuthSettings, state: &AuthState) -> anyhow::Result<()> {
    let persisted = PersistedAuth::from_state(state);
    local.set_item(&settings.storage_key, &serde_json::to_string(&persisted)?);

    match &state.token {
        Some(token) => local.set_item(&settings.token_key, token),
        None => local.remove_item(&settings.token_key),
    }

    debug!(status = ?persisted.status, "Persisted auth state");
    Ok(())
}
