use serde::{Deserialize, Serialize};

use crate::store::StoreState;

/// User profile returned by the identity endpoint.
///
/// Every field is optional because partial server responses are common.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl AuthUser {
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Default::default()
        }
    }

    /// "First Last", falling back to the email address
    pub fn display_name(&self) -> Option<String> {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if full.is_empty() {
            self.email.clone()
        } else {
            Some(full)
        }
    }
}

/// Authentication status machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    /// No session
    #[default]
    Idle,
    /// Token present, identity lookup in flight
    Checking,
    /// Token and user confirmed
    Authenticated,
    /// Running against the offline demo catalogue
    Offline,
    /// Last identity check failed
    Error,
}

impl AuthStatus {
    /// Statuses under which losing the token counts as an expired session
    pub fn is_active_session(&self) -> bool {
        matches!(
            self,
            AuthStatus::Authenticated | AuthStatus::Offline | AuthStatus::Checking
        )
    }

    /// Statuses that must not survive a reload
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthStatus::Checking | AuthStatus::Error)
    }
}

/// State held by the auth store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub token: Option<String>,
    pub user: Option<AuthUser>,
    pub status: AuthStatus,
    pub error: Option<String>,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated && self.token.is_some() && self.user.is_some()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

/// Partial update of [`AuthState`]; `Some` fields overwrite
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthPatch {
    pub token: Option<Option<String>>,
    pub user: Option<Option<AuthUser>>,
    pub status: Option<AuthStatus>,
    pub error: Option<Option<String>>,
}

impl StoreState for AuthState {
    type Patch = AuthPatch;

    fn apply_patch(&mut self, patch: AuthPatch) {
        if let Some(token) = patch.token {
            self.token = token;
        }
        if let Some(user) = patch.user {
            self.user = user;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(error) = patch.error {
            self.error = error;
        }
    }
}

/// Recognizes offline demo tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineTokenPolicy {
    prefix: String,
}

impl OfflineTokenPolicy {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `token` is an offline demo token
    pub fn is_offline_token(&self, token: &str) -> bool {
        let token = token.trim();
        !self.prefix.is_empty() && token.len() > self.prefix.len() && token.starts_with(&self.prefix)
    }

    /// Status implied by a token and user.
    ///
    /// Offline tokens always yield `Offline`, even with a user attached.
    pub fn determine_status(&self, token: Option<&str>, user: Option<&AuthUser>) -> AuthStatus {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            None => AuthStatus::Idle,
            Some(t) if self.is_offline_token(t) => AuthStatus::Offline,
            Some(_) if user.is_some() => AuthStatus::Authenticated,
            Some(_) => AuthStatus::Checking,
        }
    }
}

impl Default for OfflineTokenPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_OFFLINE_TOKEN_PREFIX)
    }
}

/// The persisted subset of [`AuthState`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAuth {
    pub token: Option<String>,
    pub user: Option<AuthUser>,
    pub status: AuthStatus,
}

impl PersistedAuth {
    /// Snapshot `state` for storage, collapsing transient statuses to `Idle`
    pub fn from_state(state: &AuthState) -> Self {
        let status = if state.token.is_none() || state.status.is_transient() {
            AuthStatus::Idle
        } else {
            state.status
        };

        Self {
            token: state.token.clone(),
            user: state.user.clone(),
            status,
        }
    }

    /// Rebuild a state from storage, re-establishing the status invariants
    pub fn into_state(self, policy: &OfflineTokenPolicy) -> AuthState {
        let token = self
            .token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let Some(token) = token else {
            return AuthState::default();
        };

        let status = if policy.is_offline_token(&token) {
            AuthStatus::Offline
        } else if self.status == AuthStatus::Authenticated && self.user.is_some() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Idle
        };

        AuthState {
            token: Some(token),
            user: self.user,
            status,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_predicate() {
        let policy = OfflineTokenPolicy::new("offline-");
        assert!(policy.is_offline_token("offline-demo"));
        assert!(policy.is_offline_token("  offline-admin "));
        assert!(!policy.is_offline_token("offline-"));
        assert!(!policy.is_offline_token("eyJhbGciOi"));
        assert!(!OfflineTokenPolicy::new("").is_offline_token("anything"));
    }

    #[test]
    fn test_determine_status() {
        let policy = OfflineTokenPolicy::new("offline-");
        let user = AuthUser::with_email("a@b.com");

        assert_eq!(policy.determine_status(None, Some(&user)), AuthStatus::Idle);
        assert_eq!(policy.determine_status(Some("  "), None), AuthStatus::Idle);
        assert_eq!(policy.determine_status(Some("tok"), None), AuthStatus::Checking);
        assert_eq!(
            policy.determine_status(Some("tok"), Some(&user)),
            AuthStatus::Authenticated
        );
        assert_eq!(
            policy.determine_status(Some("offline-demo"), Some(&user)),
            AuthStatus::Offline
        );
        assert_eq!(
            policy.determine_status(Some("offline-demo"), None),
            AuthStatus::Offline
        );
    }

    #[test]
    fn test_persisted_status_is_normalized() {
        let mut state = AuthState {
            token: Some("tok".to_string()),
            user: Some(AuthUser::with_email("a@b.com")),
            status: AuthStatus::Error,
            error: Some("boom".to_string()),
        };
        assert_eq!(PersistedAuth::from_state(&state).status, AuthStatus::Idle);

        state.status = AuthStatus::Checking;
        assert_eq!(PersistedAuth::from_state(&state).status, AuthStatus::Idle);

        state.status = AuthStatus::Authenticated;
        let persisted = PersistedAuth::from_state(&state);
        assert_eq!(persisted.status, AuthStatus::Authenticated);

        let json = serde_json::to_value(&persisted).unwrap();
        assert_eq!(json["status"], "authenticated");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_hydration_restores_invariants() {
        let policy = OfflineTokenPolicy::default();

        let restored = PersistedAuth {
            token: Some("tok".to_string()),
            user: Some(AuthUser::with_email("a@b.com")),
            status: AuthStatus::Authenticated,
        }
        .into_state(&policy);
        assert_eq!(restored.status, AuthStatus::Authenticated);

        // Offline status with a non-offline token is not trusted
        let restored = PersistedAuth {
            token: Some("tok".to_string()),
            user: None,
            status: AuthStatus::Offline,
        }
        .into_state(&policy);
        assert_eq!(restored.status, AuthStatus::Idle);

        let restored = PersistedAuth {
            token: Some("offline-demo".to_string()),
            user: None,
            status: AuthStatus::Idle,
        }
        .into_state(&policy);
        assert_eq!(restored.status, AuthStatus::Offline);

        let restored = PersistedAuth {
            token: Some(" ".to_string()),
            user: Some(AuthUser::default()),
            status: AuthStatus::Authenticated,
        }
        .into_state(&policy);
        assert_eq!(restored, AuthState::default());
    }

    #[test]
    fn test_display_name() {
        let user = AuthUser {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            ..Default::default()
        };
        assert_eq!(user.display_name().as_deref(), Some("Ada Lovelace"));
        assert_eq!(
            AuthUser::with_email("a@b.com").display_name().as_deref(),
            Some("a@b.com")
        );
        assert_eq!(AuthUser::default().display_name(), None);
    }
}
