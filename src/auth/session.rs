use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::state::{AuthStatus, AuthUser};
use super::store::AuthStore;
use crate::api::{endpoints, ApiClient};
use crate::config::{AuthConfig, OfflineAccount};
use crate::error::{ApiError, ApiResult, ErrorCode};

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct RoleResponse {
    #[serde(default)]
    role: Option<String>,
}

/// Drives the auth store through sign-in, session checks and sign-out.
#[derive(Clone)]
pub struct AuthSession {
    auth: AuthStore,
    api: ApiClient,
    offline_accounts: Vec<OfflineAccount>,
    offline_notice: String,
}

impl AuthSession {
    pub fn new(auth: AuthStore, api: ApiClient, config: &AuthConfig) -> Self {
        Self {
            auth,
            api,
            offline_accounts: config.offline_accounts.clone(),
            offline_notice: config.offline_notice.clone(),
        }
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    fn offline_account(&self, email: &str, password: &str) -> Option<&OfflineAccount> {
        let email = email.trim();
        self.offline_accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email) && a.password == password)
    }

    /// Sign in, either against the offline catalogue or the backend
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<AuthStatus> {
        if let Some(account) = self.offline_account(email, password) {
            if !self.auth.is_offline_token(&account.token) {
                warn!(email = %account.email, "Offline account token lacks the offline prefix");
                let err = ApiError::new(
                    ErrorCode::Validation,
                    "This demo account is misconfigured and cannot be used offline.",
                );
                return Err(self.fail(err));
            }

            let mut user = account.user.clone();
            user.email.get_or_insert_with(|| account.email.clone());

            self.auth.set_credentials(&account.token, Some(user));
            self.auth.mark_offline(Some(self.offline_notice.clone()));
            info!(email = %account.email, "Signed in with offline account");
            return Ok(AuthStatus::Offline);
        }

        let request = LoginRequest {
            email: email.trim(),
            password,
        };
        let response: LoginResponse = match self.api.post_json(endpoints::LOGIN, &request).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(e)),
        };

        let token = response.access_token;
        if self.auth.set_credentials(&token, None) == AuthStatus::Idle {
            let err = ApiError::decode("login response carried an empty token");
            return Err(self.fail(err));
        }

        match self.api.get_json::<AuthUser>(endpoints::ME).await {
            Ok(mut user) => {
                user.email.get_or_insert_with(|| email.trim().to_string());
                let status = self.auth.set_credentials(&token, Some(user));
                info!(status = ?status, "Signed in");
                Ok(status)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Confirm the stored token with the identity endpoint
    pub async fn check_session(&self) -> ApiResult<AuthStatus> {
        let Some(token) = self.auth.token() else {
            debug!("No stored token, nothing to check");
            return Ok(AuthStatus::Idle);
        };

        if self.auth.is_offline_token(&token) {
            if self.auth.status() != AuthStatus::Offline {
                self.auth.mark_offline(None);
            }
            return Ok(AuthStatus::Offline);
        }

        self.auth.mark_checking();
        let result = self.api.get_json::<AuthUser>(endpoints::ME).await;

        // Another context may have replaced the token meanwhile
        if self.auth.token().as_deref() != Some(token.as_str()) {
            debug!("Token changed during session check, discarding result");
            return result.map(|_| self.auth.status());
        }

        match result {
            Ok(user) => Ok(self.auth.set_credentials(&token, Some(user))),
            Err(e) if e.is_unauthorized() => {
                warn!("Stored token rejected by the server");
                self.auth.sync_token("");
                Err(e)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Fetch the current role and merge it into the stored user
    pub async fn refresh_role(&self) -> ApiResult<Option<String>> {
        let response: RoleResponse = self.api.get_json(endpoints::ROLE).await?;
        let role = response.role.filter(|r| !r.trim().is_empty());

        let merged = role.clone();
        let changed = self.auth.store().update(move |s| {
            if let Some(user) = s.user.as_mut() {
                user.role = merged;
            }
        });
        debug!(role = ?role, changed, "Role refreshed");

        Ok(role)
    }

    /// Intentional sign-out
    pub fn logout(&self) {
        self.auth.logout();
        info!("Signed out");
    }

    fn fail(&self, err: ApiError) -> ApiError {
        self.auth.mark_error(err.user_message());
        err
    }
}
