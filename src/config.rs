use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::error::ConfigError;

// Default configuration values
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_API_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_AUTH_STORAGE_KEY: &str = "rentguy.auth";
pub const DEFAULT_TOKEN_KEY: &str = "rentguy.token";
pub const DEFAULT_MANUAL_LOGOUT_KEY: &str = "rentguy.manual-logout";
pub const DEFAULT_OFFLINE_TOKEN_PREFIX: &str = "offline-";
pub const DEFAULT_SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";
pub const DEFAULT_OFFLINE_NOTICE: &str = "Working offline with the demo catalogue.";
pub const DEFAULT_STORAGE_FILE: &str = "rentguy-storage.json";
pub const DEFAULT_BROADCAST_CAPACITY: usize = 100;

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

/// REST backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL the `/api/v1/...` paths are appended to
    #[serde(default = "default_api_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_seconds: u64,
}

/// Authentication store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Key holding the persisted `{token, user, status}` document
    #[serde(default = "default_auth_storage_key")]
    pub storage_key: String,
    /// Key mirroring the bare session token
    #[serde(default = "default_token_key")]
    pub token_key: String,
    /// Session-area key of the one-shot manual logout flag
    #[serde(default = "default_manual_logout_key")]
    pub manual_logout_key: String,
    /// Tokens starting with this prefix are offline demo tokens
    #[serde(default = "default_offline_token_prefix")]
    pub offline_token_prefix: String,
    /// Message shown when the token disappears unexpectedly
    #[serde(default = "default_session_expired_message")]
    pub session_expired_message: String,
    /// Message attached when signing in against the offline catalogue
    #[serde(default = "default_offline_notice")]
    pub offline_notice: String,
    /// Offline demo catalogue
    #[serde(default)]
    pub offline_accounts: Vec<OfflineAccount>,
}

/// An account that signs in without a server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineAccount {
    pub email: String,
    pub password: String,
    /// Token stored on sign-in; must carry the offline prefix
    pub token: String,
    #[serde(default)]
    pub user: AuthUser,
}

/// Device storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file backing the shared storage area
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

/// Storage broadcast configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Events buffered per subscriber before it lags
    #[serde(default = "default_broadcast_capacity")]
    pub capacity: usize,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|val| !val.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

// Default functions
fn default_api_url() -> String {
    env_string("RENTGUY_API_URL", DEFAULT_API_URL)
}

fn default_api_timeout() -> u64 {
    env_or("RENTGUY_API_TIMEOUT_SECONDS", DEFAULT_API_TIMEOUT_SECONDS)
}

fn default_auth_storage_key() -> String {
    env_string("RENTGUY_AUTH_STORAGE_KEY", DEFAULT_AUTH_STORAGE_KEY)
}

fn default_token_key() -> String {
    env_string("RENTGUY_TOKEN_KEY", DEFAULT_TOKEN_KEY)
}

fn default_manual_logout_key() -> String {
    env_string("RENTGUY_MANUAL_LOGOUT_KEY", DEFAULT_MANUAL_LOGOUT_KEY)
}

fn default_offline_token_prefix() -> String {
    env_string("RENTGUY_OFFLINE_TOKEN_PREFIX", DEFAULT_OFFLINE_TOKEN_PREFIX)
}

fn default_session_expired_message() -> String {
    env_string("RENTGUY_SESSION_EXPIRED_MESSAGE", DEFAULT_SESSION_EXPIRED_MESSAGE)
}

fn default_offline_notice() -> String {
    env_string("RENTGUY_OFFLINE_NOTICE", DEFAULT_OFFLINE_NOTICE)
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(env_string("RENTGUY_STORAGE_PATH", DEFAULT_STORAGE_FILE))
}

fn default_broadcast_capacity() -> usize {
    env_or("RENTGUY_BROADCAST_CAPACITY", DEFAULT_BROADCAST_CAPACITY)
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_seconds: default_api_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            storage_key: default_auth_storage_key(),
            token_key: default_token_key(),
            manual_logout_key: default_manual_logout_key(),
            offline_token_prefix: default_offline_token_prefix(),
            session_expired_message: default_session_expired_message(),
            offline_notice: default_offline_notice(),
            offline_accounts: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            capacity: default_broadcast_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, writing the default file if missing
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save(path)?;
            info!("Created default configuration at {}", path.display());
            return Ok(config);
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Loaded configuration from {}", path.display());

        Ok(config)
    }

    /// Save configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |reason: String| ConfigError::Write {
            path: path.display().to_string(),
            reason,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
            }
        }
        let raw = serde_json::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, raw).map_err(|e| write_err(e.to_string()))?;
        debug!("Saved configuration to {}", path.display());

        Ok(())
    }
}

/// Path of the configuration file (`RENTGUY_CONFIG_PATH` or `rentguy.json`)
pub fn config_path() -> PathBuf {
    std::env::var("RENTGUY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("rentguy.json"))
}

/// Load the application configuration
pub fn load_config() -> Result<Config, ConfigError> {
    Config::load(&config_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"api": {"base_url": "https://api.rentguy.test"}, "auth": {"offline_token_prefix": "demo-"}}"#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://api.rentguy.test");
        assert_eq!(config.auth.offline_token_prefix, "demo-");
        assert!(!config.auth.storage_key.is_empty());
        assert!(config.broadcast.capacity > 0);
        assert!(config.auth.offline_accounts.is_empty());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = std::env::temp_dir().join(format!("rentguy-config-{}", Uuid::new_v4()));
        let path = dir.join("rentguy.json");

        let created = Config::load(&path).unwrap();
        assert!(path.exists());

        let loaded = Config::load(&path).unwrap();
        assert_eq!(created, loaded);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("rentguy-config-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rentguy.json");
        std::fs::write(&path, "{ nope").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));

        let _ = std::fs::remove_dir_all(dir);
    }
}
