//! Shared helpers for integration tests

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use rentguy_state::config::OfflineAccount;
use rentguy_state::{AppContext, AuthUser, Config, KeyValueStorage, MemoryStorage, StorageChannel};
use uuid::Uuid;

/// Configuration pointing at `base_url`, with one offline demo account
pub fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.api.timeout_seconds = 5;
    config.auth.offline_accounts = vec![OfflineAccount {
        email: "demo@rentguy.test".to_string(),
        password: "demo".to_string(),
        token: "offline-demo".to_string(),
        user: AuthUser {
            first_name: Some("Demo".to_string()),
            role: Some("planner".to_string()),
            ..Default::default()
        },
    }];
    config
}

/// Two contexts over one storage backend and channel, like two tabs
pub struct TwoTabs {
    pub shared: Arc<dyn KeyValueStorage>,
    pub channel: StorageChannel,
    pub a: AppContext,
    pub b: AppContext,
}

impl TwoTabs {
    pub fn new(base_url: &str) -> Self {
        let shared: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());
        let channel = StorageChannel::new(32);
        let a = AppContext::new(test_config(base_url), Arc::clone(&shared), channel.clone());
        let b = AppContext::new(test_config(base_url), Arc::clone(&shared), channel.clone());
        Self { shared, channel, a, b }
    }

    pub fn start_bridges(&self) {
        self.a.start_token_bridge();
        self.b.start_token_bridge();
    }

    pub async fn shutdown(&self) {
        self.a.shutdown().await;
        self.b.shutdown().await;
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_for<F: Fn() -> bool>(condition: F) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .map_err(|_| anyhow!("condition not reached within 2s"))
}

/// A fresh path under the system temp directory
pub fn temp_storage_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("rentguy-it-{}", Uuid::new_v4()))
        .join("storage.json")
}
