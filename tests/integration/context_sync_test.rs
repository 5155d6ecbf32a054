//! Cross-context token synchronization

use anyhow::Result;
use rentguy_state::{AuthStatus, AuthUser, KeyValueStorage, PersistedAuth};

use crate::test_harness::{wait_for, TwoTabs};

const UNUSED_API: &str = "http://127.0.0.1:9";

#[tokio::test]
async fn test_offline_login_reaches_other_context() -> Result<()> {
    let tabs = TwoTabs::new(UNUSED_API);
    tabs.start_bridges();

    let status = tabs.a.session().login("demo@rentguy.test", "demo").await?;
    assert_eq!(status, AuthStatus::Offline);

    wait_for(|| tabs.b.auth().status() == AuthStatus::Offline).await?;
    assert_eq!(tabs.b.auth().token().as_deref(), Some("offline-demo"));

    tabs.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_logout_propagates_and_stays_quiet_locally() -> Result<()> {
    let tabs = TwoTabs::new(UNUSED_API);
    tabs.start_bridges();

    tabs.a
        .auth()
        .set_credentials("jwt-1", Some(AuthUser::with_email("a@b.com")));
    wait_for(|| tabs.b.auth().token().as_deref() == Some("jwt-1")).await?;
    assert_eq!(tabs.b.auth().status(), AuthStatus::Authenticated);

    tabs.a.session().logout();
    assert_eq!(tabs.a.auth().state().error, None);

    wait_for(|| tabs.b.auth().token().is_none()).await?;
    assert_eq!(tabs.b.auth().status(), AuthStatus::Idle);
    assert_eq!(tabs.shared.get_item(&tabs.a.auth().settings().token_key)?, None);

    tabs.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_peer_sync_keeps_saved_user() -> Result<()> {
    let tabs = TwoTabs::new(UNUSED_API);
    tabs.start_bridges();

    let user = AuthUser::with_email("a@b.com");
    tabs.a.auth().set_credentials("jwt-1", Some(user.clone()));
    wait_for(|| tabs.b.auth().token().as_deref() == Some("jwt-1")).await?;
    assert_eq!(tabs.b.auth().user(), Some(user.clone()));

    let storage_key = tabs.a.auth().settings().storage_key.clone();
    let raw = tabs
        .shared
        .get_item(&storage_key)?
        .ok_or_else(|| anyhow::anyhow!("auth document missing"))?;
    let persisted: PersistedAuth = serde_json::from_str(&raw)?;
    assert_eq!(persisted.token.as_deref(), Some("jwt-1"));
    assert_eq!(persisted.user, Some(user));
    assert_eq!(persisted.status, AuthStatus::Authenticated);

    tabs.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_foreign_removal_reads_as_expiry() -> Result<()> {
    let tabs = TwoTabs::new(UNUSED_API);
    tabs.start_bridges();

    tabs.b
        .auth()
        .set_credentials("offline-demo", Some(AuthUser::with_email("demo@rentguy.test")));
    wait_for(|| tabs.a.auth().status() == AuthStatus::Offline).await?;

    // Another context drops the token without signalling a manual logout
    let token_key = tabs.a.auth().settings().token_key.clone();
    tabs.b.storage().remove_item(&token_key)?;

    wait_for(|| tabs.a.auth().status() == AuthStatus::Idle).await?;
    assert_eq!(
        tabs.a.auth().state().error.as_deref(),
        Some(tabs.a.auth().settings().session_expired_message.as_str())
    );

    tabs.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_own_writes_are_ignored() -> Result<()> {
    let tabs = TwoTabs::new(UNUSED_API);
    tabs.a.start_token_bridge();

    tabs.a
        .auth()
        .set_credentials("jwt-1", Some(AuthUser::with_email("a@b.com")));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // Still authenticated: the bridge did not re-sync its own write
    assert_eq!(tabs.a.auth().status(), AuthStatus::Authenticated);
    assert!(tabs.channel.stats().events_published > 0);

    tabs.shutdown().await;
    Ok(())
}
