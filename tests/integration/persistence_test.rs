//! Session persistence across restarts on file-backed storage

use std::sync::Arc;

use anyhow::Result;
use rentguy_state::{AppContext, AuthStatus, AuthUser, FileStorage, KeyValueStorage, StorageChannel};

use crate::test_harness::{temp_storage_path, test_config};

fn open_context(path: &std::path::Path) -> Result<AppContext> {
    let storage = FileStorage::open(path)?;
    Ok(AppContext::new(
        test_config("http://127.0.0.1:9"),
        Arc::new(storage),
        StorageChannel::new(8),
    ))
}

#[tokio::test]
async fn test_offline_session_survives_restart() -> Result<()> {
    let path = temp_storage_path();

    {
        let ctx = open_context(&path)?;
        ctx.session().login("demo@rentguy.test", "demo").await?;
        assert_eq!(ctx.auth().status(), AuthStatus::Offline);
    }

    let ctx = open_context(&path)?;
    let summary = ctx.summary();
    assert_eq!(summary.status, AuthStatus::Offline);
    assert!(summary.has_token);
    assert_eq!(summary.user.as_deref(), Some("Demo"));
    // The offline notice is not persisted
    assert_eq!(summary.error, None);

    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
    Ok(())
}

#[tokio::test]
async fn test_transient_status_is_not_restored() -> Result<()> {
    let path = temp_storage_path();

    {
        let ctx = open_context(&path)?;
        ctx.auth()
            .set_credentials("jwt", Some(AuthUser::with_email("a@b.com")));
        ctx.auth().mark_error("Server unreachable");
    }

    let ctx = open_context(&path)?;
    let state = ctx.auth().state();
    assert_eq!(state.token.as_deref(), Some("jwt"));
    assert_eq!(state.status, AuthStatus::Idle);
    assert_eq!(state.error, None);

    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
    Ok(())
}

#[tokio::test]
async fn test_reset_wipes_file() -> Result<()> {
    let path = temp_storage_path();

    let ctx = open_context(&path)?;
    ctx.auth()
        .set_credentials("jwt", Some(AuthUser::with_email("a@b.com")));
    ctx.auth().reset();

    let reopened = FileStorage::open(&path)?;
    assert!(reopened.keys()?.is_empty());

    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
    Ok(())
}
