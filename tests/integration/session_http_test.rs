//! Session flows against a mock HTTP backend

use anyhow::Result;
use mockito::Matcher;
use rentguy_state::{AppContext, AuthStatus, ErrorCode, LoadStatus, StorageChannel};

use crate::test_harness::test_config;

fn context_for(server: &mockito::ServerGuard) -> AppContext {
    let capacity = 8;
    AppContext::new(
        test_config(&server.url()),
        std::sync::Arc::new(rentguy_state::MemoryStorage::new()),
        StorageChannel::new(capacity),
    )
}

#[tokio::test]
async fn test_login_then_load_domain_data() -> Result<()> {
    let mut server = mockito::Server::new_async().await;

    let login = server
        .mock("POST", "/api/v1/auth/login")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "email": "ada@rentguy.test",
            "password": "secret"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"jwt-123","token_type":"bearer"}"#)
        .create_async()
        .await;
    let me = server
        .mock("GET", "/api/v1/auth/me")
        .match_header("authorization", "Bearer jwt-123")
        .with_status(200)
        .with_body(r#"{"id":1,"email":"ada@rentguy.test","role":"admin"}"#)
        .create_async()
        .await;
    let items = server
        .mock("GET", "/api/v1/inventory/items")
        .match_header("authorization", "Bearer jwt-123")
        .with_status(200)
        .with_body(r#"[{"id":10,"name":"Line array"},{"id":11,"name":"Truss 3m"}]"#)
        .create_async()
        .await;
    let projects = server
        .mock("GET", "/api/v1/projects")
        .with_status(200)
        .with_body(r#"{"items":[{"id":5,"name":"Festival"}]}"#)
        .create_async()
        .await;
    let invoices = server
        .mock("GET", "/api/v1/invoices")
        .with_status(403)
        .with_body(r#"{"detail":"Finance role required"}"#)
        .create_async()
        .await;

    let ctx = context_for(&server);

    let status = ctx.session().login("ada@rentguy.test", "secret").await?;
    assert_eq!(status, AuthStatus::Authenticated);
    assert_eq!(ctx.summary().role.as_deref(), Some("admin"));

    let report = ctx.stores().load_all(ctx.api()).await;
    assert_eq!(report.equipment.as_ref().ok(), Some(&2));
    assert_eq!(report.projects.as_ref().ok(), Some(&1));
    assert!(!report.all_ok());
    assert_eq!(ctx.stores().invoices.status(), LoadStatus::Failed);
    assert_eq!(
        ctx.stores().invoices.error().as_deref(),
        Some("Finance role required")
    );

    login.assert_async().await;
    me.assert_async().await;
    items.assert_async().await;
    projects.assert_async().await;
    invoices.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_rejected_login_sets_error() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let login = server
        .mock("POST", "/api/v1/auth/login")
        .with_status(401)
        .with_body(r#"{"detail":"Incorrect email or password"}"#)
        .create_async()
        .await;

    let ctx = context_for(&server);
    let err = ctx
        .session()
        .login("ada@rentguy.test", "wrong")
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::Unauthorized);
    let state = ctx.auth().state();
    assert_eq!(state.status, AuthStatus::Error);
    assert_eq!(state.error.as_deref(), Some("Incorrect email or password"));
    assert_eq!(state.token, None);

    login.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_expired_token_on_check() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let me = server
        .mock("GET", "/api/v1/auth/me")
        .with_status(401)
        .with_body(r#"{"detail":"Token expired"}"#)
        .create_async()
        .await;

    let ctx = context_for(&server);
    ctx.auth().set_credentials(
        "stale-jwt",
        Some(rentguy_state::AuthUser::with_email("ada@rentguy.test")),
    );

    let err = ctx.session().check_session().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(ctx.auth().status(), AuthStatus::Idle);
    assert_eq!(
        ctx.auth().state().error.as_deref(),
        Some(ctx.auth().settings().session_expired_message.as_str())
    );

    me.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_role_refresh() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let role = server
        .mock("GET", "/api/v1/auth/role")
        .match_header("authorization", "Bearer jwt-9")
        .with_status(200)
        .with_body(r#"{"role":"warehouse"}"#)
        .create_async()
        .await;

    let ctx = context_for(&server);
    ctx.auth().set_credentials(
        "jwt-9",
        Some(rentguy_state::AuthUser::with_email("sam@rentguy.test")),
    );

    let refreshed = ctx.session().refresh_role().await?;
    assert_eq!(refreshed.as_deref(), Some("warehouse"));
    assert_eq!(ctx.summary().role.as_deref(), Some("warehouse"));

    role.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() -> Result<()> {
    let ctx = AppContext::standalone(test_config("http://127.0.0.1:9"));
    ctx.auth().set_credentials(
        "jwt",
        Some(rentguy_state::AuthUser::with_email("ada@rentguy.test")),
    );

    let err = ctx.session().check_session().await.unwrap_err();
    assert!(matches!(err.code, ErrorCode::Network | ErrorCode::Timeout));
    assert_eq!(ctx.auth().status(), AuthStatus::Error);
    assert_eq!(ctx.auth().token().as_deref(), Some("jwt"));
    Ok(())
}
