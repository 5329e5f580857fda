//! Session lifecycle tests: login, restore, refresh failure, logout races.

use std::time::Duration;

use secrecy::SecretString;

use tillpoint_client::types::Registration;
use tillpoint_client::{AuthError, PersistentStore, SessionStatus};
use tillpoint_integration_tests::{PASSWORD, TAKEN_USERNAME, TestContext, USERNAME, mint_jwt};

/// Store key the session manager persists the pair under.
const TOKENS_KEY: &str = "auth.tokens";

#[tokio::test]
async fn test_login_success_fetches_profile() {
    let ctx = TestContext::new().await;

    ctx.login().await;

    assert!(ctx.session.is_authenticated());
    assert_eq!(ctx.session.status(), SessionStatus::Authenticated);

    let user = ctx.session.current_user().expect("profile loaded");
    assert_eq!(user.username, USERNAME);
    assert_eq!(user.email, "demo@example.com");

    // The pair is durable.
    assert!(ctx.store.get(TOKENS_KEY).expect("store").is_some());
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let ctx = TestContext::new().await;

    let err = ctx
        .session
        .login(USERNAME, &SecretString::from("wrong"))
        .await
        .expect_err("must reject");

    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(!ctx.session.is_authenticated());
    assert!(ctx.store.get(TOKENS_KEY).expect("store").is_none());
}

#[tokio::test]
async fn test_restore_session_after_restart() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    // Fresh manager over the same store: the "process restart".
    let restarted = ctx.restarted_session();
    assert!(!restarted.is_authenticated());

    assert!(restarted.restore_session().await);
    assert!(restarted.is_authenticated());
    assert_eq!(
        restarted.current_user().map(|u| u.username),
        Some(USERNAME.to_string())
    );

    // The persisted access token was still live, so no exchange happened.
    assert_eq!(ctx.backend.refresh_calls(), 0);
}

#[tokio::test]
async fn test_restore_refreshes_expired_access_token() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    // Age the persisted access token past its window, keeping the (still
    // valid) refresh token - the state a terminal wakes up in after a night
    // powered off.
    let raw = ctx
        .store
        .get(TOKENS_KEY)
        .expect("store")
        .expect("pair persisted");
    let mut pair: serde_json::Value = serde_json::from_str(&raw).expect("decode pair");
    pair["access"] =
        serde_json::Value::String(mint_jwt(chrono::Utc::now().timestamp() - 10, 1, 999));
    ctx.store
        .put(TOKENS_KEY, &pair.to_string())
        .expect("reseed store");

    let restarted = ctx.restarted_session();
    assert!(restarted.restore_session().await);
    assert!(restarted.is_authenticated());
    assert_eq!(ctx.backend.refresh_calls(), 1);
}

#[tokio::test]
async fn test_refresh_failure_is_an_involuntary_logout() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    ctx.backend.set_fail_refresh(true);

    let err = ctx.session.refresh().await.expect_err("refresh must fail");
    assert!(matches!(err, AuthError::NotAuthenticated));

    // Fail closed: no stale authenticated state, no persisted tokens.
    assert!(!ctx.session.is_authenticated());
    assert!(ctx.store.get(TOKENS_KEY).expect("store").is_none());
}

#[tokio::test]
async fn test_logout_discards_inflight_refresh() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    // Slow the exchange down so logout lands while it is in flight.
    ctx.backend.set_refresh_delay(Duration::from_millis(400));

    let session = ctx.session.clone();
    let refresh = tokio::spawn(async move { session.refresh().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    ctx.session.logout();

    // The refresh's eventual success must be discarded, not silently
    // re-authenticate the user.
    assert!(refresh.await.expect("join").is_err());
    assert!(!ctx.session.is_authenticated());
    assert!(ctx.store.get(TOKENS_KEY).expect("store").is_none());
}

#[tokio::test]
async fn test_concurrent_refreshes_coalesce() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    ctx.backend.set_refresh_delay(Duration::from_millis(300));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let session = ctx.session.clone();
        handles.push(tokio::spawn(async move { session.refresh().await }));
    }

    for handle in handles {
        handle.await.expect("join").expect("refresh outcome shared");
    }

    // One exchange reached the server; the other four attached to it.
    assert_eq!(ctx.backend.refresh_calls(), 1);
    assert!(ctx.session.is_authenticated());
}

#[tokio::test]
async fn test_register_success() {
    let ctx = TestContext::new().await;

    let user = ctx
        .session
        .register(&Registration {
            username: "newcashier".to_string(),
            email: "new@example.com".to_string(),
            password: PASSWORD.to_string(),
            first_name: String::new(),
            last_name: String::new(),
        })
        .await
        .expect("register");

    assert_eq!(user.username, "newcashier");
    // Registration does not log the user in.
    assert!(!ctx.session.is_authenticated());
}

#[tokio::test]
async fn test_register_surfaces_server_rejection() {
    let ctx = TestContext::new().await;

    let err = ctx
        .session
        .register(&Registration {
            username: TAKEN_USERNAME.to_string(),
            email: "taken@example.com".to_string(),
            password: PASSWORD.to_string(),
            first_name: String::new(),
            last_name: String::new(),
        })
        .await
        .expect_err("must reject");

    match err {
        AuthError::Registration(message) => assert_eq!(message, "Username already exists"),
        other => panic!("unexpected error: {other}"),
    }
}

