//! Integration tests for the session lifecycle.


use std::sync::Arc;

use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use examdeck::api::ApiClient;
use examdeck::error::ApiErrorKind;
use fixtures::{profile_json, test_config, test_session};

const TOKEN: &str = "tok-1234567890abcdef";

/// Test: sign_in persists the token, validates it, and publishes the
/// authenticated state.
#[tokio::test]
async fn test_sign_in_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/mobile/login"))
        .and(body_json(serde_json::json!({
            "email": "tess@example.com",
            "password": "hunter2"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token": TOKEN
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", format!("Bearer {TOKEN}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json("u1")))
        .expect(1)
        .mount(&server)
        .await;

    let (_temp, store, session) = test_session(&server.uri());
    let rx = session.subscribe();

    session.sign_in("tess@example.com", "hunter2").await.unwrap();

    let state = session.snapshot();
    assert!(state.is_authenticated());
    assert_eq!(state.token.as_deref(), Some(TOKEN));
    assert_eq!(state.profile.as_ref().unwrap().id, "u1");
    assert_eq!(store.load().unwrap().as_deref(), Some(TOKEN));

    // Subscribers see the final authenticated snapshot.
    assert!(rx.borrow().validated);
}

/// Test: a rejected credential exchange fails with Authentication and
/// stores nothing.
#[tokio::test]
async fn test_sign_in_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/mobile/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "message": "invalid credentials"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_temp, store, session) = test_session(&server.uri());
    let err = session
        .sign_in("tess@example.com", "wrong")
        .await
        .unwrap_err();

    assert_eq!(err.kind, ApiErrorKind::Authentication);
    assert!(err.message.contains("401"));
    assert!(err.message.contains("invalid credentials"));
    assert_eq!(store.load().unwrap(), None);
    assert!(!session.snapshot().is_authenticated());
}

/// Test: a login whose token fails validation is a failed login, and
/// the briefly-persisted token is discarded again.
#[tokio::test]
async fn test_sign_in_validation_failure_discards_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/mobile/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "token": TOKEN })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (_temp, store, session) = test_session(&server.uri());
    let err = session
        .sign_in("tess@example.com", "hunter2")
        .await
        .unwrap_err();

    assert_eq!(err.kind, ApiErrorKind::Validation);
    assert_eq!(store.load().unwrap(), None);
    let state = session.snapshot();
    assert!(state.token.is_none());
    assert!(!state.validated);
}

/// Test: initialize validates a persisted token and restores the session.
#[tokio::test]
async fn test_initialize_restores_persisted_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", format!("Bearer {TOKEN}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json("u1")))
        .expect(1)
        .mount(&server)
        .await;

    let (_temp, store, session) = test_session(&server.uri());
    store.save(TOKEN).unwrap();

    session.initialize().await;

    let state = session.snapshot();
    assert!(state.is_authenticated());
    assert!(!state.loading);
}

/// Test: a token the server rejects is purged from storage and memory.
#[tokio::test]
async fn test_confirmed_invalid_token_purged() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (_temp, store, session) = test_session(&server.uri());
    store.save(TOKEN).unwrap();

    session.initialize().await;

    assert_eq!(store.load().unwrap(), None);
    let state = session.snapshot();
    assert!(state.token.is_none());
    assert!(!state.validated);
}

/// Test: a validation attempt that fails at the transport level keeps
/// the stored token (transient outage must not log the user out).
#[tokio::test]
async fn test_network_failure_keeps_stored_token() {
    // Nothing listens here: connection refused, not an HTTP rejection.
    let (_temp, store, session) = test_session("http://127.0.0.1:9");
    store.save(TOKEN).unwrap();

    session.initialize().await;

    assert_eq!(store.load().unwrap().as_deref(), Some(TOKEN));
    let state = session.snapshot();
    assert!(!state.validated);
    assert_eq!(state.token.as_deref(), Some(TOKEN));
}

/// Test: sign_out clears everything even when the remote logout fails.
#[tokio::test]
async fn test_sign_out_unconditional() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/mobile/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "token": TOKEN })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json("u1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let (_temp, store, session) = test_session(&server.uri());
    session.sign_in("tess@example.com", "hunter2").await.unwrap();

    session.sign_out().await;

    assert_eq!(store.load().unwrap(), None);
    let state = session.snapshot();
    assert!(state.token.is_none());
    assert!(state.profile.is_none());
    assert!(!state.validated);
    assert!(!state.loading);
}

/// Test: a 401 on any authenticated call ends the session the same way
/// a failed validation does.
#[tokio::test]
async fn test_request_helper_401_forces_invalidation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json("u1")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/exam/teacher/collections/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (_temp, store, session) = test_session(&server.uri());
    store.save(TOKEN).unwrap();
    session.initialize().await;
    assert!(session.snapshot().is_authenticated());

    let session = Arc::new(session);
    let client = ApiClient::new(&test_config(&server.uri()), Arc::clone(&session)).unwrap();

    let err = client
        .get::<serde_json::Value>("/exam/teacher/collections/")
        .await
        .unwrap_err();

    assert_eq!(err.kind, ApiErrorKind::Unauthorized);
    assert!(err.is_unauthorized());
    assert_eq!(store.load().unwrap(), None);
    assert!(!session.snapshot().is_authenticated());
}
