//! Route-level tests driving the router directly over the in-memory
//! store, covering the request/response contract Terraform's HTTP
//! backend relies on.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http_body_util::BodyExt;
use tower::ServiceExt;

use state_gateway::config::Config;
use state_gateway::gateway::StateGateway;
use state_gateway::http::auth::BasicAccounts;
use state_gateway::http::{build_router, AppState};
use state_gateway::lifecycle::{ShutdownCause, ShutdownHandle};
use state_gateway::lock::LockCoordinator;
use state_gateway::store::MemoryStore;

fn test_router(
    config: &Config,
    store: Arc<MemoryStore>,
    accounts: Option<BasicAccounts>,
) -> (Router, ShutdownHandle) {
    let shutdown = ShutdownHandle::new();
    let state = AppState {
        gateway: Arc::new(StateGateway::new(store.clone(), config.legacy.clone())),
        locks: Arc::new(LockCoordinator::new(
            store.clone(),
            Duration::from_millis(100),
            Duration::from_millis(10),
        )),
        store,
        shutdown: shutdown.clone(),
    };
    (build_router(config, state, accounts), shutdown)
}

async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

async fn put_state_blob(router: &Router, uri: &str, blob: &'static [u8]) -> StatusCode {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(uri)
                .header(header::CONTENT_LENGTH, blob.len())
                .body(Body::from(blob))
                .unwrap(),
        )
        .await
        .unwrap();
    response.status()
}

#[tokio::test]
async fn test_lock_acquire_contest_release_cycle() {
    let config = Config::default();
    let (router, _) = test_router(&config, Arc::new(MemoryStore::new()), None);

    let (status, body) = send(&router, "PUT", "/lock?state=proj1&lease_ttl=60").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    // Second acquisition before release: contested, not a server error.
    let (status, body) = send(&router, "PUT", "/lock?state=proj1").await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["status"], "locked");

    let (status, _) = send(&router, "DELETE", "/lock?state=proj1").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router, "PUT", "/lock?state=proj1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_release_without_lock_is_ok() {
    let config = Config::default();
    let (router, _) = test_router(&config, Arc::new(MemoryStore::new()), None);

    let (status, body) = send(&router, "DELETE", "/lock?state=never-locked").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_state_param_is_bad_request() {
    let config = Config::default();
    let (router, _) = test_router(&config, Arc::new(MemoryStore::new()), None);

    for (method, uri) in [
        ("PUT", "/lock"),
        ("DELETE", "/lock"),
        ("GET", "/state"),
        ("PUT", "/state"),
        ("DELETE", "/state"),
    ] {
        let (status, body) = send(&router, method, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", method, uri);
        assert_eq!(body["error"], "State query parameter is missing");
    }
}

#[tokio::test]
async fn test_malformed_lease_ttl_is_bad_request() {
    let config = Config::default();
    let (router, _) = test_router(&config, Arc::new(MemoryStore::new()), None);

    let (status, body) = send(&router, "PUT", "/lock?state=proj1&lease_ttl=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Lease ttl needs to be in integer format");

    let (status, _) = send(&router, "PUT", "/lock?state=proj1&lease_ttl=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_state_put_get_delete_cycle() {
    let config = Config::default();
    let (router, _) = test_router(&config, Arc::new(MemoryStore::new()), None);

    let status = put_state_blob(&router, "/state?state=proj1", b"{\"v\":1}").await;
    assert_eq!(status, StatusCode::OK);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/state?state=proj1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "7");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"{\"v\":1}");

    let (status, body) = send(&router, "DELETE", "/state?state=proj1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "proj1/state");

    let (status, body) = send(&router, "GET", "/state?state=proj1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "not found");
}

#[tokio::test]
async fn test_put_state_reports_derived_key() {
    let config = Config::default();
    let (router, _) = test_router(&config, Arc::new(MemoryStore::new()), None);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/state?state=proj1")
                .header(header::CONTENT_LENGTH, 3)
                .body(Body::from(&b"abc"[..]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["state"], "proj1/state");
}

#[tokio::test]
async fn test_put_state_requires_content_length() {
    let config = Config::default();
    let (router, _) = test_router(&config, Arc::new(MemoryStore::new()), None);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/state?state=proj1")
                .body(Body::from(&b"abc"[..]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_put_state_length_mismatch_is_error() {
    let config = Config::default();
    let store = Arc::new(MemoryStore::new());
    let (router, _) = test_router(&config, store.clone(), None);

    // Declared length disagrees with the body actually received; the
    // blob must be rejected, not stored truncated.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/state?state=proj1")
                .header(header::CONTENT_LENGTH, 10)
                .body(Body::from(&b"abc"[..]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!store.has_chunked("proj1/state"));
}

#[tokio::test]
async fn test_legacy_read_fallback_over_http() {
    let mut config = Config::default();
    config.legacy.read = true;
    let store = Arc::new(MemoryStore::new());
    store.seed_plain("proj1default", b"legacy-blob");
    let (router, _) = test_router(&config, store, None);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/state?state=proj1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"legacy-blob");
}

#[tokio::test]
async fn test_legacy_clear_after_put() {
    let mut config = Config::default();
    config.legacy.clear = true;
    let store = Arc::new(MemoryStore::new());
    store.seed_plain("proj1default", b"legacy-blob");
    let (router, _) = test_router(&config, store.clone(), None);

    let status = put_state_blob(&router, "/state?state=proj1", b"new").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!store.has_plain("proj1default"));
}

#[tokio::test]
async fn test_backend_failure_is_server_error() {
    let config = Config::default();
    let store = Arc::new(MemoryStore::new());
    let (router, _) = test_router(&config, store.clone(), None);
    store.set_unavailable(true);

    let (status, body) = send(&router, "PUT", "/lock?state=proj1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains("store is down"));

    let (status, _) = send(&router, "GET", "/state?state=proj1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_health_reflects_store_reachability() {
    let config = Config::default();
    let store = Arc::new(MemoryStore::new());
    let (router, _) = test_router(&config, store.clone(), None);

    let (status, body) = send(&router, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    store.set_unavailable(true);
    let (status, _) = send(&router, "GET", "/health").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_termination_route_absent_by_default() {
    let config = Config::default();
    let (router, shutdown) = test_router(&config, Arc::new(MemoryStore::new()), None);

    let (status, _) = send(&router, "POST", "/termination").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!shutdown.is_triggered());
}

#[tokio::test]
async fn test_termination_route_signals_shutdown() {
    let mut config = Config::default();
    config.server.remote_termination = true;
    let (router, shutdown) = test_router(&config, Arc::new(MemoryStore::new()), None);

    let (status, body) = send(&router, "POST", "/termination").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(shutdown.is_triggered());
    assert_eq!(shutdown.wait().await, ShutdownCause::Remote);
}

#[tokio::test]
async fn test_basic_auth_gates_all_routes() {
    let config = Config::default();
    let mut accounts = HashMap::new();
    accounts.insert("terraform".to_string(), "hunter2".to_string());
    let (router, _) = test_router(
        &config,
        Arc::new(MemoryStore::new()),
        Some(BasicAccounts::from_map(accounts)),
    );

    // No credentials.
    let (status, _) = send(&router, "GET", "/health").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Wrong credentials.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(
                    header::AUTHORIZATION,
                    format!("Basic {}", BASE64.encode("terraform:wrong")),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Valid credentials.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(
                    header::AUTHORIZATION,
                    format!("Basic {}", BASE64.encode("terraform:hunter2")),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
