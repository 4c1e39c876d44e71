// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the worker HTTP API.
//!
//! Uses `axum_test::TestServer`, without real TCP.

use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use gateway_worker::config::WorkerConfig;
use gateway_worker::gateway::{Gateway, Outbound};
use gateway_worker::session;
use gateway_worker::test_support::drain;
use gateway_worker::transport::{build_router, AppState};
use gateway_worker::worker::NoopHandler;

fn test_state(config: WorkerConfig) -> anyhow::Result<Arc<AppState>> {
    Ok(Arc::new(AppState::new(config, Arc::new(NoopHandler), CancellationToken::new())?))
}

fn test_server(state: Arc<AppState>) -> anyhow::Result<TestServer> {
    TestServer::new(build_router(state)).map_err(|e| anyhow::anyhow!("test server: {e}"))
}

/// Register a client and run the connect challenge. Returns id, token, and
/// the client's outbound queue.
fn connect(
    state: &AppState,
) -> anyhow::Result<(String, String, tokio::sync::mpsc::UnboundedReceiver<Outbound>)> {
    let (client_id, mut rx) = state.gateway.register();
    state.worker.on_connect(&client_id)?;
    drain(&mut rx);
    let stored = state.gateway.get_session(&client_id).unwrap_or_default();
    let token = session::auth_token(&stored).map(str::to_owned).unwrap_or_default();
    Ok((client_id, token, rx))
}

#[tokio::test]
async fn health_reports_connection_count() -> anyhow::Result<()> {
    let state = test_state(WorkerConfig::test())?;
    let _a = connect(&state)?;
    let _b = connect(&state)?;

    let server = test_server(state)?;
    let resp = server.get("/api/v1/health").await;
    resp.assert_status_ok();

    let body: Value = resp.json();
    assert_eq!(body["status"], "running");
    assert_eq!(body["connections"], 2);
    Ok(())
}

#[tokio::test]
async fn config_uses_forwarded_proto_and_host() -> anyhow::Result<()> {
    let server = test_server(test_state(WorkerConfig::test())?)?;

    let resp = server
        .get("/api/v1/config")
        .add_header("x-forwarded-host", HeaderValue::from_static("chat.example.test"))
        .add_header("x-forwarded-proto", HeaderValue::from_static("http"))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(
        body,
        json!({
            "code": 0,
            "data": {
                "url": "ws://chat.example.test",
                "websocket": "/websocket",
                "auth": "/api/v1/auth",
            },
            "msg": "ok",
        })
    );

    let resp = server
        .get("/api/v1/config")
        .add_header("x-forwarded-host", HeaderValue::from_static("chat.example.test"))
        .await;
    let body: Value = resp.json();
    assert_eq!(body["data"]["url"], "wss://chat.example.test");
    Ok(())
}

#[tokio::test]
async fn bind_with_issued_token() -> anyhow::Result<()> {
    let state = test_state(WorkerConfig::test())?;
    let (client_id, token, _rx) = connect(&state)?;
    let server = test_server(Arc::clone(&state))?;

    let resp = server
        .post("/api/v1/auth")
        .json(&json!({ "client_id": client_id, "uid": "user1", "auth": token }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["bound"], true);
    assert_eq!(state.gateway.get_uid_by_client_id(&client_id).as_deref(), Some("user1"));
    Ok(())
}

#[tokio::test]
async fn bind_with_wrong_token_is_false() -> anyhow::Result<()> {
    let state = test_state(WorkerConfig::test())?;
    let (client_id, _, _rx) = connect(&state)?;
    let server = test_server(Arc::clone(&state))?;

    let resp = server
        .post("/api/v1/auth")
        .json(&json!({ "client_id": client_id, "uid": "user1", "auth": "f".repeat(64) }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["bound"], false);
    assert_eq!(state.gateway.get_uid_by_client_id(&client_id), None);
    Ok(())
}

#[tokio::test]
async fn bind_with_short_token_is_400() -> anyhow::Result<()> {
    let state = test_state(WorkerConfig::test())?;
    let (client_id, _, _rx) = connect(&state)?;
    let server = test_server(state)?;

    let resp = server
        .post("/api/v1/auth")
        .json(&json!({ "client_id": client_id, "uid": "user1", "auth": "short" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");
    assert_eq!(body["error"]["message"], "auth parameter is empty or too short");
    Ok(())
}

#[tokio::test]
async fn join_groups_and_push_to_group() -> anyhow::Result<()> {
    let state = test_state(WorkerConfig::test())?;
    let (client_id, _, mut rx) = connect(&state)?;
    let server = test_server(Arc::clone(&state))?;

    let resp = server
        .post("/api/v1/groups")
        .json(&json!({ "client_id": client_id, "groups": ["room:1", "room:2"] }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["joined"], 2);

    let resp = server.post("/api/v1/send").json(&json!({ "group": "room:2", "message": "hello" })).await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["delivered"], 1);
    assert_eq!(drain(&mut rx), vec![Outbound::Text("hello".to_owned())]);
    Ok(())
}

#[tokio::test]
async fn join_groups_rejects_empty_name() -> anyhow::Result<()> {
    let state = test_state(WorkerConfig::test())?;
    let (client_id, _, _rx) = connect(&state)?;
    let server = test_server(Arc::clone(&state))?;

    let resp = server
        .post("/api/v1/groups")
        .json(&json!({ "client_id": client_id, "groups": ["room:1", ""] }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert!(state.gateway.groups_of(&client_id).is_empty());
    Ok(())
}

#[tokio::test]
async fn send_serializes_non_string_messages() -> anyhow::Result<()> {
    let state = test_state(WorkerConfig::test())?;
    let (client_id, _, mut rx) = connect(&state)?;
    let server = test_server(state)?;

    let resp = server
        .post("/api/v1/send")
        .json(&json!({ "client_id": client_id, "message": { "event": "notice", "n": 1 } }))
        .await;
    resp.assert_status_ok();
    assert_eq!(drain(&mut rx), vec![Outbound::Text(r#"{"event":"notice","n":1}"#.to_owned())]);
    Ok(())
}

#[tokio::test]
async fn send_requires_exactly_one_target() -> anyhow::Result<()> {
    let server = test_server(test_state(WorkerConfig::test())?)?;

    let resp = server.post("/api/v1/send").json(&json!({ "message": "x" })).await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = server.post("/api/v1/send").json(&json!({ "uid": "u", "all": true, "message": "x" })).await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = server.post("/api/v1/send").json(&json!({ "all": true })).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn send_to_unknown_client_is_404() -> anyhow::Result<()> {
    let server = test_server(test_state(WorkerConfig::test())?)?;
    let resp = server.post("/api/v1/send").json(&json!({ "client_id": "nope", "message": "x" })).await;
    resp.assert_status(StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn send_to_all_reaches_everyone() -> anyhow::Result<()> {
    let state = test_state(WorkerConfig::test())?;
    let (_, _, mut a) = connect(&state)?;
    let (_, _, mut b) = connect(&state)?;
    let server = test_server(state)?;

    let resp = server.post("/api/v1/send").json(&json!({ "all": true, "message": "bye" })).await;
    let body: Value = resp.json();
    assert_eq!(body["delivered"], 2);
    assert_eq!(drain(&mut a).len(), 1);
    assert_eq!(drain(&mut b).len(), 1);
    Ok(())
}

#[tokio::test]
async fn secret_key_protects_api_but_not_public_routes() -> anyhow::Result<()> {
    let config = WorkerConfig { secret_key: Some("secret-token".into()), ..WorkerConfig::test() };
    let server = test_server(test_state(config)?)?;

    server.get("/api/v1/health").await.assert_status_ok();
    server.get("/api/v1/config").await.assert_status_ok();

    let resp = server.post("/api/v1/send").json(&json!({ "all": true, "message": "x" })).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = server
        .post("/api/v1/send")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer wrong-token"))
        .json(&json!({ "all": true, "message": "x" }))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    let resp = server
        .post("/api/v1/send")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret-token"))
        .json(&json!({ "all": true, "message": "x" }))
        .await;
    resp.assert_status_ok();
    Ok(())
}
