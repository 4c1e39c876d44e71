// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `gateway-worker` binary and
//! exercise its HTTP and WebSocket surfaces.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use gateway_worker_specs::WorkerProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

type Ws = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn next_text(ws: &mut Ws) -> anyhow::Result<String> {
    let msg = tokio::time::timeout(TIMEOUT, ws.next())
        .await?
        .ok_or_else(|| anyhow::anyhow!("ws stream ended"))??;
    match msg {
        Message::Text(t) => Ok(t.to_string()),
        other => anyhow::bail!("expected text ws message, got: {other:?}"),
    }
}

/// Read the `init` challenge, returning `(client_id, auth)`.
async fn read_init(ws: &mut Ws) -> anyhow::Result<(String, String)> {
    let init: serde_json::Value = serde_json::from_str(&next_text(ws).await?)?;
    anyhow::ensure!(init["event"] == "init", "expected init, got {init}");
    Ok((
        init["client_id"].as_str().unwrap_or_default().to_owned(),
        init["auth"].as_str().unwrap_or_default().to_owned(),
    ))
}

// -- HTTP ---------------------------------------------------------------------

#[tokio::test]
async fn http_health() -> anyhow::Result<()> {
    let worker = WorkerProcess::start()?;
    worker.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/v1/health", worker.base_url())).await?.json().await?;

    assert_eq!(resp["status"], "running");
    assert_eq!(resp["connections"], 0);
    Ok(())
}

#[tokio::test]
async fn http_client_config() -> anyhow::Result<()> {
    let worker = WorkerProcess::start()?;
    worker.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value = reqwest::Client::new()
        .get(format!("{}/api/v1/config", worker.base_url()))
        .header("x-forwarded-proto", "http")
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(resp["code"], 0);
    assert_eq!(resp["data"]["url"], format!("ws://127.0.0.1:{}", worker.port()));
    assert_eq!(resp["data"]["websocket"], "/websocket");
    assert_eq!(resp["data"]["auth"], "/api/v1/auth");
    Ok(())
}

#[tokio::test]
async fn secret_key_guards_api() -> anyhow::Result<()> {
    let worker = WorkerProcess::build().secret_key("smoke-secret").spawn()?;
    worker.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let denied = client
        .post(format!("{}/api/v1/send", worker.base_url()))
        .json(&serde_json::json!({ "all": true, "message": "x" }))
        .send()
        .await?;
    assert_eq!(denied.status().as_u16(), 401);

    let allowed = worker
        .post(&client, "/api/v1/send")
        .json(&serde_json::json!({ "all": true, "message": "x" }))
        .send()
        .await?;
    assert!(allowed.status().is_success());
    Ok(())
}

// -- WebSocket ----------------------------------------------------------------

#[tokio::test]
async fn ws_init_and_ping_pong() -> anyhow::Result<()> {
    let worker = WorkerProcess::start()?;
    worker.wait_healthy(TIMEOUT).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(worker.ws_url()).await?;
    let (client_id, auth) = read_init(&mut ws).await?;
    assert_eq!(client_id.len(), 32);
    assert!(auth.len() >= 32);

    ws.send(Message::Text("ping".into())).await?;
    assert_eq!(next_text(&mut ws).await?, "pong");

    ws.send(Message::Text(r#"{"event":"ping"}"#.into())).await?;
    let parsed: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await?)?;
    assert_eq!(parsed["event"], "pong");
    Ok(())
}

#[tokio::test]
async fn ws_unauthenticated_client_is_evicted() -> anyhow::Result<()> {
    let worker = WorkerProcess::build().auth_window_secs(1).spawn()?;
    worker.wait_healthy(TIMEOUT).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(worker.ws_url()).await?;
    read_init(&mut ws).await?;

    let next = tokio::time::timeout(TIMEOUT, ws.next()).await?;
    assert!(
        matches!(next, Some(Ok(Message::Close(_))) | None | Some(Err(_))),
        "expected close, got {next:?}"
    );
    Ok(())
}

#[tokio::test]
async fn ws_bound_client_survives_and_receives_push() -> anyhow::Result<()> {
    let worker = WorkerProcess::build().auth_window_secs(1).spawn()?;
    worker.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let (mut ws, _) = tokio_tungstenite::connect_async(worker.ws_url()).await?;
    let (client_id, auth) = read_init(&mut ws).await?;

    let bound: serde_json::Value = worker
        .post(&client, "/api/v1/auth")
        .json(&serde_json::json!({ "client_id": client_id, "uid": "smoke-user", "auth": auth }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(bound["bound"], true);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let sent: serde_json::Value = worker
        .post(&client, "/api/v1/send")
        .json(&serde_json::json!({ "uid": "smoke-user", "message": "still here" }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(sent["delivered"], 1);
    assert_eq!(next_text(&mut ws).await?, "still here");
    Ok(())
}
