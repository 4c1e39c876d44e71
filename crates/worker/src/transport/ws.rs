// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket front end: one task per client connection.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, Uri};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};

use crate::gateway::Outbound;
use crate::transport::AppState;

/// `GET {websocket_path}`: WebSocket upgrade for a client.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    uri: Uri,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let handshake = handshake_data(&uri, &query, &headers);
    ws.on_upgrade(move |socket| handle_ws(socket, state, handshake))
}

/// Request data captured at upgrade time: path, decoded query, and headers.
///
/// Header names are lowercase; repeated headers keep the last value.
pub fn handshake_data(uri: &Uri, query: &BTreeMap<String, String>, headers: &HeaderMap) -> Value {
    let mut header_map = Map::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            header_map.insert(name.as_str().to_owned(), Value::from(value));
        }
    }
    json!({
        "path": uri.path(),
        "query": query,
        "headers": header_map,
    })
}

/// Per-connection WebSocket handler.
async fn handle_ws(socket: WebSocket, state: Arc<AppState>, handshake: Value) {
    let (client_id, mut outbound) = state.gateway.register();
    let worker = &state.worker;

    // Listener failures are logged; the challenge is already issued either way.
    if let Err(e) = worker.on_connect(&client_id) {
        tracing::warn!(client_id = %client_id, err = %e, "connect handling failed");
    }
    if let Err(e) = worker.on_websocket_connect(&client_id, handshake) {
        tracing::warn!(client_id = %client_id, err = %e, "websocket connect handling failed");
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }

            // Frames pushed by the worker or the HTTP API.
            frame = outbound.recv() => {
                match frame {
                    Some(Outbound::Text(text)) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close) => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                    None => break,
                }
            }

            // Frames from the client.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => worker.on_message(&client_id, text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => worker.on_message(&client_id, text),
                        Err(_) => tracing::debug!(client_id = %client_id, "dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    if let Err(e) = worker.on_close(&client_id) {
        tracing::warn!(client_id = %client_id, err = %e, "close handling failed");
    }
    state.gateway.unregister(&client_id);
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
