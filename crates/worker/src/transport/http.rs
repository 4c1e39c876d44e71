// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the worker API.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkerError;
use crate::gateway::Gateway;
use crate::transport::AppState;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub connections: usize,
}

/// Connection info for browser clients, in the `{code, data, msg}` envelope.
#[derive(Debug, Serialize)]
pub struct ClientConfigResponse {
    pub code: i32,
    pub data: ClientConfig,
    pub msg: String,
}

#[derive(Debug, Serialize)]
pub struct ClientConfig {
    pub url: String,
    pub websocket: String,
    pub auth: String,
}

#[derive(Debug, Deserialize)]
pub struct BindRequest {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub auth: String,
}

#[derive(Debug, Serialize)]
pub struct BindResponse {
    pub bound: bool,
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub joined: usize,
}

/// Push request. Exactly one target must be set.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub message: Value,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub delivered: usize,
}

// -- Handlers -----------------------------------------------------------------

/// Path of the bind endpoint, advertised by `GET /api/v1/config`.
pub const AUTH_PATH: &str = "/api/v1/auth";

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse { status: "running".to_owned(), connections: s.gateway.client_count() })
}

/// `GET /api/v1/config`
pub async fn client_config(State(s): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let proto = headers.get("x-forwarded-proto").and_then(|v| v.to_str().ok()).unwrap_or("https");
    let scheme = if proto == "http" { "ws://" } else { "wss://" };
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| s.config.addr());

    Json(ClientConfigResponse {
        code: 0,
        data: ClientConfig {
            url: format!("{scheme}{host}"),
            websocket: s.config.websocket_path.clone(),
            auth: AUTH_PATH.to_owned(),
        },
        msg: "ok".to_owned(),
    })
}

/// `POST /api/v1/auth`: bind a connection to a uid.
pub async fn bind(State(s): State<Arc<AppState>>, Json(req): Json<BindRequest>) -> Response {
    match s.worker.context().bind_uid(&req.client_id, &req.uid, &req.auth) {
        Ok(bound) => Json(BindResponse { bound }).into_response(),
        Err(e) => e.to_http_response().into_response(),
    }
}

/// `POST /api/v1/groups`: add a connection to groups.
pub async fn join_groups(State(s): State<Arc<AppState>>, Json(req): Json<JoinRequest>) -> Response {
    match s.worker.context().join_group(&req.client_id, &req.groups) {
        Ok(joined) => Json(JoinResponse { joined }).into_response(),
        Err(e) => e.to_http_response().into_response(),
    }
}

/// `POST /api/v1/send`: push a message to a client, uid, group, or everyone.
pub async fn send(State(s): State<Arc<AppState>>, Json(req): Json<SendRequest>) -> Response {
    match push(s.gateway.as_ref(), &req) {
        Ok(delivered) => Json(SendResponse { delivered }).into_response(),
        Err(e) => e.to_http_response().into_response(),
    }
}

fn push(gateway: &dyn Gateway, req: &SendRequest) -> Result<usize, WorkerError> {
    let message = match &req.message {
        Value::Null => return Err(WorkerError::InvalidArgument("message must not be empty")),
        Value::String(text) if text.is_empty() => {
            return Err(WorkerError::InvalidArgument("message must not be empty"))
        }
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };

    let targets = [req.client_id.is_some(), req.uid.is_some(), req.group.is_some(), req.all];
    if targets.iter().filter(|t| **t).count() != 1 {
        return Err(WorkerError::InvalidArgument("exactly one of client_id, uid, group, all is required"));
    }

    let delivered = if let Some(client_id) = &req.client_id {
        if !gateway.is_online(client_id) {
            return Err(WorkerError::NotFound);
        }
        gateway.send_to_client(client_id, &message);
        1
    } else if let Some(uid) = &req.uid {
        gateway.send_to_uid(uid, &message)
    } else if let Some(group) = &req.group {
        gateway.send_to_group(group, &message)
    } else {
        gateway.send_to_all(&message)
    };
    tracing::debug!(delivered, "pushed message");
    Ok(delivered)
}
