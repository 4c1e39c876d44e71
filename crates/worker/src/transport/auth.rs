// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::WorkerError;
use crate::transport::AppState;
use crate::worker::identity::constant_time_eq;

/// Validate a Bearer token from HTTP headers.
pub fn validate_bearer(headers: &HeaderMap, expected: Option<&str>) -> Result<(), WorkerError> {
    let expected = match expected {
        Some(tok) => tok,
        None => return Ok(()),
    };

    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(WorkerError::Unauthorized)?;

    let token = header.strip_prefix("Bearer ").ok_or(WorkerError::Unauthorized)?;
    if constant_time_eq(token, expected) {
        Ok(())
    } else {
        Err(WorkerError::Unauthorized)
    }
}

/// Paths reachable without the secret key.
pub fn is_public_path(path: &str, websocket_path: &str) -> bool {
    path == "/api/v1/health" || path == "/api/v1/config" || path == websocket_path
}

/// Axum middleware that enforces Bearer token authentication.
///
/// Exempt: health, client config, and the WebSocket endpoint. WebSocket
/// clients prove themselves through the connect challenge instead.
pub async fn auth_layer(
    state: State<Arc<AppState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if is_public_path(req.uri().path(), &state.config.websocket_path) {
        return next.run(req).await;
    }

    if let Err(code) = validate_bearer(req.headers(), state.config.secret_key.as_deref()) {
        tracing::debug!(path = req.uri().path(), "rejected unauthenticated request");
        return code.to_http_response().into_response();
    }

    next.run(req).await
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
