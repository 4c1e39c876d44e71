// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport in front of the worker.

pub mod auth;
pub mod http;
pub mod state;
pub mod ws;

pub use state::AppState;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the axum `Router` with all worker routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let websocket_path = state.config.websocket_path.clone();
    Router::new()
        // Public
        .route("/api/v1/health", get(http::health))
        .route("/api/v1/config", get(http::client_config))
        .route(&websocket_path, get(ws::ws_handler))
        // Identity and push
        .route(http::AUTH_PATH, post(http::bind))
        .route("/api/v1/groups", post(http::join_groups))
        .route("/api/v1/send", post(http::send))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
