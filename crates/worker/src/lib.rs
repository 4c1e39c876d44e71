// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway worker: connection auth lifecycle, message routing, and identity
//! binding for WebSocket clients.

pub mod config;
pub mod error;
pub mod event;
pub mod gateway;
pub mod protocol;
pub mod session;
pub mod test_support;
pub mod timer;
pub mod transport;
pub mod worker;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::event::WorkerInfo;
use crate::transport::{build_router, AppState};
use crate::worker::{unix_now, MessageHandler};

/// Run the worker until Ctrl-C.
pub async fn run(config: WorkerConfig, handler: Arc<dyn MessageHandler>) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                shutdown.cancel();
            }
        });
    }
    let listener = TcpListener::bind(config.addr()).await?;
    let state = Arc::new(AppState::new(config, handler, shutdown)?);
    serve(listener, state).await
}

/// Serve on an already-bound listener until `state.shutdown` is canceled.
///
/// Emits `WorkerStart` before accepting connections and `WorkerStop` after
/// the server has drained. Listeners registered on the worker's event bus
/// before this call see both.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    let info = WorkerInfo {
        name: state.config.name.clone(),
        pid: std::process::id(),
        started_at: unix_now(),
    };
    let shutdown = state.shutdown.clone();

    state.worker.on_worker_start(&info)?;
    let addr = listener.local_addr()?;
    tracing::info!("gateway worker listening on {addr}");

    let router = build_router(Arc::clone(&state));
    let served = axum::serve(listener, router).with_graceful_shutdown(shutdown.clone().cancelled_owned()).await;

    // Server errors still end the worker cleanly.
    shutdown.cancel();
    state.worker.on_worker_stop(&info)?;
    served?;
    Ok(())
}
