// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::gateway::LocalGateway;
use crate::timer::TokioTimers;
use crate::worker::{MessageHandler, Worker, WorkerContext};

/// Shared application state passed to all handlers via axum `State` extractor.
pub struct AppState {
    pub worker: Worker,
    /// Concrete transport; the worker only sees it as `dyn Gateway`.
    pub gateway: Arc<LocalGateway>,
    pub config: WorkerConfig,
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire a worker to a fresh in-process gateway and tokio timers.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn new(
        config: WorkerConfig,
        handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        let gateway = Arc::new(LocalGateway::new());
        let timers = Arc::new(TokioTimers::current()?);
        let ctx = WorkerContext::new(gateway.clone(), timers).with_auth_window(config.auth_window());
        Ok(Self { worker: Worker::new(ctx, handler), gateway, config, shutdown })
    }
}
