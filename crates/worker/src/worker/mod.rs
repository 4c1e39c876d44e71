// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Business logic for connection lifecycle callbacks.
//!
//! The transport drives a [`Worker`] through its `on_*` methods. Each call
//! runs to completion on the caller; the only deferred work is the auth
//! deadline timer scheduled on connect.

pub mod auth;
pub mod dispatch;
pub mod identity;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::WorkerError;
use crate::event::{Emission, Event, EventBus, WorkerInfo};
use crate::gateway::Gateway;
use crate::session;
use crate::timer::Timers;

/// Default time a client has to bind an identity or send a keepalive.
pub const DEFAULT_AUTH_WINDOW: Duration = Duration::from_secs(30);

/// Everything a lifecycle callback or application handler may touch.
///
/// Built once per worker and shared by reference; there is no ambient state.
pub struct WorkerContext {
    pub gateway: Arc<dyn Gateway>,
    pub timers: Arc<dyn Timers>,
    pub events: Arc<EventBus>,
    pub auth_window: Duration,
}

impl WorkerContext {
    pub fn new(gateway: Arc<dyn Gateway>, timers: Arc<dyn Timers>) -> Self {
        Self { gateway, timers, events: Arc::new(EventBus::new()), auth_window: DEFAULT_AUTH_WINDOW }
    }

    pub fn with_auth_window(mut self, window: Duration) -> Self {
        self.auth_window = window;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Bind `client_id` to `uid` after validating the presented auth token.
    pub fn bind_uid(&self, client_id: &str, uid: &str, auth: &str) -> Result<bool, WorkerError> {
        identity::bind_uid(self.gateway.as_ref(), client_id, uid, auth)
    }

    /// Add `client_id` to each of `groups`.
    pub fn join_group<I, S>(&self, client_id: &str, groups: I) -> Result<usize, WorkerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        identity::join_group(self.gateway.as_ref(), client_id, groups)
    }

    /// Non-halting emission on the worker's event bus.
    pub fn emit(&self, event: &Event) -> anyhow::Result<Emission> {
        self.events.emit(event, false)
    }
}

/// Application hook for messages the worker does not handle itself.
pub trait MessageHandler: Send + Sync {
    /// Called for every parsed message whose `event` is not a built-in.
    fn on_message(
        &self,
        _ctx: &WorkerContext,
        _client_id: &str,
        _data: &Map<String, Value>,
        _raw: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when processing an inbound message failed anywhere.
    fn handle_exception(&self, _client_id: &str, _raw: &str, _error: &anyhow::Error) {}
}

/// Handler that ignores application messages.
pub struct NoopHandler;

impl MessageHandler for NoopHandler {}

/// Lifecycle entry points invoked by the transport.
#[derive(Clone)]
pub struct Worker {
    ctx: Arc<WorkerContext>,
    handler: Arc<dyn MessageHandler>,
}

impl Worker {
    pub fn new(ctx: WorkerContext, handler: Arc<dyn MessageHandler>) -> Self {
        Self { ctx: Arc::new(ctx), handler }
    }

    pub fn context(&self) -> &Arc<WorkerContext> {
        &self.ctx
    }

    pub fn events(&self) -> &EventBus {
        &self.ctx.events
    }

    pub fn on_worker_start(&self, info: &WorkerInfo) -> anyhow::Result<()> {
        tracing::info!(name = %info.name, pid = info.pid, "worker started");
        self.ctx.emit(&Event::WorkerStart(info.clone()))?;
        Ok(())
    }

    /// Issue the auth challenge for a freshly accepted connection.
    pub fn on_connect(&self, client_id: &str) -> anyhow::Result<()> {
        auth::issue_challenge(&self.ctx, client_id)
    }

    /// Publish the WebSocket handshake data for a connection.
    pub fn on_websocket_connect(&self, client_id: &str, handshake: Value) -> anyhow::Result<()> {
        self.ctx.emit(&Event::WebSocketConnect { client_id: client_id.to_owned(), handshake })?;
        Ok(())
    }

    /// Classify and route one inbound frame. Never fails; errors go to
    /// [`MessageHandler::handle_exception`].
    pub fn on_message(&self, client_id: &str, raw: &str) {
        if let Err(e) = dispatch::dispatch(&self.ctx, self.handler.as_ref(), client_id, raw) {
            tracing::warn!(client_id, err = %e, "message handling failed");
            self.handler.handle_exception(client_id, raw, &e);
        }
    }

    /// Tear down per-connection state. Cancels a still-pending auth timer.
    pub fn on_close(&self, client_id: &str) -> anyhow::Result<()> {
        if let Some(timer) = session::take_auth_timer(self.ctx.gateway.as_ref(), client_id) {
            self.ctx.timers.cancel(timer);
        }
        tracing::debug!(client_id, "client closed");
        self.ctx.emit(&Event::Close { client_id: client_id.to_owned() })?;
        Ok(())
    }

    pub fn on_worker_stop(&self, info: &WorkerInfo) -> anyhow::Result<()> {
        tracing::info!(name = %info.name, pid = info.pid, "worker stopping");
        self.ctx.emit(&Event::WorkerStop(info.clone()))?;
        Ok(())
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
