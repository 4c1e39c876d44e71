// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events and the synchronous in-process event bus.
//!
//! Every lifecycle moment of the worker maps to exactly one [`EventKind`].
//! Listeners run on the emitting thread, in registration order, and may
//! return a value; the emitter decides whether to collect all values or stop
//! at the first non-empty one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::session::AuthToken;

// -- Event types --------------------------------------------------------------

/// Closed set of lifecycle moments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    WorkerStart,
    Connect,
    WebSocketConnect,
    Message,
    Close,
    WorkerStop,
    Ping,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        Self::WorkerStart,
        Self::Connect,
        Self::WebSocketConnect,
        Self::Message,
        Self::Close,
        Self::WorkerStop,
        Self::Ping,
    ];

    /// Stable routing name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkerStart => "worker.start",
            Self::Connect => "worker.connect",
            Self::WebSocketConnect => "worker.websocket_connect",
            Self::Message => "worker.message",
            Self::Close => "worker.close",
            Self::WorkerStop => "worker.stop",
            Self::Ping => "worker.ping",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the worker process, carried by start/stop events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerInfo {
    pub name: String,
    pub pid: u32,
    /// Unix seconds.
    pub started_at: u64,
}

/// A lifecycle event with its payload.
#[derive(Debug, Clone)]
pub enum Event {
    WorkerStart(WorkerInfo),
    Connect { client_id: String, timestamp: u64, auth: AuthToken },
    WebSocketConnect { client_id: String, handshake: Value },
    /// A non-empty JSON object from a client. Arrays, scalars, and `{}` are
    /// dropped before this is emitted.
    Message { client_id: String, data: Map<String, Value>, raw: String },
    Close { client_id: String },
    WorkerStop(WorkerInfo),
    Ping { client_id: String },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::WorkerStart(_) => EventKind::WorkerStart,
            Self::Connect { .. } => EventKind::Connect,
            Self::WebSocketConnect { .. } => EventKind::WebSocketConnect,
            Self::Message { .. } => EventKind::Message,
            Self::Close { .. } => EventKind::Close,
            Self::WorkerStop(_) => EventKind::WorkerStop,
            Self::Ping { .. } => EventKind::Ping,
        }
    }

    /// Client the event concerns, if it is connection-scoped.
    pub fn client_id(&self) -> Option<&str> {
        match self {
            Self::Connect { client_id, .. }
            | Self::WebSocketConnect { client_id, .. }
            | Self::Message { client_id, .. }
            | Self::Close { client_id }
            | Self::Ping { client_id } => Some(client_id),
            Self::WorkerStart(_) | Self::WorkerStop(_) => None,
        }
    }
}

// -- Bus ----------------------------------------------------------------------

/// Listener callback. `Ok(None)` means "no result".
pub type Listener = Arc<dyn Fn(&Event) -> anyhow::Result<Option<Value>> + Send + Sync>;

/// Handle returned by [`EventBus::on`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub kind: EventKind,
    pub id: u64,
}

/// Outcome of an emission.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    /// Nobody was listening.
    NoListeners,
    /// Every listener ran; results in registration order.
    Collected(Vec<Option<Value>>),
    /// Halting emission stopped at this result.
    Halted(Value),
}

impl Emission {
    /// The value that halted the emission, if any.
    pub fn halted(self) -> Option<Value> {
        match self {
            Self::Halted(v) => Some(v),
            _ => None,
        }
    }
}

/// Synchronous publish/subscribe keyed by [`EventKind`].
pub struct EventBus {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<EventKind, Vec<(u64, Listener)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), listeners: RwLock::new(HashMap::new()) }
    }

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&Event) -> anyhow::Result<Option<Value>> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().entry(kind).or_default().push((id, Arc::new(listener)));
        Subscription { kind, id }
    }

    /// Remove a listener. Returns `false` if it was already removed.
    pub fn off(&self, subscription: Subscription) -> bool {
        let mut listeners = self.listeners.write();
        let Some(list) = listeners.get_mut(&subscription.kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != subscription.id);
        before != list.len()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to its listeners in registration order.
    ///
    /// With `halt`, delivery stops at the first listener returning a
    /// non-empty value. A listener error stops delivery and is returned to
    /// the caller unchanged.
    pub fn emit(&self, event: &Event, halt: bool) -> anyhow::Result<Emission> {
        // Snapshot so listeners may (un)subscribe while being called.
        let snapshot: Vec<Listener> = match self.listeners.read().get(&event.kind()) {
            Some(list) if !list.is_empty() => list.iter().map(|(_, l)| Arc::clone(l)).collect(),
            _ => return Ok(Emission::NoListeners),
        };

        let mut results = Vec::with_capacity(snapshot.len());
        for listener in snapshot {
            let result = listener(event)?;
            if halt {
                if let Some(value) = result.as_ref().filter(|v| !is_empty_value(v)) {
                    return Ok(Emission::Halted(value.clone()));
                }
            }
            results.push(result);
        }
        Ok(Emission::Collected(results))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// `null`, `false`, empty strings, arrays, and objects count as "no result".
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
