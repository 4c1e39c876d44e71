// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client wire protocol.
//!
//! Server messages are JSON objects tagged by an `event` field. The bare
//! `ping`/`pong` text frames predate the JSON form and are kept for minimal
//! clients.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::session::AuthToken;

/// Bare heartbeat request.
pub const PING: &str = "ping";

/// Bare heartbeat reply.
pub const PONG: &str = "pong";

/// Server → client messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    /// Auth challenge pushed once per connection.
    Init { client_id: &'a str, timestamp: u64, auth: &'a AuthToken },
    Pong {},
    /// Acknowledges a keepalive that canceled the auth deadline.
    Keepalive { status: &'a str },
}

impl ServerMessage<'_> {
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parse a client text frame into a JSON object.
///
/// Anything that is not a non-empty object is dropped.
pub fn parse_client_message(raw: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) if !map.is_empty() => Some(map),
        _ => None,
    }
}

/// The `event` field of a client message, or `""` when missing or not a string.
pub fn event_name(data: &Map<String, Value>) -> &str {
    data.get("event").and_then(Value::as_str).unwrap_or_default()
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
