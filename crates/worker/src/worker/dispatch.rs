// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound message classification.
//!
//! Heartbeats and keepalives are answered here so applications never have
//! to. Everything else is handed to the application's [`MessageHandler`].

use super::{MessageHandler, WorkerContext};
use crate::event::Event;
use crate::protocol::{self, ServerMessage};
use crate::session;

/// Route one inbound frame. First match wins:
///
/// 1. bare `ping` → bare `pong`
/// 2. anything that is not a non-empty JSON object is dropped
/// 3. `Message` is emitted for every parsed object
/// 4. `event` = `ping` / `keepalive` are built-ins; the rest go to `handler`
pub(crate) fn dispatch(
    ctx: &WorkerContext,
    handler: &dyn MessageHandler,
    client_id: &str,
    raw: &str,
) -> anyhow::Result<()> {
    if raw == protocol::PING {
        ctx.gateway.send_to_client(client_id, protocol::PONG);
        ctx.emit(&Event::Ping { client_id: client_id.to_owned() })?;
        return Ok(());
    }

    let Some(data) = protocol::parse_client_message(raw) else {
        return Ok(());
    };

    ctx.emit(&Event::Message { client_id: client_id.to_owned(), data: data.clone(), raw: raw.to_owned() })?;

    match protocol::event_name(&data) {
        "ping" => {
            ctx.gateway.send_to_client(client_id, &ServerMessage::Pong {}.to_json()?);
            ctx.emit(&Event::Ping { client_id: client_id.to_owned() })?;
        }
        "keepalive" => keepalive(ctx, client_id)?,
        _ => handler.on_message(ctx, client_id, &data, raw)?,
    }
    Ok(())
}

/// Cancel the pending auth deadline and acknowledge. Ignored when nothing is
/// pending (already bound, already acknowledged, or already expired).
fn keepalive(ctx: &WorkerContext, client_id: &str) -> anyhow::Result<()> {
    let Some(timer) = session::take_auth_timer(ctx.gateway.as_ref(), client_id) else {
        return Ok(());
    };
    // A timer that already fired is mid-eviction; stay silent.
    if ctx.timers.cancel(timer) {
        ctx.gateway.send_to_client(client_id, &ServerMessage::Keepalive { status: "ok" }.to_json()?);
        tracing::debug!(client_id, "auth deadline canceled by keepalive");
    }
    Ok(())
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
