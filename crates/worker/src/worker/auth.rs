// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connect-time auth challenge and its deadline.
//!
//! Every new connection gets a one-time token and a timer. If no identity
//! is bound when the timer fires, the connection is closed. A keepalive
//! cancels the timer early without binding.

use std::sync::Arc;

use rand::Rng;
use sha2::{Digest, Sha256};

use super::{unix_now, WorkerContext};
use crate::event::Event;
use crate::gateway::Gateway;
use crate::protocol::ServerMessage;
use crate::session::{self, AuthToken};

/// Generate an unpredictable auth token: SHA-256 over a random salt, the
/// client id, and the connect timestamp, hex encoded (64 chars).
pub fn generate_auth_token(client_id: &str, timestamp: u64) -> AuthToken {
    let mut salt = [0u8; 16];
    rand::rng().fill(&mut salt[..]);

    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(client_id.as_bytes());
    hasher.update(timestamp.to_be_bytes());
    hasher.update(salt);
    AuthToken::new(format!("{:x}", hasher.finalize()))
}

/// Schedule the deadline, store the challenge in the session, push `init`,
/// and emit `Connect`.
pub(crate) fn issue_challenge(ctx: &Arc<WorkerContext>, client_id: &str) -> anyhow::Result<()> {
    let gateway = Arc::clone(&ctx.gateway);
    let target = client_id.to_owned();
    let timer = ctx.timers.schedule_once(
        ctx.auth_window,
        Box::new(move || expire_challenge(gateway.as_ref(), &target)),
    );

    let timestamp = unix_now();
    let auth = generate_auth_token(client_id, timestamp);
    ctx.gateway.update_session(client_id, session::challenge_fields(timer, &auth));

    let init = ServerMessage::Init { client_id, timestamp, auth: &auth }.to_json()?;
    ctx.gateway.send_to_client(client_id, &init);
    tracing::debug!(client_id, window_secs = ctx.auth_window.as_secs(), "auth challenge issued");

    ctx.emit(&Event::Connect { client_id: client_id.to_owned(), timestamp, auth })?;
    Ok(())
}

/// Deadline check, run when the auth timer fires.
///
/// Everything is re-read from the transport: the client may have bound,
/// sent a keepalive, or disconnected since the timer was scheduled.
pub fn expire_challenge(gateway: &dyn Gateway, client_id: &str) {
    // Clear first so a keepalive racing the eviction is never acknowledged.
    session::take_auth_timer(gateway, client_id);

    match gateway.get_uid_by_client_id(client_id) {
        Some(uid) => tracing::debug!(client_id, uid = %uid, "auth window elapsed, client bound"),
        None => {
            if gateway.is_online(client_id) {
                tracing::info!(client_id, "auth window elapsed, closing unauthenticated client");
            }
            gateway.close_client(client_id);
        }
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
