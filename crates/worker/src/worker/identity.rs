// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity binding and group membership.
//!
//! A client proves it owns its connection by echoing the token it received
//! in the `init` challenge. Without that check any caller could bind an
//! arbitrary `client_id` to a user.

use crate::error::WorkerError;
use crate::gateway::Gateway;
use crate::session;

/// Shortest auth token accepted by [`bind_uid`].
pub const MIN_AUTH_LEN: usize = 32;

/// Constant-time string comparison to prevent timing side-channel attacks.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Bind `client_id` to `uid` if `auth` matches the token issued at connect.
///
/// Returns `Ok(false)` for a wrong token. Structurally invalid input, or a
/// session that never received a token, is `InvalidArgument`. The pending
/// auth timer is left alone; its deadline check sees the binding.
pub fn bind_uid(
    gateway: &dyn Gateway,
    client_id: &str,
    uid: &str,
    auth: &str,
) -> Result<bool, WorkerError> {
    if client_id.is_empty() {
        return Err(WorkerError::InvalidArgument("client_id must not be empty"));
    }
    if uid.is_empty() {
        return Err(WorkerError::InvalidArgument("uid must not be empty"));
    }
    if auth.len() < MIN_AUTH_LEN {
        return Err(WorkerError::InvalidArgument("auth parameter is empty or too short"));
    }

    let stored = gateway.get_session(client_id).unwrap_or_default();
    let Some(expected) = session::auth_token(&stored) else {
        return Err(WorkerError::InvalidArgument("session validation parameter is empty"));
    };

    if !constant_time_eq(expected, auth) {
        tracing::debug!(client_id, "auth token mismatch");
        return Ok(false);
    }

    gateway.bind_uid(client_id, uid);
    tracing::info!(client_id, uid, "client bound");
    Ok(true)
}

/// Add `client_id` to every group in `groups`.
///
/// All names are validated before the first join, so invalid input never
/// leaves a partial membership behind. Returns the number of joins issued.
pub fn join_group<I, S>(gateway: &dyn Gateway, client_id: &str, groups: I) -> Result<usize, WorkerError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if client_id.is_empty() {
        return Err(WorkerError::InvalidArgument("client_id must not be empty"));
    }
    let groups: Vec<S> = groups.into_iter().collect();
    if groups.iter().any(|g| g.as_ref().is_empty()) {
        return Err(WorkerError::InvalidArgument("group must not be empty"));
    }

    for group in &groups {
        gateway.join_group(client_id, group.as_ref());
    }
    Ok(groups.len())
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
