// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection session state.
//!
//! Sessions are plain JSON objects owned by the transport. The worker only
//! reserves two keys; everything else belongs to the application.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::gateway::Gateway;
use crate::timer::TimerId;

/// Session bag associated with one live connection.
pub type Session = serde_json::Map<String, Value>;

/// Session key holding the pending auth timer handle.
pub const AUTH_TIMER_ID: &str = "auth_timer_id";

/// Session key holding the auth token issued at connect time.
pub const AUTH: &str = "auth";

/// One-time secret issued to a connection at connect time.
///
/// `Debug` is redacted so the token cannot leak through logs or event dumps.
/// The raw value is only reachable via [`AuthToken::expose`] and the
/// serializer used for the `init` challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

impl Serialize for AuthToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Build the reserved session fields written on connect.
pub fn challenge_fields(timer: TimerId, token: &AuthToken) -> Session {
    let mut session = Session::new();
    session.insert(AUTH_TIMER_ID.to_owned(), Value::from(timer.0));
    session.insert(AUTH.to_owned(), Value::from(token.expose()));
    session
}

/// Pending auth timer stored in the session, if any.
pub fn auth_timer(session: &Session) -> Option<TimerId> {
    session.get(AUTH_TIMER_ID).and_then(Value::as_u64).map(TimerId)
}

/// Issued auth token stored in the session. Empty strings count as absent.
pub fn auth_token(session: &Session) -> Option<&str> {
    session.get(AUTH).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Remove the pending auth timer from a client's session.
///
/// Reads the session fresh from the transport and writes it back without the
/// timer key. Returns the removed handle, or `None` when the session is gone
/// or no timer was pending. Idempotent.
pub fn take_auth_timer(gateway: &dyn Gateway, client_id: &str) -> Option<TimerId> {
    let mut session = gateway.get_session(client_id)?;
    let removed = session.remove(AUTH_TIMER_ID)?;
    gateway.set_session(client_id, session);
    removed.as_u64().map(TimerId)
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
