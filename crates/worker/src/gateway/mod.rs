// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command surface of the connection-holding transport.
//!
//! The worker never touches sockets directly. Everything it needs from the
//! transport (replies, eviction, session storage, identity and group
//! bookkeeping) goes through [`Gateway`]. All commands are fire-and-forget
//! and must tolerate unknown or already-closed clients.

pub mod local;

pub use local::{LocalGateway, Outbound};

use crate::session::Session;

pub trait Gateway: Send + Sync {
    /// Queue a text frame for one client.
    fn send_to_client(&self, client_id: &str, message: &str);

    /// Force-close a client connection.
    fn close_client(&self, client_id: &str);

    /// Snapshot of a client's session, `None` if the client is unknown.
    fn get_session(&self, client_id: &str) -> Option<Session>;

    /// Replace a client's session wholesale.
    fn set_session(&self, client_id: &str, session: Session);

    /// Merge fields into a client's session.
    fn update_session(&self, client_id: &str, fields: Session);

    /// Identity bound to a client, `None` when unbound or unknown.
    fn get_uid_by_client_id(&self, client_id: &str) -> Option<String>;

    /// Associate a client with an identity. One identity may own many clients.
    fn bind_uid(&self, client_id: &str, uid: &str);

    fn unbind_uid(&self, client_id: &str, uid: &str);

    fn join_group(&self, client_id: &str, group: &str);

    fn leave_group(&self, client_id: &str, group: &str);

    /// Send to every client bound to `uid`. Returns the number of clients reached.
    fn send_to_uid(&self, uid: &str, message: &str) -> usize;

    /// Send to every member of `group`. Returns the number of clients reached.
    fn send_to_group(&self, group: &str, message: &str) -> usize;

    fn send_to_all(&self, message: &str) -> usize;

    fn is_online(&self, client_id: &str) -> bool;

    fn client_count(&self) -> usize;
}
