// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process transport backing the WebSocket front end.
//!
//! Each registered connection owns an unbounded outbound channel drained by
//! its socket task, so every command here is non-blocking.

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::Gateway;
use crate::session::Session;

/// Frame queued for a connection's socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

struct ClientEntry {
    tx: mpsc::UnboundedSender<Outbound>,
    session: Session,
    uid: Option<String>,
    groups: BTreeSet<String>,
}

#[derive(Default)]
struct Registry {
    clients: HashMap<String, ClientEntry>,
    uids: HashMap<String, HashSet<String>>,
    groups: HashMap<String, HashSet<String>>,
}

impl Registry {
    fn detach_uid(&mut self, client_id: &str, uid: &str) {
        if let Some(set) = self.uids.get_mut(uid) {
            set.remove(client_id);
            if set.is_empty() {
                self.uids.remove(uid);
            }
        }
    }

    fn detach_group(&mut self, client_id: &str, group: &str) {
        if let Some(set) = self.groups.get_mut(group) {
            set.remove(client_id);
            if set.is_empty() {
                self.groups.remove(group);
            }
        }
    }

    fn send(&self, client_id: &str, frame: Outbound) -> bool {
        match self.clients.get(client_id) {
            Some(entry) => entry.tx.send(frame).is_ok(),
            None => false,
        }
    }
}

/// Registry of live connections with session, identity, and group indexes.
pub struct LocalGateway {
    registry: RwLock<Registry>,
}

impl LocalGateway {
    pub fn new() -> Self {
        Self { registry: RwLock::new(Registry::default()) }
    }

    /// Register a new connection under a freshly generated client id.
    pub fn register(&self) -> (String, mpsc::UnboundedReceiver<Outbound>) {
        let client_id = uuid::Uuid::new_v4().simple().to_string();
        let rx = self.register_with_id(client_id.clone());
        (client_id, rx)
    }

    /// Register a connection under a caller-chosen id, replacing any previous
    /// connection with the same id.
    pub fn register_with_id(&self, client_id: impl Into<String>) -> mpsc::UnboundedReceiver<Outbound> {
        let client_id = client_id.into();
        self.unregister(&client_id);
        let (tx, rx) = mpsc::unbounded_channel();
        let entry = ClientEntry { tx, session: Session::new(), uid: None, groups: BTreeSet::new() };
        self.registry.write().clients.insert(client_id, entry);
        rx
    }

    /// Drop a connection and every index entry that references it.
    pub fn unregister(&self, client_id: &str) -> bool {
        let mut reg = self.registry.write();
        let Some(entry) = reg.clients.remove(client_id) else {
            return false;
        };
        if let Some(ref uid) = entry.uid {
            reg.detach_uid(client_id, uid);
        }
        for group in &entry.groups {
            reg.detach_group(client_id, group);
        }
        true
    }

    pub fn client_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registry.read().clients.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Clients currently bound to `uid`, sorted.
    pub fn clients_of_uid(&self, uid: &str) -> Vec<String> {
        let reg = self.registry.read();
        let mut ids: Vec<String> =
            reg.uids.get(uid).map(|set| set.iter().cloned().collect()).unwrap_or_default();
        ids.sort();
        ids
    }

    /// Members of `group`, sorted.
    pub fn group_members(&self, group: &str) -> Vec<String> {
        let reg = self.registry.read();
        let mut ids: Vec<String> =
            reg.groups.get(group).map(|set| set.iter().cloned().collect()).unwrap_or_default();
        ids.sort();
        ids
    }

    /// Groups a client belongs to, sorted.
    pub fn groups_of(&self, client_id: &str) -> Vec<String> {
        self.registry
            .read()
            .clients
            .get(client_id)
            .map(|e| e.groups.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for LocalGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway for LocalGateway {
    fn send_to_client(&self, client_id: &str, message: &str) {
        if !self.registry.read().send(client_id, Outbound::Text(message.to_owned())) {
            tracing::debug!(client_id, "send to unknown or closed client dropped");
        }
    }

    fn close_client(&self, client_id: &str) {
        self.registry.read().send(client_id, Outbound::Close);
    }

    fn get_session(&self, client_id: &str) -> Option<Session> {
        self.registry.read().clients.get(client_id).map(|e| e.session.clone())
    }

    fn set_session(&self, client_id: &str, session: Session) {
        if let Some(entry) = self.registry.write().clients.get_mut(client_id) {
            entry.session = session;
        }
    }

    fn update_session(&self, client_id: &str, fields: Session) {
        if let Some(entry) = self.registry.write().clients.get_mut(client_id) {
            entry.session.extend(fields);
        }
    }

    fn get_uid_by_client_id(&self, client_id: &str) -> Option<String> {
        self.registry.read().clients.get(client_id).and_then(|e| e.uid.clone())
    }

    fn bind_uid(&self, client_id: &str, uid: &str) {
        let mut reg = self.registry.write();
        let previous = match reg.clients.get_mut(client_id) {
            Some(entry) => entry.uid.replace(uid.to_owned()),
            None => return,
        };
        if let Some(old) = previous.filter(|old| old != uid) {
            reg.detach_uid(client_id, &old);
        }
        reg.uids.entry(uid.to_owned()).or_default().insert(client_id.to_owned());
    }

    fn unbind_uid(&self, client_id: &str, uid: &str) {
        let mut reg = self.registry.write();
        match reg.clients.get_mut(client_id) {
            Some(entry) if entry.uid.as_deref() == Some(uid) => entry.uid = None,
            _ => return,
        }
        reg.detach_uid(client_id, uid);
    }

    fn join_group(&self, client_id: &str, group: &str) {
        let mut reg = self.registry.write();
        match reg.clients.get_mut(client_id) {
            Some(entry) => entry.groups.insert(group.to_owned()),
            None => return,
        };
        reg.groups.entry(group.to_owned()).or_default().insert(client_id.to_owned());
    }

    fn leave_group(&self, client_id: &str, group: &str) {
        let mut reg = self.registry.write();
        if let Some(entry) = reg.clients.get_mut(client_id) {
            entry.groups.remove(group);
        }
        reg.detach_group(client_id, group);
    }

    fn send_to_uid(&self, uid: &str, message: &str) -> usize {
        let reg = self.registry.read();
        let Some(members) = reg.uids.get(uid) else {
            return 0;
        };
        members.iter().filter(|id| reg.send(id, Outbound::Text(message.to_owned()))).count()
    }

    fn send_to_group(&self, group: &str, message: &str) -> usize {
        let reg = self.registry.read();
        let Some(members) = reg.groups.get(group) else {
            return 0;
        };
        members.iter().filter(|id| reg.send(id, Outbound::Text(message.to_owned()))).count()
    }

    fn send_to_all(&self, message: &str) -> usize {
        let reg = self.registry.read();
        reg.clients.values().filter(|e| e.tx.send(Outbound::Text(message.to_owned())).is_ok()).count()
    }

    fn is_online(&self, client_id: &str) -> bool {
        self.registry.read().clients.contains_key(client_id)
    }

    fn client_count(&self) -> usize {
        self.registry.read().clients.len()
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
