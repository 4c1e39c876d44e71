// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: deterministic timers, a command-recording
//! gateway, and a worker harness.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::event::{Event, EventBus, EventKind};
use crate::gateway::{Gateway, LocalGateway, Outbound};
use crate::session::Session;
use crate::timer::{TimerCallback, TimerId, Timers};
use crate::transport::AppState;
use crate::worker::{MessageHandler, NoopHandler, Worker, WorkerContext};

// -- Timers -------------------------------------------------------------------

/// Timer service that only fires when told to.
pub struct ManualTimers {
    next_id: AtomicU64,
    scheduled: AtomicUsize,
    pending: Mutex<BTreeMap<TimerId, (Duration, TimerCallback)>>,
}

impl Default for ManualTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualTimers {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), scheduled: AtomicUsize::new(0), pending: Mutex::new(BTreeMap::new()) }
    }

    /// Total timers ever scheduled.
    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> Vec<TimerId> {
        self.pending.lock().keys().copied().collect()
    }

    pub fn delay_of(&self, id: TimerId) -> Option<Duration> {
        self.pending.lock().get(&id).map(|(delay, _)| *delay)
    }

    /// Fire one timer now. Returns `false` if it is not pending.
    pub fn fire(&self, id: TimerId) -> bool {
        // Release the lock before running so the callback may cancel timers.
        let entry = self.pending.lock().remove(&id);
        match entry {
            Some((_, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Fire every pending timer in id order. Returns how many fired.
    pub fn fire_all(&self) -> usize {
        self.pending().into_iter().filter(|id| self.fire(*id)).count()
    }
}

impl Timers for ManualTimers {
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.scheduled.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().insert(id, (delay, callback));
        id
    }

    fn cancel(&self, id: TimerId) -> bool {
        self.pending.lock().remove(&id).is_some()
    }
}

// -- Gateway ------------------------------------------------------------------

/// A [`LocalGateway`] that records every command it receives.
#[derive(Default)]
pub struct RecordingGateway {
    pub inner: LocalGateway,
    calls: Mutex<Vec<String>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands received so far, as `name(args)` strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of recorded commands starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

impl Gateway for RecordingGateway {
    fn send_to_client(&self, client_id: &str, message: &str) {
        self.record(format!("send_to_client({client_id})"));
        self.inner.send_to_client(client_id, message);
    }

    fn close_client(&self, client_id: &str) {
        self.record(format!("close_client({client_id})"));
        self.inner.close_client(client_id);
    }

    fn get_session(&self, client_id: &str) -> Option<Session> {
        self.inner.get_session(client_id)
    }

    fn set_session(&self, client_id: &str, session: Session) {
        self.record(format!("set_session({client_id})"));
        self.inner.set_session(client_id, session);
    }

    fn update_session(&self, client_id: &str, fields: Session) {
        self.record(format!("update_session({client_id})"));
        self.inner.update_session(client_id, fields);
    }

    fn get_uid_by_client_id(&self, client_id: &str) -> Option<String> {
        self.inner.get_uid_by_client_id(client_id)
    }

    fn bind_uid(&self, client_id: &str, uid: &str) {
        self.record(format!("bind_uid({client_id},{uid})"));
        self.inner.bind_uid(client_id, uid);
    }

    fn unbind_uid(&self, client_id: &str, uid: &str) {
        self.record(format!("unbind_uid({client_id},{uid})"));
        self.inner.unbind_uid(client_id, uid);
    }

    fn join_group(&self, client_id: &str, group: &str) {
        self.record(format!("join_group({client_id},{group})"));
        self.inner.join_group(client_id, group);
    }

    fn leave_group(&self, client_id: &str, group: &str) {
        self.record(format!("leave_group({client_id},{group})"));
        self.inner.leave_group(client_id, group);
    }

    fn send_to_uid(&self, uid: &str, message: &str) -> usize {
        self.record(format!("send_to_uid({uid})"));
        self.inner.send_to_uid(uid, message)
    }

    fn send_to_group(&self, group: &str, message: &str) -> usize {
        self.record(format!("send_to_group({group})"));
        self.inner.send_to_group(group, message)
    }

    fn send_to_all(&self, message: &str) -> usize {
        self.record("send_to_all()".to_owned());
        self.inner.send_to_all(message)
    }

    fn is_online(&self, client_id: &str) -> bool {
        self.inner.is_online(client_id)
    }

    fn client_count(&self) -> usize {
        self.inner.client_count()
    }
}

/// Pull every frame currently queued on a connection's outbound channel.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

/// Text payloads among `frames`.
pub fn texts(frames: &[Outbound]) -> Vec<&str> {
    frames
        .iter()
        .filter_map(|f| match f {
            Outbound::Text(t) => Some(t.as_str()),
            Outbound::Close => None,
        })
        .collect()
}

/// Record every event of the given kinds, in emission order.
pub fn record_events(bus: &EventBus, kinds: &[EventKind]) -> Arc<Mutex<Vec<Event>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in kinds {
        let log = Arc::clone(&log);
        bus.on(*kind, move |event| {
            log.lock().push(event.clone());
            Ok(None)
        });
    }
    log
}

// -- Harness ------------------------------------------------------------------

/// Worker wired to a recording gateway and manual timers.
pub struct Harness {
    pub worker: Worker,
    pub gateway: Arc<RecordingGateway>,
    pub timers: Arc<ManualTimers>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_handler(Arc::new(NoopHandler))
    }

    pub fn with_handler(handler: Arc<dyn MessageHandler>) -> Self {
        let gateway = Arc::new(RecordingGateway::new());
        let timers = Arc::new(ManualTimers::new());
        let ctx = WorkerContext::new(gateway.clone(), timers.clone());
        Self { worker: Worker::new(ctx, handler), gateway, timers }
    }

    pub fn events(&self) -> &EventBus {
        self.worker.events()
    }

    /// Register `client_id` with the transport and run `on_connect`.
    pub fn connect(&self, client_id: &str) -> anyhow::Result<mpsc::UnboundedReceiver<Outbound>> {
        let rx = self.gateway.inner.register_with_id(client_id);
        self.worker.on_connect(client_id)?;
        Ok(rx)
    }

    /// Issued token for a connected client.
    pub fn token_of(&self, client_id: &str) -> anyhow::Result<String> {
        let session = self
            .gateway
            .get_session(client_id)
            .ok_or_else(|| anyhow::anyhow!("no session for {client_id}"))?;
        crate::session::auth_token(&session)
            .map(str::to_owned)
            .ok_or_else(|| anyhow::anyhow!("no token for {client_id}"))
    }

    /// Pending auth timer stored in a client's session.
    pub fn timer_of(&self, client_id: &str) -> Option<TimerId> {
        self.gateway.get_session(client_id).as_ref().and_then(crate::session::auth_timer)
    }
}

// -- Servers ------------------------------------------------------------------

/// Spawn the HTTP/WebSocket router on a random local port.
///
/// Returns the bound address and a join handle for the server task.
pub async fn spawn_http_server(
    state: Arc<AppState>,
) -> anyhow::Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>)> {
    let router = crate::transport::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((addr, handle))
}
