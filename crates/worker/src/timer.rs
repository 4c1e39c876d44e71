// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot timer service used for auth deadlines.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Work run once when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Handle for a scheduled timer. Stored in sessions as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(pub u64);

pub trait Timers: Send + Sync {
    /// Run `callback` once after `delay`.
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> TimerId;

    /// Cancel a pending timer. Returns `false` when the timer already fired,
    /// was already canceled, or never existed.
    fn cancel(&self, id: TimerId) -> bool;
}

/// Timer service backed by tokio tasks.
pub struct TokioTimers {
    handle: Handle,
    next_id: AtomicU64,
    pending: Arc<Mutex<HashMap<TimerId, CancellationToken>>>,
}

impl TokioTimers {
    pub fn new(handle: Handle) -> Self {
        Self { handle, next_id: AtomicU64::new(1), pending: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Build a timer service on the ambient tokio runtime.
    pub fn current() -> anyhow::Result<Self> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// Number of timers that have neither fired nor been canceled.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Timers for TokioTimers {
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();
        self.pending.lock().insert(id, token.clone());

        let pending = Arc::clone(&self.pending);
        self.handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // Whoever removes the entry first wins the race with cancel().
                    let claimed = pending.lock().remove(&id).is_some();
                    if claimed {
                        callback();
                    }
                }
            }
        });
        id
    }

    fn cancel(&self, id: TimerId) -> bool {
        match self.pending.lock().remove(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
