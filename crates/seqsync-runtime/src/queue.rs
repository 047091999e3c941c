//! Outbound request queue with a pause flag.
//!
//! # Invariants
//!
//! - **FIFO**: requests leave in the order they were enqueued.
//! - **Paused → nothing leaves**: `next_ready` returns `None` while paused;
//!   queued requests are kept, not dropped.
//! - **Idempotent signals**: pausing a paused queue and resuming a running
//!   queue are no-ops. Only transitions are counted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use seqsync_reconcile::RequestQueue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::debug;

/// A write or read request waiting to be sent to the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub command: String,
    #[serde(default)]
    pub payload: Value,
}

impl OutboundRequest {
    pub fn new(command: impl Into<String>, payload: Value) -> Self {
        Self {
            command: command.into(),
            payload,
        }
    }
}

#[derive(Debug, Default)]
pub struct SequentialQueue {
    paused: AtomicBool,
    pause_transitions: AtomicU64,
    pending: Mutex<VecDeque<OutboundRequest>>,
    resumed: Notify,
}

impl SequentialQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, req: OutboundRequest) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(req);
    }

    /// Pop the next request, or `None` when paused or empty.
    pub fn next_ready(&self) -> Option<OutboundRequest> {
        if self.is_paused() {
            return None;
        }
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Number of running → paused transitions since creation.
    pub fn pause_count(&self) -> u64 {
        self.pause_transitions.load(Ordering::Acquire)
    }

    /// Let queued requests flow again and wake every waiter.
    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::AcqRel) {
            debug!(queued = self.len(), "sequential queue resumed");
            self.resumed.notify_waiters();
        }
    }

    /// Resolve once the queue is not paused.
    pub async fn wait_until_resumed(&self) {
        loop {
            // Register before checking so a resume in between is not lost.
            let notified = self.resumed.notified();
            if !self.is_paused() {
                return;
            }
            notified.await;
        }
    }
}

impl RequestQueue for SequentialQueue {
    fn pause(&self) {
        if !self.paused.swap(true, Ordering::AcqRel) {
            self.pause_transitions.fetch_add(1, Ordering::AcqRel);
            debug!(queued = self.len(), "sequential queue paused");
        }
    }
}
