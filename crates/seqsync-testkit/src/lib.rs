//! Recording fakes for reconciler scenarios.
//!
//! Every fake writes into one shared [`EventLog`], so a test can assert both
//! which collaborator ran and in what order (pause strictly before recovery).

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{bail, Result};
use async_trait::async_trait;
use seqsync_reconcile::{GapHandler, RequestQueue, UpdateReconciler, UpdateStore};
use seqsync_schemas::{SequenceId, StateUpdate, UpdateBatch};
use serde_json::json;

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Paused,
    Applied(UpdateBatch),
    RecordedPending(UpdateBatch),
    GapHandlerInvoked {
        batch: UpdateBatch,
        client_last: Option<SequenceId>,
    },
}

#[derive(Clone, Debug, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, e: Event) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(e);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count_paused(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Paused))
            .count()
    }

    pub fn gap_handler_calls(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::GapHandlerInvoked { .. }))
            .count()
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

pub struct RecordingQueue {
    log: EventLog,
}

impl RecordingQueue {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl RequestQueue for RecordingQueue {
    fn pause(&self) {
        self.log.push(Event::Paused);
    }
}

/// Store fake. Failures are armed per operation and fire on every call.
pub struct RecordingStore {
    log: EventLog,
    fail_apply: Option<String>,
    fail_record: Option<String>,
}

impl RecordingStore {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail_apply: None,
            fail_record: None,
        }
    }

    pub fn failing_apply(mut self, msg: impl Into<String>) -> Self {
        self.fail_apply = Some(msg.into());
        self
    }

    pub fn failing_record(mut self, msg: impl Into<String>) -> Self {
        self.fail_record = Some(msg.into());
        self
    }
}

#[async_trait]
impl UpdateStore for RecordingStore {
    async fn apply(&self, batch: &UpdateBatch) -> Result<()> {
        self.log.push(Event::Applied(batch.clone()));
        if let Some(msg) = &self.fail_apply {
            bail!("{msg}");
        }
        Ok(())
    }

    fn record_pending_state(&self, batch: &UpdateBatch) -> Result<()> {
        self.log.push(Event::RecordedPending(batch.clone()));
        if let Some(msg) = &self.fail_record {
            bail!("{msg}");
        }
        Ok(())
    }
}

pub struct RecordingGapHandler {
    log: EventLog,
    fail: Option<String>,
}

impl RecordingGapHandler {
    pub fn new(log: EventLog) -> Self {
        Self { log, fail: None }
    }

    pub fn failing(mut self, msg: impl Into<String>) -> Self {
        self.fail = Some(msg.into());
        self
    }
}

#[async_trait]
impl GapHandler for RecordingGapHandler {
    async fn fetch_and_apply_missing(
        &self,
        batch: &UpdateBatch,
        client_last: Option<SequenceId>,
    ) -> Result<()> {
        self.log.push(Event::GapHandlerInvoked {
            batch: batch.clone(),
            client_last,
        });
        if let Some(msg) = &self.fail {
            bail!("{msg}");
        }
        Ok(())
    }
}

pub type RecordingReconciler =
    UpdateReconciler<RecordingQueue, RecordingStore, RecordingGapHandler>;

/// Reconciler over non-failing fakes sharing one log.
pub fn recording_reconciler() -> (RecordingReconciler, EventLog) {
    let log = EventLog::new();
    let r = UpdateReconciler::new(
        RecordingQueue::new(log.clone()),
        RecordingStore::new(log.clone()),
        RecordingGapHandler::new(log.clone()),
    );
    (r, log)
}

// ---------------------------------------------------------------------------
// Batch helpers
// ---------------------------------------------------------------------------

pub fn seq(n: u64) -> SequenceId {
    SequenceId::new(n)
}

/// Batch `previous -> last` with one update keyed by its last sequence.
pub fn batch(previous: u64, last: u64) -> UpdateBatch {
    UpdateBatch::new(
        previous,
        last,
        vec![StateUpdate::set(format!("report_{last}"), json!({ "seq": last }))],
    )
}

/// Payload-less pending-fetch batch that still declares `previous`.
pub fn pending_batch(previous: u64, pending: u64) -> UpdateBatch {
    let mut b = UpdateBatch::pending_fetch(pending);
    b.previous_sequence_id = Some(seq(previous));
    b
}
