//! In-memory update store.
//!
//! # Invariants
//!
//! - Updates inside a batch are applied in order.
//! - `last_applied` never moves backwards: a batch whose `last_sequence_id`
//!   is below the current value is still merged, but the watermark stays.
//! - At most one pending batch is kept; a newer record replaces the older one.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use seqsync_reconcile::UpdateStore;
use seqsync_schemas::{SequenceId, StateUpdate, UpdateBatch, UpdateOp};
use serde_json::Value;
use tracing::debug;

/// Source of the client's last applied sequence.
pub trait SequenceTracker: Send + Sync {
    fn last_applied(&self) -> Option<SequenceId>;
}

impl<T: SequenceTracker + ?Sized> SequenceTracker for Arc<T> {
    fn last_applied(&self) -> Option<SequenceId> {
        (**self).last_applied()
    }
}

/// A batch parked for deferred catch-up.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingBatch {
    pub batch: UpdateBatch,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct StoreState {
    values: BTreeMap<String, Value>,
    last_applied: Option<SequenceId>,
    pending: Option<PendingBatch>,
    batches_applied: u64,
}

#[derive(Debug, Default)]
pub struct MemoryUpdateStore {
    state: Mutex<StoreState>,
}

impl MemoryUpdateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already applied everything up to `seq`.
    pub fn starting_at(seq: SequenceId) -> Self {
        Self {
            state: Mutex::new(StoreState {
                last_applied: Some(seq),
                ..StoreState::default()
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("update store lock poisoned"))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().ok()?.values.get(key).cloned()
    }

    /// Copy of the full key-value state.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.lock().map(|s| s.values.clone()).unwrap_or_default()
    }

    pub fn batches_applied(&self) -> u64 {
        self.lock().map(|s| s.batches_applied).unwrap_or(0)
    }

    pub fn pending(&self) -> Option<PendingBatch> {
        self.lock().ok()?.pending.clone()
    }

    /// Drop the pending record once `drained` has been reconciled.
    ///
    /// A record that was replaced in the meantime stays; returns whether
    /// anything was removed.
    pub fn clear_pending(&self, drained: &PendingBatch) -> Result<bool> {
        let mut state = self.lock()?;
        if state.pending.as_ref() != Some(drained) {
            return Ok(false);
        }
        state.pending = None;
        Ok(true)
    }
}

impl SequenceTracker for MemoryUpdateStore {
    fn last_applied(&self) -> Option<SequenceId> {
        self.lock().ok()?.last_applied
    }
}

fn apply_update(values: &mut BTreeMap<String, Value>, update: &StateUpdate) {
    match update.op {
        UpdateOp::Remove => {
            values.remove(&update.key);
        }
        UpdateOp::Set => {
            values.insert(
                update.key.clone(),
                update.value.clone().unwrap_or(Value::Null),
            );
        }
        UpdateOp::Merge => {
            let incoming = update.value.clone().unwrap_or(Value::Null);
            if let Value::Object(patch) = &incoming {
                if let Some(Value::Object(existing)) = values.get_mut(&update.key) {
                    for (k, v) in patch {
                        if v.is_null() {
                            existing.remove(k);
                        } else {
                            existing.insert(k.clone(), v.clone());
                        }
                    }
                    return;
                }
            }
            values.insert(update.key.clone(), incoming);
        }
    }
}

#[async_trait]
impl UpdateStore for MemoryUpdateStore {
    async fn apply(&self, batch: &UpdateBatch) -> Result<()> {
        let mut state = self.lock()?;
        for update in &batch.updates {
            apply_update(&mut state.values, update);
        }
        if let Some(last) = batch.last_sequence_id {
            if state.last_applied.map_or(true, |cur| last >= cur) {
                state.last_applied = Some(last);
            }
        }
        state.batches_applied += 1;
        debug!(
            updates = batch.updates.len(),
            last_applied = ?state.last_applied,
            "batch applied"
        );
        Ok(())
    }

    fn record_pending_state(&self, batch: &UpdateBatch) -> Result<()> {
        let mut state = self.lock()?;
        if state.pending.is_some() {
            debug!("replacing previously recorded pending batch");
        }
        state.pending = Some(PendingBatch {
            batch: batch.clone(),
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}
