//! Serialized batch delivery.
//!
//! The reconciler assumes one call at a time per client sequence. This loop
//! is that serialization point: batches are pulled from a single channel and
//! each reconcile call completes before the next batch is read.

use std::sync::Arc;

use anyhow::Result;
use seqsync_reconcile::{
    GapHandler, ReconcileOutcome, ReconciliationRequest, RequestQueue, UpdateReconciler,
    UpdateStore,
};
use seqsync_schemas::UpdateBatch;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::queue::SequentialQueue;
use crate::store::{MemoryUpdateStore, SequenceTracker};

/// One server push handed to the loop.
#[derive(Debug)]
pub struct IncomingBatch {
    pub batch: UpdateBatch,
    /// Overrides [`LoopDefaults::run_synchronous_catch_up`] for this push.
    pub run_synchronous_catch_up: Option<bool>,
    /// Receives the reconcile result. Without it, failures are only logged.
    pub reply: Option<oneshot::Sender<Result<ReconcileOutcome>>>,
}

impl IncomingBatch {
    pub fn new(batch: UpdateBatch) -> Self {
        Self {
            batch,
            run_synchronous_catch_up: None,
            reply: None,
        }
    }

    /// Attach a reply channel and return its receiving half.
    pub fn with_reply(mut self) -> (Self, oneshot::Receiver<Result<ReconcileOutcome>>) {
        let (tx, rx) = oneshot::channel();
        self.reply = Some(tx);
        (self, rx)
    }

    pub fn sync(mut self, run_synchronous_catch_up: bool) -> Self {
        self.run_synchronous_catch_up = Some(run_synchronous_catch_up);
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LoopDefaults {
    pub run_synchronous_catch_up: bool,
}

/// Spawn the reconcile loop. Ends when every sender of `rx` is dropped.
///
/// The client's last applied sequence is read from the store right before
/// each call, so it always reflects the previous batch.
pub fn spawn_reconcile_loop<Q, S, G>(
    reconciler: Arc<UpdateReconciler<Q, S, G>>,
    mut rx: mpsc::Receiver<IncomingBatch>,
    defaults: LoopDefaults,
) -> JoinHandle<()>
where
    Q: RequestQueue + 'static,
    S: UpdateStore + SequenceTracker + 'static,
    G: GapHandler + 'static,
{
    tokio::spawn(async move {
        while let Some(incoming) = rx.recv().await {
            let request = ReconciliationRequest::new(
                reconciler.store().last_applied(),
                incoming
                    .run_synchronous_catch_up
                    .unwrap_or(defaults.run_synchronous_catch_up),
            );
            let span = tracing::info_span!(
                "reconcile",
                correlation_id = %Uuid::new_v4(),
                client_last = ?request.client_last_sequence_id,
            );

            let result = reconciler
                .reconcile(&incoming.batch, &request)
                .instrument(span)
                .await;

            match incoming.reply {
                Some(reply) => {
                    let _ = reply.send(result);
                }
                None => {
                    if let Err(e) = result {
                        warn!(error = %e, "reconcile failed");
                    }
                }
            }
        }
        info!("reconcile loop stopped: channel closed");
    })
}

/// Reconcile the batch parked by a deferred catch-up, if any.
///
/// Runs with `run_synchronous_catch_up = true` against the store's current
/// last applied sequence. On success the record is cleared and the queue is
/// resumed whatever branch reconcile took. On failure the record stays and
/// the queue is paused again, so a later drain retries the same range.
pub async fn drain_pending<G>(
    reconciler: &UpdateReconciler<Arc<SequentialQueue>, Arc<MemoryUpdateStore>, G>,
) -> Result<Option<ReconcileOutcome>>
where
    G: GapHandler,
{
    let store = reconciler.store();
    let Some(pending) = store.pending() else {
        return Ok(None);
    };

    let request = ReconciliationRequest::new(store.last_applied(), true);
    info!(
        recorded_at = %pending.recorded_at,
        client_last = ?request.client_last_sequence_id,
        "draining deferred catch-up"
    );

    match reconciler.reconcile(&pending.batch, &request).await {
        Ok(outcome) => {
            store.clear_pending(&pending)?;
            reconciler.queue().resume();
            Ok(Some(outcome))
        }
        Err(e) => {
            warn!(error = %e, "deferred catch-up failed; keeping pending batch");
            reconciler.queue().pause();
            Err(e)
        }
    }
}
