use anyhow::Result;
use seqsync_schemas::{ReconciliationRequest, SequenceId, UpdateBatch};
use tracing::{debug, info, warn};

use crate::collaborators::{GapHandler, RequestQueue, UpdateStore};
use crate::types::{GapDecision, ReconcileOutcome};

/// `true` when a batch declaring `previous` may follow `client_last`.
///
/// An unknown client sequence (`None`) is treated as contiguous: no check is
/// possible, so the batch is applied. This leniency is only sound while
/// callers never report `None` for a client that has in fact applied updates.
pub fn is_contiguous(previous: SequenceId, client_last: Option<SequenceId>) -> bool {
    match client_last {
        None => true,
        Some(last) => last == previous,
    }
}

/// Gap test, in evaluation order:
/// 1. server-flagged pending fetch
/// 2. predecessor vs. client last applied sequence
pub fn detect_gap(batch: &UpdateBatch, request: &ReconciliationRequest) -> GapDecision {
    if batch.requires_pending_fetch {
        return GapDecision::PendingFetch {
            pending: batch.pending_sequence_id,
        };
    }

    let previous = batch.previous_or_sentinel();
    match request.client_last_sequence_id {
        Some(client_last) if !is_contiguous(previous, Some(client_last)) => GapDecision::Gap {
            previous,
            client_last,
        },
        _ => GapDecision::Contiguous,
    }
}

/// Enforces update-sequence contiguity before anything reaches the store.
///
/// ```text
/// reconcile(batch, request)
///     │
///     ├── detect_gap → Contiguous ──► store.apply(batch)            → Applied
///     │
///     └── PendingFetch | Gap
///             ├── queue.pause()                     (always first)
///             ├── run_synchronous_catch_up ──► gaps.fetch_and_apply_missing → CaughtUp
///             └── otherwise               ──► store.record_pending_state     → RecordedPending
/// ```
///
/// Stateless between calls. Concurrent calls against the same client sequence
/// must be serialized by the caller.
pub struct UpdateReconciler<Q, S, G>
where
    Q: RequestQueue,
    S: UpdateStore,
    G: GapHandler,
{
    queue: Q,
    store: S,
    gaps: G,
}

impl<Q, S, G> UpdateReconciler<Q, S, G>
where
    Q: RequestQueue,
    S: UpdateStore,
    G: GapHandler,
{
    pub fn new(queue: Q, store: S, gaps: G) -> Self {
        Self { queue, store, gaps }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Apply `batch` if it is contiguous, otherwise pause the queue and
    /// recover.
    ///
    /// Nothing here fails on its own; errors come only from the store or the
    /// gap handler and are returned unchanged.
    pub async fn reconcile(
        &self,
        batch: &UpdateBatch,
        request: &ReconciliationRequest,
    ) -> Result<ReconcileOutcome> {
        let decision = detect_gap(batch, request);

        if decision.is_contiguous() {
            debug!(
                previous = %batch.previous_or_sentinel(),
                updates = batch.updates.len(),
                "batch is contiguous; applying"
            );
            self.store.apply(batch).await?;
            return Ok(ReconcileOutcome::Applied);
        }

        self.recover(batch, request, decision).await
    }

    async fn recover(
        &self,
        batch: &UpdateBatch,
        request: &ReconciliationRequest,
        decision: GapDecision,
    ) -> Result<ReconcileOutcome> {
        if let GapDecision::PendingFetch { pending: None } = decision {
            warn!("pending fetch requested without a pending sequence id");
        }
        info!(?decision, sync = request.run_synchronous_catch_up, "fetching missing updates");

        // No outbound request may race ahead of the catch-up.
        self.queue.pause();

        if request.run_synchronous_catch_up {
            self.gaps
                .fetch_and_apply_missing(batch, request.client_last_sequence_id)
                .await?;
            return Ok(ReconcileOutcome::CaughtUp { decision });
        }

        self.store.record_pending_state(batch)?;
        Ok(ReconcileOutcome::RecordedPending { decision })
    }
}
