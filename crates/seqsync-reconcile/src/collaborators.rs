//! Collaborator seams consumed by [`crate::UpdateReconciler`].
//!
//! The reconciler never owns queue, store or network state. Production wires
//! the runtime implementations behind these traits; tests wire recording fakes.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use seqsync_schemas::{SequenceId, UpdateBatch};

/// Outbound request queue.
///
/// # Contract
/// `pause` is synchronous and fire-and-forget: it stops further outbound
/// dispatch and returns without acknowledgement. Pausing an already paused
/// queue is a no-op. Resumption belongs to whoever finishes the catch-up.
pub trait RequestQueue: Send + Sync {
    fn pause(&self);
}

/// Local replica of server state.
#[async_trait]
pub trait UpdateStore: Send + Sync {
    /// Merge the batch into local state. Resolves once merged.
    async fn apply(&self, batch: &UpdateBatch) -> Result<()>;

    /// Keep the batch for deferred reconciliation. No network access.
    fn record_pending_state(&self, batch: &UpdateBatch) -> Result<()>;
}

/// Fetches and applies the range a client is missing.
#[async_trait]
pub trait GapHandler: Send + Sync {
    /// Resolves once local state has caught up through `batch`.
    async fn fetch_and_apply_missing(
        &self,
        batch: &UpdateBatch,
        client_last_sequence_id: Option<SequenceId>,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Arc forwarding
// ---------------------------------------------------------------------------

impl<T: RequestQueue + ?Sized> RequestQueue for Arc<T> {
    fn pause(&self) {
        (**self).pause()
    }
}

#[async_trait]
impl<T: UpdateStore + ?Sized> UpdateStore for Arc<T> {
    async fn apply(&self, batch: &UpdateBatch) -> Result<()> {
        (**self).apply(batch).await
    }

    fn record_pending_state(&self, batch: &UpdateBatch) -> Result<()> {
        (**self).record_pending_state(batch)
    }
}

#[async_trait]
impl<T: GapHandler + ?Sized> GapHandler for Arc<T> {
    async fn fetch_and_apply_missing(
        &self,
        batch: &UpdateBatch,
        client_last_sequence_id: Option<SequenceId>,
    ) -> Result<()> {
        (**self)
            .fetch_and_apply_missing(batch, client_last_sequence_id)
            .await
    }
}
