//! seqsync-runtime
//!
//! In-process collaborators for [`seqsync_reconcile::UpdateReconciler`]:
//!
//! - [`SequentialQueue`]: outbound request queue with pause / resume.
//! - [`MemoryUpdateStore`]: key-value replica tracking the last applied sequence.
//! - [`CatchUpHandler`]: fetches the missing range from an [`UpdateSource`],
//!   applies it, then resumes the queue.
//! - [`spawn_reconcile_loop`]: serializes batch delivery so reconcile calls
//!   never interleave against the same sequence state.

mod catch_up;
mod driver;
mod queue;
mod source;
mod store;

use std::sync::Arc;
use std::time::Duration;

pub use catch_up::{CatchUpHandler, CatchUpTimeout, IncompleteCatchUp};
pub use driver::{drain_pending, spawn_reconcile_loop, IncomingBatch, LoopDefaults};
pub use queue::{OutboundRequest, SequentialQueue};
pub use source::{MemoryUpdateSource, UpdateSource};
pub use store::{MemoryUpdateStore, PendingBatch, SequenceTracker};

use seqsync_reconcile::UpdateReconciler;

/// Reconciler wired to the in-process collaborators.
pub type MemoryReconciler<U> = UpdateReconciler<
    Arc<SequentialQueue>,
    Arc<MemoryUpdateStore>,
    CatchUpHandler<U, Arc<MemoryUpdateStore>>,
>;

/// Wire a reconciler over fresh in-process queue and store.
///
/// The queue and store handles are shared with the returned reconciler.
pub fn memory_reconciler<U: UpdateSource>(
    source: U,
    store: Arc<MemoryUpdateStore>,
    fetch_timeout: Duration,
) -> (MemoryReconciler<U>, Arc<SequentialQueue>) {
    let queue = Arc::new(SequentialQueue::new());
    let gaps = CatchUpHandler::new(source, Arc::clone(&store), Arc::clone(&queue), fetch_timeout);
    let reconciler = UpdateReconciler::new(Arc::clone(&queue), store, gaps);
    (reconciler, queue)
}
