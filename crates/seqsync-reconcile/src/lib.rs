//! seqsync-reconcile
//!
//! Gatekeeper between "update received" and "update applied".
//!
//! - A batch is applied only when its declared predecessor matches the
//!   client's last applied sequence (or the client's sequence is unknown).
//! - Any other batch pauses the outbound request queue before recovery runs.
//! - A server-flagged pending fetch always takes the recovery path.
//!
//! Stateless decision logic. All state lives behind the collaborator traits.

mod collaborators;
mod engine;
mod types;

pub use collaborators::{GapHandler, RequestQueue, UpdateStore};
pub use engine::{detect_gap, is_contiguous, UpdateReconciler};
pub use types::{GapDecision, ReconcileOutcome};

pub use seqsync_schemas::{ReconciliationRequest, SequenceId, StateUpdate, UpdateBatch};
