use seqsync_schemas::SequenceId;

/// Result of the gap test for one batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GapDecision {
    /// Batch follows the client's last applied sequence (or that sequence is
    /// unknown). Safe to apply directly.
    Contiguous,

    /// Server withheld the payload and asked for a separate fetch.
    /// `pending` may be `None` when the server omitted the target.
    PendingFetch { pending: Option<SequenceId> },

    /// Batch predecessor does not match the client's last applied sequence.
    Gap {
        previous: SequenceId,
        client_last: SequenceId,
    },
}

impl GapDecision {
    /// `true` when the batch may be applied without recovery.
    pub fn is_contiguous(&self) -> bool {
        matches!(self, GapDecision::Contiguous)
    }

    /// `true` when the request queue must be paused and recovery must run.
    pub fn needs_catch_up(&self) -> bool {
        !self.is_contiguous()
    }
}

/// Which branch a reconcile call took.
///
/// Exactly one of these happens per call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Batch applied directly; queue untouched.
    Applied,
    /// Queue paused, gap handler ran the full catch-up.
    CaughtUp { decision: GapDecision },
    /// Queue paused, batch recorded for deferred catch-up.
    RecordedPending { decision: GapDecision },
}

impl ReconcileOutcome {
    pub fn decision(&self) -> GapDecision {
        match self {
            ReconcileOutcome::Applied => GapDecision::Contiguous,
            ReconcileOutcome::CaughtUp { decision }
            | ReconcileOutcome::RecordedPending { decision } => *decision,
        }
    }

    /// `true` if this call paused the request queue.
    pub fn paused_queue(&self) -> bool {
        !matches!(self, ReconcileOutcome::Applied)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied => "APPLIED",
            ReconcileOutcome::CaughtUp { .. } => "CAUGHT_UP",
            ReconcileOutcome::RecordedPending { .. } => "RECORDED_PENDING",
        }
    }
}
