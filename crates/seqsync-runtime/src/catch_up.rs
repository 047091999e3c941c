//! Gap recovery.
//!
//! [`CatchUpHandler`] is the [`GapHandler`] the runtime wires into the
//! reconciler. It owns queue resumption: the reconciler pauses, the handler
//! resumes once the catch-up finished, whether it succeeded or not.
//!
//! ```text
//! fetch_and_apply_missing(batch, client_last)
//!     │
//!     ├── target = pending_sequence_id        (pending fetch)
//!     │          | batch.previous_or_sentinel (gap)
//!     ├── source.fetch_range(client_last, target)   bounded by fetch_timeout
//!     ├── store.apply(each fetched batch)           ascending
//!     ├── store.apply(batch)                        gap only
//!     └── queue.resume()                            always
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use seqsync_reconcile::{GapHandler, UpdateStore};
use seqsync_schemas::{SequenceId, UpdateBatch};
use tracing::{info, warn};

use crate::queue::SequentialQueue;
use crate::source::UpdateSource;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The missing-range fetch did not finish within the configured bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatchUpTimeout {
    pub after: Option<SequenceId>,
    pub up_to: Option<SequenceId>,
    pub timeout_ms: u64,
}

impl std::fmt::Display for CatchUpTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CATCH_UP_TIMEOUT: fetch after={} up_to={} exceeded {}ms",
            fmt_seq(self.after),
            fmt_seq(self.up_to),
            self.timeout_ms
        )
    }
}

impl std::error::Error for CatchUpTimeout {}

/// The server returned less than the range the client is missing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncompleteCatchUp {
    pub target: SequenceId,
    pub reached: Option<SequenceId>,
}

impl std::fmt::Display for IncompleteCatchUp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CATCH_UP_INCOMPLETE: wanted through {} but server history ends at {}",
            self.target,
            fmt_seq(self.reached)
        )
    }
}

impl std::error::Error for IncompleteCatchUp {}

fn fmt_seq(s: Option<SequenceId>) -> String {
    s.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
}

// ---------------------------------------------------------------------------
// CatchUpHandler
// ---------------------------------------------------------------------------

pub struct CatchUpHandler<U, S>
where
    U: UpdateSource,
    S: UpdateStore,
{
    source: U,
    store: S,
    queue: Arc<SequentialQueue>,
    fetch_timeout: Duration,
}

impl<U, S> CatchUpHandler<U, S>
where
    U: UpdateSource,
    S: UpdateStore,
{
    pub fn new(source: U, store: S, queue: Arc<SequentialQueue>, fetch_timeout: Duration) -> Self {
        Self {
            source,
            store,
            queue,
            fetch_timeout,
        }
    }

    pub fn source(&self) -> &U {
        &self.source
    }

    async fn catch_up(&self, batch: &UpdateBatch, client_last: Option<SequenceId>) -> Result<()> {
        let target = if batch.requires_pending_fetch {
            batch.pending_sequence_id
        } else {
            Some(batch.previous_or_sentinel())
        };

        let missing = tokio::time::timeout(
            self.fetch_timeout,
            self.source.fetch_range(client_last, target),
        )
        .await
        .map_err(|_| CatchUpTimeout {
            after: client_last,
            up_to: target,
            timeout_ms: self.fetch_timeout.as_millis() as u64,
        })??;

        let reached = missing.last().and_then(|b| b.last_sequence_id).or(client_last);
        if let Some(target) = target {
            if reached.map_or(true, |r| r < target) && client_last.map_or(true, |c| c < target) {
                return Err(IncompleteCatchUp { target, reached }.into());
            }
        }

        for b in &missing {
            self.store.apply(b).await?;
        }

        if !batch.requires_pending_fetch {
            self.store.apply(batch).await?;
        }

        info!(
            fetched = missing.len(),
            reached = %fmt_seq(reached),
            "caught up on missing updates"
        );
        Ok(())
    }
}

#[async_trait]
impl<U, S> GapHandler for CatchUpHandler<U, S>
where
    U: UpdateSource,
    S: UpdateStore,
{
    async fn fetch_and_apply_missing(
        &self,
        batch: &UpdateBatch,
        client_last_sequence_id: Option<SequenceId>,
    ) -> Result<()> {
        let result = self.catch_up(batch, client_last_sequence_id).await;
        self.queue.resume();
        if let Err(e) = &result {
            warn!(error = %e, "catch-up failed; request queue resumed");
        }
        result
    }
}
