use std::sync::{Mutex, PoisonError};

use anyhow::{bail, Result};
use async_trait::async_trait;
use seqsync_schemas::{SequenceId, UpdateBatch};

/// Server-side history of update batches.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Batches whose `last_sequence_id` lies in `(after, up_to]`, ascending.
    ///
    /// `after = None` starts from the beginning of the log.
    /// `up_to = None` reads through the server head.
    async fn fetch_range(
        &self,
        after: Option<SequenceId>,
        up_to: Option<SequenceId>,
    ) -> Result<Vec<UpdateBatch>>;
}

/// In-memory server log.
#[derive(Debug, Default)]
pub struct MemoryUpdateSource {
    log: Mutex<Vec<UpdateBatch>>,
    fail_next: Mutex<Option<String>>,
    fetches: Mutex<Vec<(Option<SequenceId>, Option<SequenceId>)>>,
}

impl MemoryUpdateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_log(log: Vec<UpdateBatch>) -> Self {
        Self {
            log: Mutex::new(log),
            ..Self::default()
        }
    }

    pub fn push(&self, batch: UpdateBatch) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch);
    }

    /// Make the next fetch fail with `msg`.
    pub fn fail_next(&self, msg: impl Into<String>) {
        *self.fail_next.lock().unwrap_or_else(PoisonError::into_inner) = Some(msg.into());
    }

    /// Every `(after, up_to)` range requested so far.
    pub fn fetches(&self) -> Vec<(Option<SequenceId>, Option<SequenceId>)> {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl UpdateSource for MemoryUpdateSource {
    async fn fetch_range(
        &self,
        after: Option<SequenceId>,
        up_to: Option<SequenceId>,
    ) -> Result<Vec<UpdateBatch>> {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((after, up_to));

        if let Some(msg) = self
            .fail_next
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            bail!(msg);
        }

        let log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<UpdateBatch> = log
            .iter()
            .filter(|b| match b.last_sequence_id {
                Some(last) => {
                    after.map_or(true, |a| last > a) && up_to.map_or(true, |u| last <= u)
                }
                None => false,
            })
            .cloned()
            .collect();
        out.sort_by_key(|b| b.last_sequence_id);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(n: u64) -> Option<SequenceId> {
        Some(SequenceId::new(n))
    }

    fn log() -> MemoryUpdateSource {
        MemoryUpdateSource::from_log(vec![
            UpdateBatch::new(7, 8, vec![]),
            UpdateBatch::new(5, 6, vec![]),
            UpdateBatch::new(6, 7, vec![]),
            UpdateBatch::new(8, 9, vec![]),
        ])
    }

    #[tokio::test]
    async fn range_is_half_open_and_sorted() {
        let got = log().fetch_range(seq(5), seq(8)).await.unwrap();
        let lasts: Vec<_> = got.iter().map(|b| b.last_sequence_id).collect();
        assert_eq!(lasts, vec![seq(6), seq(7), seq(8)]);
    }

    #[tokio::test]
    async fn open_bounds_read_everything() {
        let got = log().fetch_range(None, None).await.unwrap();
        assert_eq!(got.len(), 4);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let src = log();
        src.fail_next("connection reset");
        let err = src.fetch_range(None, None).await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
        assert!(src.fetch_range(None, None).await.is_ok());
        assert_eq!(src.fetches().len(), 2);
    }
}
