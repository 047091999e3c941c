//! Scenario: a sequence gap pauses the request queue before recovery.
//!
//! # Invariants under test
//!
//! 1. Gap + synchronous catch-up → pause, then gap handler with the original
//!    batch and the client's last sequence. Nothing is applied by the
//!    reconciler itself.
//! 2. Gap + deferred → pause, then record-pending. Gap handler never runs.
//! 3. A client ahead of the batch is also a gap.
//! 4. A missing predecessor compares as the sentinel and is a gap for any
//!    known client sequence other than the sentinel.

use seqsync_reconcile::{GapDecision, ReconcileOutcome, ReconciliationRequest};
use seqsync_testkit::{batch, recording_reconciler, seq, Event};

#[tokio::test]
async fn gap_with_sync_catch_up_pauses_then_invokes_handler() {
    let (r, log) = recording_reconciler();
    let b = batch(7, 8);

    let out = r
        .reconcile(&b, &ReconciliationRequest::new(Some(seq(5)), true))
        .await
        .unwrap();

    assert_eq!(
        out,
        ReconcileOutcome::CaughtUp {
            decision: GapDecision::Gap {
                previous: seq(7),
                client_last: seq(5),
            }
        }
    );
    assert_eq!(
        log.events(),
        vec![
            Event::Paused,
            Event::GapHandlerInvoked {
                batch: b,
                client_last: Some(seq(5)),
            },
        ]
    );
}

#[tokio::test]
async fn gap_without_sync_records_pending() {
    let (r, log) = recording_reconciler();
    let b = batch(7, 8);

    let out = r
        .reconcile(&b, &ReconciliationRequest::new(Some(seq(5)), false))
        .await
        .unwrap();

    assert!(matches!(out, ReconcileOutcome::RecordedPending { .. }));
    assert_eq!(log.events(), vec![Event::Paused, Event::RecordedPending(b)]);
    assert_eq!(log.gap_handler_calls(), 0);
}

#[tokio::test]
async fn client_ahead_of_batch_is_a_gap() {
    let (r, log) = recording_reconciler();

    let out = r
        .reconcile(&batch(3, 4), &ReconciliationRequest::new(Some(seq(5)), true))
        .await
        .unwrap();

    assert!(matches!(out, ReconcileOutcome::CaughtUp { .. }));
    assert_eq!(log.events()[0], Event::Paused);
}

#[tokio::test]
async fn missing_previous_is_compared_as_sentinel() {
    let (r, log) = recording_reconciler();
    let mut b = batch(0, 9);
    b.previous_sequence_id = None;

    let out = r
        .reconcile(&b, &ReconciliationRequest::new(Some(seq(5)), false))
        .await
        .unwrap();

    assert_eq!(
        out.decision(),
        GapDecision::Gap {
            previous: seq(0),
            client_last: seq(5),
        }
    );
    assert_eq!(log.count_paused(), 1);
}

#[tokio::test]
async fn exactly_one_branch_per_call() {
    let cases = [
        (batch(5, 6), Some(5), true),
        (batch(5, 6), None, false),
        (batch(7, 8), Some(5), true),
        (batch(7, 8), Some(5), false),
    ];

    for (b, client_last, sync) in cases {
        let (r, log) = recording_reconciler();
        r.reconcile(&b, &ReconciliationRequest::new(client_last.map(seq), sync))
            .await
            .unwrap();

        let terminal = log
            .events()
            .iter()
            .filter(|e| !matches!(e, Event::Paused))
            .count();
        assert_eq!(terminal, 1, "client_last={client_last:?} sync={sync}");
    }
}
