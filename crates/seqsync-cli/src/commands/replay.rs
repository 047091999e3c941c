//! `seqsync replay`: drive server pushes through the serialized reconcile
//! loop against an in-memory replica, then drain any deferred catch-up.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use seqsync_config::{report_unused_keys, SyncConfig, UnusedKeyPolicy};
use seqsync_reconcile::ReconcileOutcome;
use seqsync_runtime::{
    drain_pending, memory_reconciler, spawn_reconcile_loop, IncomingBatch, LoopDefaults,
    MemoryUpdateSource, MemoryUpdateStore, SequenceTracker,
};
use seqsync_schemas::{SequenceId, UpdateBatch};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{init_tracing, load_config};

pub struct ReplayArgs {
    pub server_log: String,
    pub pushes: String,
    pub client_last: Option<u64>,
    pub sync: bool,
    pub config_paths: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PushReport {
    index: usize,
    outcome: Option<&'static str>,
    decision: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    config_hash: Option<String>,
    pushes: Vec<PushReport>,
    drained: Option<&'static str>,
    drain_error: Option<String>,
    last_applied: Option<SequenceId>,
    pause_count: u64,
    queue_paused: bool,
    state: BTreeMap<String, Value>,
}

fn read_batches(path: &str) -> Result<Vec<UpdateBatch>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read batches: {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parse batches json: {path}"))
}

fn push_report(index: usize, result: Result<ReconcileOutcome>) -> PushReport {
    match result {
        Ok(outcome) => PushReport {
            index,
            outcome: Some(outcome.as_str()),
            decision: Some(format!("{:?}", outcome.decision())),
            error: None,
        },
        Err(e) => PushReport {
            index,
            outcome: None,
            decision: None,
            error: Some(format!("{e:#}")),
        },
    }
}

pub async fn run(args: ReplayArgs) -> Result<()> {
    let (cfg, config_hash) = if args.config_paths.is_empty() {
        (SyncConfig::default(), None)
    } else {
        let loaded = load_config(&args.config_paths)?;
        warn_unused_keys(&loaded.config_json)?;
        (loaded.sync_config()?, Some(loaded.config_hash))
    };

    init_tracing(&cfg.logging.filter);

    let source = MemoryUpdateSource::from_log(read_batches(&args.server_log)?);
    let pushes = read_batches(&args.pushes)?;

    let store = Arc::new(match args.client_last {
        Some(n) => MemoryUpdateStore::starting_at(SequenceId::new(n)),
        None => MemoryUpdateStore::new(),
    });
    let (reconciler, queue) = memory_reconciler(source, Arc::clone(&store), cfg.fetch_timeout());
    let reconciler = Arc::new(reconciler);

    let defaults = LoopDefaults {
        run_synchronous_catch_up: args.sync || cfg.reconcile.run_synchronous_catch_up,
    };
    info!(
        pushes = pushes.len(),
        sync = defaults.run_synchronous_catch_up,
        client_last = ?store.last_applied(),
        "replay starting"
    );

    let (tx, rx) = mpsc::channel(cfg.queue.channel_capacity);
    let handle = spawn_reconcile_loop(Arc::clone(&reconciler), rx, defaults);

    let mut replies = Vec::with_capacity(pushes.len());
    for batch in pushes {
        let (incoming, reply) = IncomingBatch::new(batch).with_reply();
        tx.send(incoming)
            .await
            .context("reconcile loop stopped early")?;
        replies.push(reply);
    }
    drop(tx);

    let mut reports = Vec::with_capacity(replies.len());
    for (index, reply) in replies.into_iter().enumerate() {
        let result = reply.await.context("reconcile loop dropped a reply")?;
        if let Err(e) = &result {
            warn!(index, error = %e, "push failed");
        }
        reports.push(push_report(index, result));
    }
    handle.await.context("reconcile loop panicked")?;

    let (drained, drain_error) = match drain_pending(&*reconciler).await {
        Ok(outcome) => (outcome.map(|o| o.as_str()), None),
        Err(e) => {
            warn!(error = %e, "final drain failed");
            (None, Some(format!("{e:#}")))
        }
    };

    let report = ReplayReport {
        config_hash,
        pushes: reports,
        drained,
        drain_error,
        last_applied: store.last_applied(),
        pause_count: queue.pause_count(),
        queue_paused: queue.is_paused(),
        state: store.snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Tracing is not installed yet when config loads, so this goes to stderr.
fn warn_unused_keys(config_json: &Value) -> Result<()> {
    let report = report_unused_keys(config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        eprintln!(
            "warning: unused config keys: {:?}",
            report.unused_leaf_pointers
        );
    }
    Ok(())
}
