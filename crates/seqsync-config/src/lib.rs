//! seqsync-config
//!
//! Layered YAML configuration for the sync runtime.
//!
//! - Documents merge in order: earlier docs are base, later docs override.
//! - The merged document is canonicalized and hashed (SHA-256) so a run can
//!   log exactly which configuration it used.
//! - String leaves that look like credentials abort the load.
//! - Leaves outside the consumed registry can be reported or rejected.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::time::Duration;

/// If any leaf string value starts with one of these, the load aborts with
/// CONFIG_SECRET_DETECTED. Tokens belong in the environment, not in YAML.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",
    "sk_live",
    "sk_test",
    "AKIA",
    "-----BEGIN",
    "ghp_",
    "gho_",
    "glpat-",
    "xoxb-",
    "xoxp-",
    "Bearer ",
];

/// Top-level sections read by the runtime. A leaf under any of these is
/// consumed; anything else is reported as unused.
pub const CONSUMED_SECTIONS: &[&str] = &["reconcile", "catch_up", "queue", "logging"];

// ---------------------------------------------------------------------------
// Typed view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSection {
    /// Default for pushes that do not say whether to catch up now.
    pub run_synchronous_catch_up: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatchUpSection {
    pub fetch_timeout_ms: u64,
}

impl Default for CatchUpSection {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    /// Capacity of the batch channel feeding the reconcile loop.
    pub channel_capacity: usize,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing_subscriber::EnvFilter` directive used when RUST_LOG is unset.
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub reconcile: ReconcileSection,
    pub catch_up: CatchUpSection,
    pub queue: QueueSection,
    pub logging: LoggingSection,
}

impl SyncConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: SyncConfig =
            serde_json::from_value(v.clone()).context("config does not match SyncConfig shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.catch_up.fetch_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.catch_up.fetch_timeout_ms == 0 {
            bail!("CONFIG_INVALID: catch_up.fetch_timeout_ms must be > 0");
        }
        if self.queue.channel_capacity == 0 {
            bail!("CONFIG_INVALID: queue.channel_capacity must be > 0");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Layered load
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    pub fn sync_config(&self) -> Result<SyncConfig> {
        SyncConfig::from_json(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty document parses as null; it contributes nothing.
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut found = None;
    visit_leaves(v, "", &mut |ptr, leaf| {
        if found.is_none() && leaf.as_str().is_some_and(looks_like_secret) {
            found = Some(ptr.to_string());
        }
    });
    if let Some(ptr) = found {
        bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim_start();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

// ---------------------------------------------------------------------------
// Unused-key guard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Unused leaf pointers, sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// List config leaves no runtime component reads.
///
/// `Warn` always returns the report; `Fail` errors when it is not clean.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut unused = Vec::new();
    visit_leaves(config_json, "", &mut |ptr, _| {
        if !is_consumed(ptr) {
            unused.push(ptr.to_string());
        }
    });
    unused.sort();

    let report = UnusedKeyReport {
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s): {:?}",
            report.unused_leaf_pointers.len(),
            report.unused_leaf_pointers.iter().take(12).collect::<Vec<_>>()
        );
    }

    Ok(report)
}

/// "/queue/x" is consumed by the `queue` section; "/queues/x" is not.
fn is_consumed(ptr: &str) -> bool {
    let section = ptr.trim_start_matches('/').split('/').next().unwrap_or_default();
    CONSUMED_SECTIONS.contains(&section)
}

/// Call `f` with the JSON pointer and value of every scalar or empty leaf.
fn visit_leaves(v: &Value, ptr: &str, f: &mut impl FnMut(&str, &Value)) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, child) in map {
                let escaped = k.replace('~', "~0").replace('/', "~1");
                visit_leaves(child, &format!("{ptr}/{escaped}"), f);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                visit_leaves(child, &format!("{ptr}/{i}"), f);
            }
        }
        _ if !ptr.is_empty() => f(ptr, v),
        _ => {}
    }
}
