//! Config hash stability
//!
//! GREEN when:
//! - Loading the same documents twice yields the same hash.
//! - Key order inside a document does not change the hash.
//! - Overlays change both the typed view and the hash.

use seqsync_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
reconcile:
  run_synchronous_catch_up: false
catch_up:
  fetch_timeout_ms: 5000
queue:
  channel_capacity: 64
logging:
  filter: "info"
"#;

const BASE_YAML_REORDERED: &str = r#"
logging:
  filter: "info"
queue:
  channel_capacity: 64
catch_up:
  fetch_timeout_ms: 5000
reconcile:
  run_synchronous_catch_up: false
"#;

const OVERLAY_YAML: &str = r#"
reconcile:
  run_synchronous_catch_up: true
logging:
  filter: "seqsync=debug"
"#;

#[test]
fn same_inputs_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_base() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);

    let cfg = merged.sync_config().unwrap();
    assert!(cfg.reconcile.run_synchronous_catch_up);
    assert_eq!(cfg.logging.filter, "seqsync=debug");
    // Untouched keys survive the merge.
    assert_eq!(cfg.catch_up.fetch_timeout_ms, 5000);
    assert_eq!(cfg.queue.channel_capacity, 64);
}
