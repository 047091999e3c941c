//! Secret literals and unused keys
//!
//! GREEN when:
//! - A token-looking string anywhere in the merged config aborts the load
//!   without echoing the value.
//! - Keys outside the consumed registry are reported under Warn and rejected
//!   under Fail.

use seqsync_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

#[test]
fn secret_literal_is_rejected_and_redacted() {
    let yaml = r#"
catch_up:
  fetch_timeout_ms: 1000
  auth_header: "Bearer abcdef0123456789"
"#;
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err().to_string();
    assert!(err.contains("CONFIG_SECRET_DETECTED"), "got: {err}");
    assert!(err.contains("/catch_up/auth_header"), "got: {err}");
    assert!(!err.contains("abcdef0123456789"), "secret must not leak: {err}");
}

#[test]
fn secret_in_overlay_is_rejected() {
    let base = "logging:\n  filter: info\n";
    let overlay = "logging:\n  token: \"ghp_0123456789abcdef\"\n";
    assert!(load_layered_yaml_from_strings(&[base, overlay]).is_err());
}

#[test]
fn consumed_sections_are_clean() {
    let yaml = r#"
reconcile:
  run_synchronous_catch_up: true
queue:
  channel_capacity: 8
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}

#[test]
fn unknown_section_warns_or_fails() {
    let yaml = r#"
reconcile:
  run_synchronous_catch_up: true
retry:
  attempts: 3
queues:
  capacity: 8
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/queues/capacity".to_string(), "/retry/attempts".to_string()]
    );

    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
}
