//! Config hash stability: same content, different key order or file split,
//! must still canonicalize and hash identically.

use spool_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
store:
  id: "spool-tracker-main"
  credential_env: "SPOOL_STORE_API_KEY"
locks:
  backend_url: "https://locks.internal/v1"
rate_monitor:
  target_per_min: 30
  quota_per_min: 60
"#;

/// Same content as BASE_YAML but with keys in different order.
const BASE_YAML_REORDERED: &str = r#"
rate_monitor:
  quota_per_min: 60
  target_per_min: 30
locks:
  backend_url: "https://locks.internal/v1"
store:
  credential_env: "SPOOL_STORE_API_KEY"
  id: "spool-tracker-main"
"#;

const OVERLAY_YAML: &str = r#"
rate_monitor:
  target_per_min: 45
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(
        a.config_hash, b.config_hash,
        "same YAML input must produce identical hash"
    );
    assert_eq!(
        a.canonical_json, b.canonical_json,
        "canonical JSON must be identical for same input"
    );
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(
        original.config_hash, reordered.config_hash,
        "reordering keys in YAML must not change the hash (canonicalization)"
    );
    assert_eq!(
        original.canonical_json, reordered.canonical_json,
        "canonical JSON must be identical regardless of key ordering in source"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    let modified = r#"
store:
  id: "spool-tracker-secondary"
  credential_env: "SPOOL_STORE_API_KEY"
locks:
  backend_url: "https://locks.internal/v2"
rate_monitor:
  target_per_min: 10
  quota_per_min: 20
"#;
    let b = load_layered_yaml_from_strings(&[modified]).unwrap();

    assert_ne!(
        a.config_hash, b.config_hash,
        "different config values must produce different hashes"
    );
}

#[test]
fn merged_layers_produce_stable_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_eq!(
        a.config_hash, b.config_hash,
        "same merge layers must produce identical hash"
    );

    // Verify the overlay actually took effect
    let target = a
        .config_json
        .pointer("/rate_monitor/target_per_min")
        .and_then(|v| v.as_u64())
        .unwrap();
    assert_eq!(target, 45, "overlay should override base target_per_min");

    let quota = a
        .config_json
        .pointer("/rate_monitor/quota_per_min")
        .and_then(|v| v.as_u64())
        .unwrap();
    assert_eq!(
        quota, 60,
        "base quota_per_min should survive an overlay that doesn't touch it"
    );
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    // SHA-256 produces 32 bytes = 64 hex characters
    assert_eq!(
        loaded.config_hash.len(),
        64,
        "SHA-256 hash should be 64 hex chars"
    );
    assert!(
        loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()),
        "hash should contain only hex digits"
    );
}

#[test]
fn empty_config_produces_stable_hash() {
    let a = load_layered_yaml_from_strings(&["{}"]).unwrap();
    let b = load_layered_yaml_from_strings(&["{}"]).unwrap();

    assert_eq!(
        a.config_hash, b.config_hash,
        "empty configs must produce identical hash"
    );
}
