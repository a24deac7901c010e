//! `unused_leaf_pointers` — detects config keys nothing in the daemon reads.
//!
//! The consumed-pointer registry ([`spool_config::consumption::CONSUMED_POINTERS`])
//! must reflect what the daemon actually reads; these tests pin its current
//! contract rather than re-deriving it.

use spool_config::consumption::CONSUMED_POINTERS;
use spool_config::{load_layered_yaml_from_strings, unused_leaf_pointers};

#[test]
fn unused_section_is_reported() {
    let yaml = r#"
store:
  id: "spool-tracker-main"

rate_monitor:
  target_per_min: 30

unused_section:
  foo: 123
  bar: 456
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("config load must succeed");
    let unused = unused_leaf_pointers(&loaded.config_json, CONSUMED_POINTERS);

    assert!(unused.contains(&"/unused_section/foo".to_string()));
    assert!(unused.contains(&"/unused_section/bar".to_string()));
}

#[test]
fn only_consumed_sections_are_clean() {
    let yaml = r#"
store:
  id: "spool-tracker-main"
  credential_env: "SPOOL_STORE_API_KEY"
locks:
  backend_url: "https://locks.internal"
rate_monitor:
  target_per_min: 30
  quota_per_min: 60
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("config load must succeed");
    let unused = unused_leaf_pointers(&loaded.config_json, CONSUMED_POINTERS);

    assert!(unused.is_empty(), "expected no unused keys, got: {unused:?}");
}

#[test]
fn prefix_match_does_not_consume_unrelated_siblings() {
    // "/store" is consumed, but a sibling top-level section with a similar
    // name must not accidentally match via a naive starts_with on the raw
    // string (without the separator check).
    let yaml = r#"
store:
  id: "spool-tracker-main"
storefront:
  theme: "dark"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("config load must succeed");
    let unused = unused_leaf_pointers(&loaded.config_json, CONSUMED_POINTERS);

    assert!(unused.contains(&"/storefront/theme".to_string()));
}

#[test]
fn deterministic_ordering() {
    let yaml = r#"
store:
  id: "spool-tracker-main"
unused:
  b: 2
  a: 1
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("config load must succeed");
    let unused = unused_leaf_pointers(&loaded.config_json, CONSUMED_POINTERS);

    assert_eq!(
        unused,
        vec!["/unused/a".to_string(), "/unused/b".to_string()]
    );
}
