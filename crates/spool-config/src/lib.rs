//! Layered YAML config loading, canonicalization and hashing.
//!
//! Config files are merged in order (later files override earlier ones via
//! deep-merge), then canonicalized — object keys sorted recursively — before
//! being hashed. Two config trees with identical content but different key
//! order or file split always produce the same `config_hash`, which is what
//! lets the daemon log a single hash per boot and compare deployments.

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

pub mod consumption;
pub mod secrets;

/// Load + merge YAML files from disk, in order.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());

    for p in paths {
        let s = fs::read_to_string(p).with_context(|| format!("read config: {p}"))?;
        merge_yaml_str(&mut merged, &s, p)?;
    }

    finish(merged)
}

/// Load + merge YAML already held in memory, in order. Same semantics as
/// [`load_layered_yaml`] minus the filesystem round-trip — used by tests and
/// by callers that assemble config layers from something other than files
/// (e.g. a secrets manager payload).
pub fn load_layered_yaml_from_strings(layers: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());

    for (i, s) in layers.iter().enumerate() {
        merge_yaml_str(&mut merged, s, &format!("<layer {i}>"))?;
    }

    finish(merged)
}

fn merge_yaml_str(dst: &mut Value, s: &str, label: &str) -> Result<()> {
    let yaml_val: serde_yaml::Value =
        serde_yaml::from_str(s).with_context(|| format!("parse yaml: {label}"))?;
    let json_val = serde_json::to_value(yaml_val).context("yaml->json conversion failed")?;
    deep_merge(dst, json_val);
    Ok(())
}

fn finish(merged: Value) -> Result<LoadedConfig> {
    let canonical = canonicalize_json(&merged);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Ok(LoadedConfig {
        config_json: serde_json::from_str(&canonical).context("canonical json parse failed")?,
        canonical_json: canonical,
        config_hash: hash,
    })
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_json: Value,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Deep-merge: objects merge recursively; arrays replaced; scalars overwritten.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

/// Canonicalize JSON by sorting all object keys recursively and emitting compact JSON.
fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Every leaf pointer (a JSON Pointer to a scalar, not an object/array) in a
/// config tree, sorted for deterministic output.
fn leaf_pointers(v: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_leaf_pointers(v, String::new(), &mut out);
    out.sort();
    out
}

fn collect_leaf_pointers(v: &Value, prefix: String, out: &mut Vec<String>) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, val) in map {
                collect_leaf_pointers(val, format!("{prefix}/{k}"), out);
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (i, val) in arr.iter().enumerate() {
                collect_leaf_pointers(val, format!("{prefix}/{i}"), out);
            }
        }
        _ => out.push(prefix),
    }
}

/// Leaf pointers present in `config_json` that fall outside every prefix in
/// `consumed_prefixes` (exact match or `prefix + "/"`). Used to flag
/// stale or typo'd config sections — see [`consumption::CONSUMED_POINTERS`].
pub fn unused_leaf_pointers(config_json: &Value, consumed_prefixes: &[&str]) -> Vec<String> {
    leaf_pointers(config_json)
        .into_iter()
        .filter(|p| {
            !consumed_prefixes
                .iter()
                .any(|prefix| p == prefix || p.starts_with(&format!("{prefix}/")))
        })
        .collect()
}

/// Log a warning for every config key nothing in the daemon reads. Call once
/// at boot, after [`load_layered_yaml`].
pub fn warn_unused_keys(config_json: &Value) {
    for pointer in unused_leaf_pointers(config_json, consumption::CONSUMED_POINTERS) {
        tracing::warn!(pointer = %pointer, "config key is not consumed by any known component");
    }
}
