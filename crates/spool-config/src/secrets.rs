//! Runtime secret & boot-config resolution.
//!
//! # Contract
//! - Config YAML stores only env var **NAMES** (e.g. `"SPOOL_STORE_API_KEY"`),
//!   never values.
//! - At startup, callers invoke [`resolve_boot_config`] once; the returned
//!   [`BootConfig`] is passed into constructors — never scatter
//!   `std::env::var` calls across the codebase.
//! - `Debug` on [`BootConfig`] redacts the credential.
//! - Error messages reference the env var NAME, never the value.
//!
//! Grounded on the original secret-resolution module (single choke point +
//! redacted `Debug`), repointed at spec.md §6's boot inputs: tabular-store
//! identifier, credential reference, lock-service backend URL, and the
//! optional rate-monitor thresholds (default target 30 writes/min vs a 60
//! quota).

use anyhow::{bail, Result};
use serde_json::Value;

/// Sliding-window rate-monitor thresholds (spec.md §4.10 design notes, §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateMonitorThresholds {
    pub target_per_min: u32,
    pub quota_per_min: u32,
}

impl Default for RateMonitorThresholds {
    fn default() -> Self {
        RateMonitorThresholds {
            target_per_min: 30,
            quota_per_min: 60,
        }
    }
}

/// All runtime-resolved boot inputs for one daemon instantiation.
///
/// Built once via [`resolve_boot_config`]. **The credential is redacted in
/// `Debug` output.**
#[derive(Clone)]
pub struct BootConfig {
    /// Identifies which tabular store (spreadsheet) the gateway talks to.
    pub store_id: String,
    /// Bearer credential used by the gateway. `None` if the named env var is
    /// absent — callers decide whether that is fatal (it is, at boot, for a
    /// live daemon; test fakes don't need it).
    pub store_credential: Option<String>,
    /// Lock-service backend URL. Informational today — the in-process lock
    /// table (spool-locks) is authoritative for a single daemon instance; see
    /// DESIGN.md for the multi-instance open question.
    pub lock_backend_url: Option<String>,
    pub rate_monitor: RateMonitorThresholds,
}

impl std::fmt::Debug for BootConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootConfig")
            .field("store_id", &self.store_id)
            .field(
                "store_credential",
                &self.store_credential.as_ref().map(|_| "<REDACTED>"),
            )
            .field("lock_backend_url", &self.lock_backend_url)
            .field("rate_monitor", &self.rate_monitor)
            .finish()
    }
}

/// Read a non-empty string value at `pointer` from a JSON config.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn read_u32_at(config: &Value, pointer: &str) -> Option<u32> {
    config.pointer(pointer)?.as_u64().map(|v| v as u32)
}

/// Resolve a named environment variable; `None` if unset or blank.
/// Never logged or echoed — callers surface the env var NAME on failure.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve the daemon's boot configuration from layered config JSON plus the
/// environment.
///
/// # Required
/// `store.id` must be present in config (the store identifier is not a
/// secret and lives in YAML directly).
///
/// # Errors
/// Returns `Err` naming the missing config pointer or env var NAME. The
/// credential value itself is never included in an error message.
pub fn resolve_boot_config(config_json: &Value) -> Result<BootConfig> {
    let store_id = read_str_at(config_json, "/store/id").ok_or_else(|| {
        anyhow::anyhow!("CONFIG_MISSING: required config key '/store/id' is absent or empty")
    })?;

    let credential_var = read_str_at(config_json, "/store/credential_env")
        .unwrap_or_else(|| "SPOOL_STORE_API_KEY".to_string());
    let store_credential = resolve_env(&credential_var);

    let lock_backend_url = read_str_at(config_json, "/locks/backend_url");

    let rate_monitor = RateMonitorThresholds {
        target_per_min: read_u32_at(config_json, "/rate_monitor/target_per_min").unwrap_or(30),
        quota_per_min: read_u32_at(config_json, "/rate_monitor/quota_per_min").unwrap_or(60),
    };

    Ok(BootConfig {
        store_id,
        store_credential,
        lock_backend_url,
        rate_monitor,
    })
}

/// Like [`resolve_boot_config`] but fails closed if the store credential is
/// absent — use at daemon startup (SchemaInvalid-equivalent boot failure);
/// test harnesses that only need `store_id` should call
/// [`resolve_boot_config`] directly.
pub fn resolve_boot_config_strict(config_json: &Value) -> Result<BootConfig> {
    let cfg = resolve_boot_config(config_json)?;
    if cfg.store_credential.is_none() {
        bail!(
            "SECRETS_MISSING: tabular store credential env var is not set or empty \
             (see '/store/credential_env' in config, default 'SPOOL_STORE_API_KEY')"
        );
    }
    Ok(cfg)
}
