//! Declares which top-level config pointers this daemon actually consumes,
//! so `warn_unused_keys` (lib.rs) can flag stale/typo'd config sections
//! instead of silently ignoring them.

/// Top-level config sections read by the daemon boot path (spool-config,
/// spool-store, spool-locks). Anything else present in a layered config file
/// is either future-reserved or a typo — `warn_unused_keys` logs it.
pub static CONSUMED_POINTERS: &[&str] = &[
    "/store",
    "/locks",
    "/rate_monitor",
    "/workers",
];
