//! Version/Conflict Service (spec.md §4.3, C3).
//!
//! Optimistic compare-and-swap on a per-row `version` UUID. [`retry_on_conflict`]
//! drives up to [`MAX_ATTEMPTS`] attempts of a caller-supplied closure; the
//! closure re-reads and rebuilds its write intent itself on each attempt
//! (the `recompute` step spec.md §4.3 describes) — this module only owns the
//! attempt counting and the jittered backoff between attempts.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::RepoError;

/// Bounded retry count (spec.md §4.3).
pub const MAX_ATTEMPTS: u32 = 3;

/// `100ms · 2^(n-1) + uniform(0,50ms)` for attempt `n` (1-indexed).
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let base_ms = 100u64.saturating_mul(1u64 << (attempt.saturating_sub(1)));
    let jitter_ms = rand::thread_rng().gen_range(0..=50u64);
    Duration::from_millis(base_ms + jitter_ms)
}

/// Run `op` up to [`MAX_ATTEMPTS`] times. `op` receives the 1-indexed
/// attempt number and is responsible for re-reading fresh state and
/// recomputing its write intent on every call — a retry never reuses a
/// prior attempt's stale data. Only [`RepoError::VersionConflict`] triggers
/// a retry; any other error propagates immediately.
pub async fn retry_on_conflict<T, F, Fut>(mut op: F) -> Result<T, RepoError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, RepoError>>,
{
    let mut attempt = 1u32;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(RepoError::VersionConflict(tag)) => {
                if attempt >= MAX_ATTEMPTS {
                    return Err(RepoError::VersionConflict(tag));
                }
                tokio::time::sleep(backoff_for_attempt(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
