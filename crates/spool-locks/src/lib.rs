//! Process-wide keyed lock table (spec.md §4.2, C2).
//!
//! One lock per `tag_spool`; no TTL. A worker acquires before occupying a
//! spool and must present both its `worker_id` and the `lock_token` it was
//! handed back to release — a mismatch is `NotOwner`, never a silent no-op.
//!
//! Backed by a [`DashMap`] rather than a single global mutex so that writes
//! on unrelated spools never contend with each other (spec.md §5: "multi-spool
//! work runs in parallel"). A `lock-service backend URL` may be configured
//! (spool-config) for a future multi-instance backend; today this in-process
//! table is the sole authority — see DESIGN.md.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use spool_schemas::{TagSpool, WorkerId};
use thiserror::Error;
use uuid::Uuid;

/// Grace period before an abandoned lock (spool row shows no occupant, but
/// the lock table still holds one) is force-released (spec.md §4.2).
pub const RECONCILE_GRACE: Duration = Duration::hours(24);

#[derive(Debug, Clone)]
struct LockEntry {
    worker_id: WorkerId,
    token: Uuid,
    acquired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockToken(pub Uuid);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("spool is occupied by another worker")]
    Busy { owner: WorkerId },
    #[error("caller does not hold this lock")]
    NotOwner,
    #[error("no lock is held for this spool")]
    NotHeld,
}

/// In-process keyed lock table. Cheap to clone (wraps an `Arc`-free `DashMap`
/// behind `&self`; callers share one instance via `Arc<LockService>`).
#[derive(Default)]
pub struct LockService {
    table: DashMap<TagSpool, LockEntry>,
}

impl LockService {
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    /// Atomic set-if-absent. On success the caller now owns the lock and
    /// must present `(worker_id, token)` together to release it.
    pub fn try_acquire(&self, tag: &str, worker_id: &str) -> Result<LockToken, LockError> {
        use dashmap::mapref::entry::Entry;

        match self.table.entry(tag.to_string()) {
            Entry::Occupied(e) => Err(LockError::Busy {
                owner: e.get().worker_id.clone(),
            }),
            Entry::Vacant(e) => {
                let token = Uuid::new_v4();
                e.insert(LockEntry {
                    worker_id: worker_id.to_string(),
                    token,
                    acquired_at: Utc::now(),
                });
                tracing::debug!(tag_spool = tag, worker_id, %token, "lock acquired");
                Ok(LockToken(token))
            }
        }
    }

    /// Release; `worker_id` and `token` must both match the current holder.
    pub fn release(&self, tag: &str, worker_id: &str, token: LockToken) -> Result<(), LockError> {
        let Some(entry) = self.table.get(tag) else {
            return Err(LockError::NotHeld);
        };
        if entry.worker_id != worker_id || entry.token != token.0 {
            return Err(LockError::NotOwner);
        }
        drop(entry);
        self.table.remove(tag);
        tracing::debug!(tag_spool = tag, worker_id, "lock released");
        Ok(())
    }

    /// Release whichever token `worker_id` currently holds for `tag`, without
    /// the caller needing to carry the raw [`LockToken`] across an HTTP
    /// request/response boundary. The HTTP layer authenticates callers by
    /// `worker_id` alone; the token stays an internal implementation detail
    /// of this table (spec.md §4.2 ownership semantics still apply — a
    /// mismatched `worker_id` is `NotOwner`, same as [`Self::release`]).
    pub fn release_by_owner(&self, tag: &str, worker_id: &str) -> Result<(), LockError> {
        let token = self.table.get(tag).map(|e| e.token).ok_or(LockError::NotHeld)?;
        self.release(tag, worker_id, LockToken(token))
    }

    /// `true` iff `worker_id` currently holds the lock for `tag`.
    pub fn is_owned_by(&self, tag: &str, worker_id: &str) -> bool {
        self.table
            .get(tag)
            .map(|e| e.worker_id == worker_id)
            .unwrap_or(false)
    }

    pub fn owner(&self, tag: &str) -> Option<WorkerId> {
        self.table.get(tag).map(|e| e.worker_id.clone())
    }

    pub fn is_locked(&self, tag: &str) -> bool {
        self.table.contains_key(tag)
    }

    /// Opportunistic reconciliation (spec.md §4.2): if a lock exists but the
    /// spool row shows no occupant (`spool_ocupado_por_is_empty`) and the
    /// lock has outlived [`RECONCILE_GRACE`], force-release it. Returns
    /// `true` if a force-release happened.
    ///
    /// Invoked on INICIAR/TOMAR before the busy check. spec.md §4.2 also
    /// names an eager startup sweep, but this table is in-process and
    /// always starts empty on daemon boot (no persistence across
    /// restarts — see DESIGN.md's lock-backend open question), so there is
    /// never anything to reconcile before the first request arrives.
    pub fn reconcile(&self, tag: &str, spool_ocupado_por_is_empty: bool, now: DateTime<Utc>) -> bool {
        if !spool_ocupado_por_is_empty {
            return false;
        }
        let stale = self
            .table
            .get(tag)
            .map(|e| now - e.acquired_at > RECONCILE_GRACE)
            .unwrap_or(false);
        if stale {
            self.table.remove(tag);
            tracing::warn!(tag_spool = tag, "force-released abandoned lock past 24h grace");
        }
        stale
    }
}
