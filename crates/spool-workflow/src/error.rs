//! The single source of truth for domain error kinds (spec.md §7),
//! `spool-daemon` maps this to HTTP per spec.md §6.

use spool_locks::LockError;
use spool_repo::RepoError;
use spool_schemas::{TagSpool, WorkerId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("spool '{0}' not found")]
    SpoolNotFound(TagSpool),
    #[error("caller does not hold the lock for this spool")]
    NotAuthorized,
    #[error("SOLD requires at least one union with arm_fecha_fin set")]
    ArmPrerequisite,
    #[error("missing fecha_materiales prerequisite")]
    MissingMaterials,
    #[error("spool is occupied by another worker")]
    SpoolOccupied { owner: WorkerId },
    #[error("version conflict after exhausting retries")]
    VersionConflict,
    #[error("selection raced with a concurrent writer")]
    RaceCondition {
        unavailable_unions: Vec<u8>,
        available_count: u32,
        requested_count: u32,
    },
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),
    #[error("wrong route version for this spool")]
    WrongVersion { correct_endpoint: &'static str },
    #[error("tabular store unavailable")]
    StoreUnavailable,
    #[error("tabular store schema invalid")]
    SchemaInvalid,
    #[error("lock service reports no active session")]
    LockExpired,
}

impl From<RepoError> for DomainError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::SpoolNotFound(tag) => DomainError::SpoolNotFound(tag),
            RepoError::VersionConflict(_) => DomainError::VersionConflict,
            RepoError::UnionAlreadyComplete { .. } => DomainError::VersionConflict,
            RepoError::MalformedRow { .. } => DomainError::SchemaInvalid,
            RepoError::Store(store_err) => match store_err {
                spool_store::StoreError::SchemaInvalid { .. } => DomainError::SchemaInvalid,
                spool_store::StoreError::Transport(_) | spool_store::StoreError::RateLimited => {
                    DomainError::StoreUnavailable
                }
            },
        }
    }
}

impl From<LockError> for DomainError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Busy { owner } => DomainError::SpoolOccupied { owner },
            LockError::NotOwner => DomainError::NotAuthorized,
            LockError::NotHeld => DomainError::LockExpired,
        }
    }
}
