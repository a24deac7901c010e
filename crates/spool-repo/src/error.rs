use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Store(#[from] spool_store::StoreError),
    #[error("spool '{0}' not found")]
    SpoolNotFound(String),
    #[error("version conflict on '{0}' after exhausting retries")]
    VersionConflict(String),
    #[error("union {n_union} of '{tag_spool}' is already complete for this operation")]
    UnionAlreadyComplete { tag_spool: String, n_union: u8 },
    #[error("malformed row in worksheet '{worksheet}': {detail}")]
    MalformedRow { worksheet: String, detail: String },
}
