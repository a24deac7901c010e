use thiserror::Error;

/// Closed error contract for the tabular store gateway (spec.md §4.1).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Any transport failure talking to the backing store. Retriable.
    #[error("tabular store transport failure: {0}")]
    Transport(String),
    /// A required logical column is absent from a worksheet header. Fatal
    /// at startup — callers should treat this as a boot-time error.
    #[error("schema invalid: worksheet '{worksheet}' is missing column '{column}'")]
    SchemaInvalid { worksheet: String, column: String },
    /// The backend rejected the call due to rate limiting.
    #[error("tabular store rate limited")]
    RateLimited,
}

impl StoreError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, StoreError::Transport(_) | StoreError::RateLimited)
    }
}
