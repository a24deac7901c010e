//! Union Repository (C5), Spool Repository (C6), and the Version/Conflict
//! Service (C3) — spec.md §4.3, §4.5, §4.6.

pub mod conflict;
pub mod error;
pub mod spools;
pub mod unions;
mod value_ext;

pub use conflict::{retry_on_conflict, MAX_ATTEMPTS};
pub use error::RepoError;
pub use spools::{SpoolMetricsUpdate, SpoolRepository};
pub use unions::{UnionCompletion, UnionRepository};
