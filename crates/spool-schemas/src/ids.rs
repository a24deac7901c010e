//! Thin string newtypes for the two identifiers threaded through every
//! component: the spool tag and the worker id. Kept as plain `String`
//! aliases (not opaque newtypes) because the tabular store itself treats
//! them as free-form cell text — wrapping them in a marker type would just
//! add `.0` noise at every gateway call site without buying extra safety.

/// Stable key of a spool row, e.g. `"OT-001"`.
pub type TagSpool = String;

/// Worker identity as stored in worker columns, e.g. `"93"` (rendered with
/// initials as `"MR(93)"` — see [`crate::Worker::rendered`]).
pub type WorkerId = String;
