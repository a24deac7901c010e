//! spool-daemon library target.
//!
//! Exposes the router and shared state for integration tests; the binary
//! `main.rs` wires a real tabular-store backend around the same types.

pub mod api_types;
pub mod routes;
pub mod state;
pub mod workers;
