//! Core library for dutycal.
//!
//! This crate holds everything that decides and publishes the duty rota:
//! - `fairness` picks a parent for a single day
//! - `schedule` walks a date range and freezes each decision in the store
//! - `sync` reconciles stored assignments onto the external calendar
//! - `ingest` turns edits made on the external calendar back into overrides

pub mod assignment;
mod cancel;
pub mod config;
pub mod constants;
pub mod date_range;
pub mod error;
pub mod fairness;
pub mod ingest;
pub mod remote;
pub mod schedule;
pub mod store;
pub mod sync;

pub use assignment::{Assignment, AssignmentId, ParentId, Reason};
pub use error::{DutyError, DutyResult};
