//! examkit-core: Exam session runtime.
//!
//! This crate holds the state machine for a single student's timed exam
//! attempt: the data model, the offline cache, the integrity monitor, the
//! countdown, and the pure assembly of the submission payload.

pub mod cache;
pub mod controller;
pub mod countdown;
pub mod error;
pub mod model;
pub mod parser;
pub mod security;
pub mod submission;
pub mod time;
pub mod traits;
