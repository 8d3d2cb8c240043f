//! Logging infrastructure for garage
//!
//! Visit analytics written as JSONL alongside the tracing output.

pub mod visits;

pub use visits::{ProfileType, VisitEvent, VisitLogger};
