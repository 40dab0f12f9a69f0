//! Structured logging initialization and runtime health snapshots.

#![warn(missing_docs, clippy::pedantic)]

pub mod health;
pub mod tracing_support;

pub use health::HealthReport;
pub use tracing_support::init_tracing;
