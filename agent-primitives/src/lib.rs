//! Core identifier and error types shared across the agent runtime crates.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;

/// Error type and result alias shared across the SDK.
pub use error::{Error, Result};
/// Opaque identifier for a kernel owned by a `KernelManager`.
pub use ids::KernelId;
