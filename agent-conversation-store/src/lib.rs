//! Best-effort JSON file persistence for agent conversation transcripts.
//!
//! Saves are strict (I/O and serialization failures propagate); loads are
//! best-effort (any failure yields an empty or absent result), matching the
//! asymmetry a host expects between a write it asked for and a read it is
//! merely hoping succeeds.

#![warn(missing_docs, clippy::pedantic)]

mod data;
mod error;
mod message;
mod sanitize;
mod store;

/// The on-disk transcript format and its optional descriptive metadata.
pub use data::{ConversationData, ConversationMetadata};
/// Error type and result alias for this crate.
pub use error::{Error, Result};
/// Transcript message and role types.
pub use message::{ChatMessage, ChatRole};
/// Filename sanitization and templating helpers.
pub use sanitize::{filename_for, filename_prefix, sanitize_id};
/// The store itself.
pub use store::ConversationStore;
