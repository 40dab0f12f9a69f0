//! Error taxonomy for conversation persistence.

use thiserror::Error;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while saving a conversation transcript.
///
/// Load paths never surface this type: by design, a load failure degrades
/// to an empty result rather than propagating (§4.7).
#[derive(Debug, Error)]
pub enum Error {
    /// The transcript could not be written to disk.
    #[error("failed to write conversation file: {source}")]
    Io {
        /// Underlying I/O failure.
        #[from]
        source: std::io::Error,
    },

    /// The transcript could not be serialized to JSON.
    #[error("failed to serialize conversation: {source}")]
    Serialize {
        /// Underlying serialization failure.
        #[from]
        source: serde_json::Error,
    },
}
