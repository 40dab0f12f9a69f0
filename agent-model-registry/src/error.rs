//! Error taxonomy for the model registry.

use thiserror::Error;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while manipulating or resolving entries in the model
/// registry.
#[derive(Debug, Error)]
pub enum Error {
    /// `removeModel` was called for an id referenced by one or more agents.
    #[error("Cannot remove model {id}: it is being used by {count} agent(s)")]
    ModelInUse {
        /// The id that could not be removed.
        id: String,
        /// Number of agents currently using it.
        count: usize,
    },

    /// `resolveModelSettings` was given explicit settings while custom
    /// models are disallowed.
    #[error("Custom model settings are not allowed. Use a model ID from the registry.")]
    CustomModelsDisallowed,

    /// The requested model id is excluded by the configured allow-list.
    #[error("model id \"{id}\" is not in the allowed models list")]
    ModelNotAllowed {
        /// The rejected model id.
        id: String,
    },

    /// The requested model id is not present in the registry.
    #[error("model \"{id}\" is not registered")]
    NotFound {
        /// The missing model id.
        id: String,
    },

    /// A `defaultModelId` was configured but is absent from the registry.
    #[error("default model \"{id}\" is not registered")]
    DefaultModelMissing {
        /// The configured default model id.
        id: String,
    },
}
