//! Errors raised while loading or validating a configuration file.

use thiserror::Error;

/// Errors raised by [`crate::loader::load`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML, or does not match the
    /// expected schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying parse error.
        #[source]
        source: Box<toml::de::Error>,
    },

    /// An `AGENT_MANAGER_*` environment variable was set but could not be
    /// parsed as the type it overrides.
    #[error("environment variable {name} has an invalid value {value:?}: {reason}")]
    InvalidEnvVar {
        /// The offending variable's full name.
        name: String,
        /// The value it was set to.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The fully merged configuration failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
