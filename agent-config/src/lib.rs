//! Layered configuration loading for [`agent_manager::AgentManagerOptions`].
//!
//! A TOML file (default path `./agent_manager.toml`) supplies the base
//! configuration; `AGENT_MANAGER_*`-prefixed environment variables override
//! individual fields on top of it. The merged result is validated before
//! being handed back, so a misconfigured host fails at startup with a
//! descriptive error rather than at some later, confusing point at runtime.

#![warn(missing_docs, clippy::pedantic)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::ConfigError;
pub use loader::{default_config_path, load};
pub use schema::AgentManagerConfigFile;
