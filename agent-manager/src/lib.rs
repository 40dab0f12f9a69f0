//! Quota, namespace, and model-resolution control plane over agent
//! instances: the `Agent` lifecycle holder, the `AgentManager` that creates
//! and destroys them, and the collaborators it composes (the model
//! registry, the kernel manager, conversation persistence).

#![warn(missing_docs, clippy::pedantic)]

mod agent;
mod error;
mod events;
mod kernel_type;
mod manager;
mod options;
mod startup;

pub use agent::{Agent, AgentConfig, AgentConfigUpdate};
pub use error::{AgentStartupError, Error, Result};
pub use events::AgentEvent;
pub use kernel_type::KernelType;
pub use manager::{AgentManager, AgentManagerStats, AgentSummary};
pub use options::AgentManagerOptions;
pub use startup::{NoopStartupScriptRunner, StartupScriptRunner};
