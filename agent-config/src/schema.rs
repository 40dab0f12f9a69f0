//! TOML-deserializable mirror of [`agent_manager::AgentManagerOptions`].
//!
//! Every field is optional so a config file only needs to state the
//! tunables it wants to override; everything else falls back to
//! [`agent_manager::AgentManagerOptions::new`]'s defaults.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::Deserialize;

use agent_manager::KernelType;
use agent_model_registry::ModelSettings;

/// Parsed shape of `agent_manager.toml`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentManagerConfigFile {
    /// See [`agent_manager::AgentManagerOptions::max_agents`].
    pub max_agents: Option<usize>,
    /// See [`agent_manager::AgentManagerOptions::max_agents_per_namespace`].
    pub max_agents_per_namespace: Option<usize>,
    /// See [`agent_manager::AgentManagerOptions::default_max_steps`].
    pub default_max_steps: Option<u32>,
    /// See [`agent_manager::AgentManagerOptions::max_steps_cap`].
    pub max_steps_cap: Option<u32>,
    /// See [`agent_manager::AgentManagerOptions::agent_data_directory`].
    pub agent_data_directory: Option<PathBuf>,
    /// See [`agent_manager::AgentManagerOptions::auto_save_conversations`].
    pub auto_save_conversations: Option<bool>,
    /// See [`agent_manager::AgentManagerOptions::default_kernel_type`].
    pub default_kernel_type: Option<KernelType>,
    /// See [`agent_manager::AgentManagerOptions::allow_custom_models`].
    pub allow_custom_models: Option<bool>,
    /// See [`agent_manager::AgentManagerOptions::allowed_models`].
    pub allowed_models: Option<HashSet<String>>,
    /// See [`agent_manager::AgentManagerOptions::default_model_id`].
    pub default_model_id: Option<String>,
    /// See [`agent_manager::AgentManagerOptions::default_model_settings`].
    pub default_model_settings: Option<ModelSettings>,
}
