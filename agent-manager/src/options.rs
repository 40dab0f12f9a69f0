//! Tunables accepted by [`crate::AgentManager::new`].

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use agent_model_registry::ModelSettings;

use crate::kernel_type::KernelType;
use crate::startup::{NoopStartupScriptRunner, StartupScriptRunner};

/// Construction options for [`crate::AgentManager`].
#[derive(Clone)]
pub struct AgentManagerOptions {
    /// Global cap on the number of agents.
    pub max_agents: usize,
    /// Per-namespace cap on the number of agents.
    pub max_agents_per_namespace: usize,
    /// Settings returned by `resolveModelSettings` when nothing else
    /// resolves.
    pub default_model_settings: ModelSettings,
    /// Model id resolved when an agent specifies neither `modelId` nor
    /// inline settings.
    pub default_model_id: Option<String>,
    /// Step budget used when an agent's config omits `maxSteps`.
    pub default_max_steps: u32,
    /// Upper bound every agent's step budget is clamped to.
    pub max_steps_cap: u32,
    /// Directory conversation transcripts are saved under.
    pub agent_data_directory: PathBuf,
    /// Whether the host should save a transcript automatically (consulted
    /// by a host composing this crate; not enforced internally).
    pub auto_save_conversations: bool,
    /// Kernel language assumed when an agent's config omits `kernelType`.
    pub default_kernel_type: Option<KernelType>,
    /// Restricts `resolveModelSettings(modelId, ..)` to this set, if set.
    pub allowed_models: Option<HashSet<String>>,
    /// Whether agents may supply inline `ModelSettings` instead of a
    /// registered model id.
    pub allow_custom_models: bool,
    /// Runs an agent's startup script against a freshly attached kernel.
    pub startup_script_runner: Arc<dyn StartupScriptRunner>,
}

impl AgentManagerOptions {
    /// Returns options with every spec-stated default and a no-op startup
    /// script runner.
    #[must_use]
    pub fn new(default_model_settings: ModelSettings) -> Self {
        Self {
            max_agents: 50,
            max_agents_per_namespace: 10,
            default_model_settings,
            default_model_id: None,
            default_max_steps: 10,
            max_steps_cap: 10,
            agent_data_directory: PathBuf::from("./agent_data"),
            auto_save_conversations: false,
            default_kernel_type: None,
            allowed_models: None,
            allow_custom_models: true,
            startup_script_runner: Arc::new(NoopStartupScriptRunner),
        }
    }
}
