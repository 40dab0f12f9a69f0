//! A single conversational worker and its optional attached kernel.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use agent_conversation_store::ChatMessage;
use agent_kernel::Kernel;
use agent_model_registry::ModelSettings;

use crate::error::AgentStartupError;
use crate::kernel_type::KernelType;

/// Caller-supplied description of an agent to create or update.
#[derive(Clone, Debug, Default)]
pub struct AgentConfig {
    /// Unprefixed id, unique within its namespace. Must not contain `:`.
    pub id: String,
    /// Optional namespace grouping this agent for quota and listing.
    pub namespace: Option<String>,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Declared kernel language, if this agent may hold a kernel.
    pub kernel_type: Option<KernelType>,
    /// Named model to resolve via the registry.
    pub model_id: Option<String>,
    /// Inline model settings, used instead of `model_id` when custom models
    /// are allowed.
    pub model_settings: Option<ModelSettings>,
    /// Opaque script run against a freshly attached kernel.
    pub startup_script: Option<String>,
    /// Environment variables to inject into an auto-attached kernel.
    /// Entries mapped to `None` are skipped with a warning.
    pub kernel_environs: Option<HashMap<String, Option<String>>>,
    /// Whether `createAgent` should attempt to attach a kernel immediately.
    pub auto_attach_kernel: bool,
    /// Requested step budget, clamped to the manager's `maxStepsCap`.
    pub max_steps: Option<u32>,
}

/// Partial update applied by `AgentManager::update_agent`.
#[derive(Clone, Debug, Default)]
pub struct AgentConfigUpdate {
    /// Replaces the display name.
    pub name: Option<String>,
    /// Replaces the description.
    pub description: Option<String>,
    /// Re-resolves and replaces the model id.
    pub model_id: Option<String>,
    /// Re-resolves and replaces inline model settings.
    pub model_settings: Option<ModelSettings>,
    /// Replaces the startup script.
    pub startup_script: Option<String>,
    /// Replaces the step budget (clamped to the manager's `maxStepsCap`).
    pub max_steps: Option<u32>,
}

/// A resolved, running agent instance.
///
/// `id` is always the *effective* id (`namespace:id` when namespaced); the
/// agent does not separately track its unprefixed id since the manager never
/// needs it once the map key is established.
#[derive(Clone)]
pub struct Agent {
    id: String,
    namespace: Option<String>,
    name: String,
    description: Option<String>,
    kernel_type: Option<KernelType>,
    kernel: Option<Kernel>,
    model_settings: ModelSettings,
    conversation_history: Vec<ChatMessage>,
    created: DateTime<Utc>,
    last_used: Option<DateTime<Utc>>,
    startup_script: Option<String>,
    kernel_environs: Option<HashMap<String, Option<String>>>,
    startup_error: Option<AgentStartupError>,
    max_steps: u32,
}

impl Agent {
    /// Constructs a new agent. `effective_id` is the already-composed
    /// `namespace:id` (or bare `id`); `model_settings` and `max_steps` are
    /// already resolved/clamped by the caller.
    #[must_use]
    pub fn new(
        effective_id: String,
        namespace: Option<String>,
        config: &AgentConfig,
        model_settings: ModelSettings,
        max_steps: u32,
    ) -> Self {
        Self {
            id: effective_id,
            namespace,
            name: config.name.clone(),
            description: config.description.clone(),
            kernel_type: config.kernel_type,
            kernel: None,
            model_settings,
            conversation_history: Vec::new(),
            created: Utc::now(),
            last_used: None,
            startup_script: config.startup_script.clone(),
            kernel_environs: config.kernel_environs.clone(),
            startup_error: None,
            max_steps,
        }
    }

    /// The effective id: `namespace:id` if namespaced, else `id`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The namespace this agent belongs to, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-text description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared kernel language.
    #[must_use]
    pub fn kernel_type(&self) -> Option<KernelType> {
        self.kernel_type
    }

    /// The attached kernel, if any.
    #[must_use]
    pub fn kernel(&self) -> Option<&Kernel> {
        self.kernel.as_ref()
    }

    /// Currently resolved model settings.
    #[must_use]
    pub fn model_settings(&self) -> &ModelSettings {
        &self.model_settings
    }

    /// The agent's conversation transcript, oldest first.
    #[must_use]
    pub fn conversation_history(&self) -> &[ChatMessage] {
        &self.conversation_history
    }

    /// Creation timestamp.
    #[must_use]
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Timestamp of the most recent use, if any.
    #[must_use]
    pub fn last_used(&self) -> Option<DateTime<Utc>> {
        self.last_used
    }

    /// Opaque startup script, if configured.
    #[must_use]
    pub fn startup_script(&self) -> Option<&str> {
        self.startup_script.as_deref()
    }

    /// Environment variables injected into an auto-attached kernel.
    #[must_use]
    pub fn kernel_environs(&self) -> Option<&HashMap<String, Option<String>>> {
        self.kernel_environs.as_ref()
    }

    /// The step budget, already clamped to the manager's `maxStepsCap`.
    #[must_use]
    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// The startup error recorded by the last failed attach, if any.
    #[must_use]
    pub fn get_startup_error(&self) -> Option<&AgentStartupError> {
        self.startup_error.as_ref()
    }

    /// Records (or clears, with `None`) a startup error from the last
    /// attach attempt.
    pub fn set_startup_error(&mut self, error: Option<AgentStartupError>) {
        self.startup_error = error;
    }

    /// Applies a partial update. Resolved model settings are supplied by
    /// the caller, which has already consulted the model registry.
    pub fn update_config(&mut self, update: AgentConfigUpdate, resolved_model_settings: Option<ModelSettings>) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(settings) = resolved_model_settings {
            self.model_settings = settings;
        }
        if let Some(script) = update.startup_script {
            self.startup_script = Some(script);
        }
        if let Some(max_steps) = update.max_steps {
            self.max_steps = max_steps;
        }
    }

    /// Attaches `kernel`, returning the previously attached kernel (if any)
    /// so the caller can tear it down.
    pub fn attach_kernel(&mut self, kernel: Kernel, kernel_type: KernelType) -> Option<Kernel> {
        self.kernel_type = Some(kernel_type);
        self.kernel.replace(kernel)
    }

    /// Detaches and returns the held kernel, if any.
    pub fn detach_kernel(&mut self) -> Option<Kernel> {
        self.kernel.take()
    }

    /// Replaces the conversation history wholesale. Both this and
    /// [`Agent::clear_conversation_history`] route through this one
    /// mutation path.
    pub fn set_conversation_history(&mut self, messages: Vec<ChatMessage>) {
        self.conversation_history = messages;
        self.last_used = Some(Utc::now());
    }

    /// Empties the conversation history.
    pub fn clear_conversation_history(&mut self) {
        self.set_conversation_history(Vec::new());
    }

    /// Marks the agent as used just now.
    pub fn touch(&mut self) {
        self.last_used = Some(Utc::now());
    }

    /// Tears down the agent's own state. Does not destroy the attached
    /// kernel; the caller (`AgentManager::destroy_agent`) is responsible for
    /// that via the `KernelManager`.
    pub fn destroy(&mut self) {
        self.kernel = None;
        self.conversation_history.clear();
    }
}
