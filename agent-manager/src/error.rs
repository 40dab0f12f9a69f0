//! Error taxonomy for the agent manager.

use thiserror::Error;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Reported when a startup script fails during kernel attach. Auto-attach
/// failures of this kind roll back agent creation; all other attach
/// failures do not.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("agent startup script failed: {message}")]
pub struct AgentStartupError {
    /// Description of the failure, as reported by the startup-script runner.
    pub message: String,
}

impl AgentStartupError {
    /// Creates a startup error carrying `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Errors raised by [`crate::AgentManager`] operations.
#[derive(Debug, Error)]
pub enum Error {
    /// `id` must not be empty.
    #[error("agent id must not be empty")]
    EmptyId,

    /// `name` must not be empty.
    #[error("agent name must not be empty")]
    EmptyName,

    /// `id` contained the namespace separator.
    #[error("Agent ID cannot contain colons")]
    IdContainsColon,

    /// An agent is already registered under this effective id.
    #[error("an agent with id \"{effective_id}\" already exists")]
    DuplicateAgent {
        /// The id that collided.
        effective_id: String,
    },

    /// The global agent cap has been reached.
    #[error("Maximum number of agents ({max}) reached")]
    MaxAgentsReached {
        /// The configured cap.
        max: usize,
    },

    /// The per-namespace agent cap has been reached.
    #[error("Maximum number of agents per namespace ({max}) reached for namespace \"{namespace}\"")]
    NamespaceQuotaReached {
        /// The namespace that is full.
        namespace: String,
        /// The configured per-namespace cap.
        max: usize,
    },

    /// No agent is registered under the requested id.
    #[error("no agent registered with id \"{id}\"")]
    AgentNotFound {
        /// The missing effective id.
        id: String,
    },

    /// Attaching a kernel requires a kernel type on the agent's
    /// configuration, or a manager-wide default.
    #[error("no kernel type configured for agent \"{id}\" and no default kernel type is set")]
    NoKernelType {
        /// The agent missing a kernel type.
        id: String,
    },

    /// No [`crate::KernelManager`](agent_kernel::KernelManager) has been
    /// wired into this agent manager.
    #[error("no kernel manager is configured")]
    NoKernelManager,

    /// A startup script failed during kernel attach.
    #[error(transparent)]
    Startup(#[from] AgentStartupError),

    /// The model registry rejected a resolution or mutation.
    #[error(transparent)]
    ModelRegistry(#[from] agent_model_registry::Error),

    /// The kernel runtime reported a failure.
    #[error(transparent)]
    Kernel(#[from] agent_kernel::Error),

    /// Conversation persistence reported a failure (save path only; loads
    /// are best-effort and never surface this).
    #[error(transparent)]
    ConversationStore(#[from] agent_conversation_store::Error),
}

impl Error {
    /// Returns `true` if this error originated from a startup script, the
    /// one failure kind that rolls back auto-attach on `createAgent`.
    #[must_use]
    pub const fn is_startup_error(&self) -> bool {
        matches!(self, Self::Startup(_))
    }
}
