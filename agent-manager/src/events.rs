//! Events published on [`crate::AgentManager::events`].

use agent_events::BusEvent;

/// Lifecycle events published by the agent manager.
#[derive(Clone, Debug)]
pub enum AgentEvent {
    /// A new agent was created and stored.
    AgentCreated {
        /// The agent's effective id.
        id: String,
    },
    /// An agent-affecting operation failed without rolling back the agent
    /// itself (e.g. a non-startup attach failure).
    AgentError {
        /// The affected agent's effective id.
        id: String,
        /// Human-readable description of the failure.
        message: String,
    },
}

impl BusEvent for AgentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::AgentCreated { .. } => "AGENT_CREATED",
            Self::AgentError { .. } => "AGENT_ERROR",
        }
    }
}
