//! Multi-tenant agent execution runtime facade.
//!
//! Depend on this crate via `cargo add agent-runtime`. It bundles the
//! internal runtime crates behind feature flags so downstream users can
//! enable or disable components as needed.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use agent_primitives as primitives;

/// Generic publish/subscribe event bus (enabled by `events`).
#[cfg(feature = "events")]
pub use agent_events as events;

/// Kernel runtime and kernel manager (enabled by `kernel`).
#[cfg(feature = "kernel")]
pub use agent_kernel as kernel;

/// Model registry and resolution (enabled by `model-registry`).
#[cfg(feature = "model-registry")]
pub use agent_model_registry as model_registry;

/// Conversation transcript persistence (enabled by `conversation-store`).
#[cfg(feature = "conversation-store")]
pub use agent_conversation_store as conversation_store;

/// Agent lifecycle control plane (enabled by `manager`).
#[cfg(feature = "manager")]
pub use agent_manager as manager;

/// LLM chat-completion adapters (enabled by `adapters`).
#[cfg(feature = "adapters")]
pub use agent_adapters as adapters;

/// Layered configuration loading (enabled by `config`).
#[cfg(feature = "config")]
pub use agent_config as config;

/// Structured logging and health snapshots (enabled by `telemetry`).
#[cfg(feature = "telemetry")]
pub use agent_telemetry as telemetry;
