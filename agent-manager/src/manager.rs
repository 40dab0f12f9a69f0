//! Quota, namespace, and model-resolution control plane over [`Agent`]
//! instances.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use agent_conversation_store::{ChatMessage, ConversationData, ConversationMetadata, ConversationStore};
use agent_events::EventBus;
use agent_kernel::{require_kernel, KernelManager, KernelOptions};
use agent_model_registry::{ModelRegistry, ModelSettings, ModelStats, ModelUsageKey, ModelUsageProvider, ResolveConfig};

use crate::agent::{Agent, AgentConfig, AgentConfigUpdate};
use crate::error::{Error, Result};
use crate::events::AgentEvent;
use crate::kernel_type::KernelType;
use crate::options::AgentManagerOptions;

const AGENT_EVENT_LISTENER_CAP: usize = 100;

/// A listing entry for `listAgents`: the agent's unprefixed id and
/// namespace, split back out from the effective id.
#[derive(Clone, Debug)]
pub struct AgentSummary {
    /// Unprefixed id (the effective id with the `namespace:` prefix
    /// stripped, if any).
    pub id: String,
    /// The namespace this agent belongs to, if any.
    pub namespace: Option<String>,
    /// Display name.
    pub name: String,
}

/// Aggregate counts returned by `getStats`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AgentManagerStats {
    /// Total number of agents across all namespaces.
    pub total_agents: usize,
    /// Number of distinct namespaces in use.
    pub namespaces: usize,
    /// Number of agents with a kernel currently attached.
    pub agents_with_kernel: usize,
    /// Number of agents carrying a recorded startup error.
    pub agents_with_startup_error: usize,
}

/// Quota, namespace, and model-resolution control plane over [`Agent`]
/// instances.
///
/// Cloning an `AgentManager` shares the same backing store (it is a thin
/// `Arc` handle).
#[derive(Clone)]
pub struct AgentManager {
    agents: Arc<RwLock<HashMap<String, Agent>>>,
    model_registry: ModelRegistry,
    conversation_store: ConversationStore,
    kernel_manager: Option<Arc<dyn KernelManager>>,
    options: AgentManagerOptions,
    events: EventBus<AgentEvent>,
}

impl AgentManager {
    /// Creates a manager over `options`, using `model_registry` if given or
    /// building one from `options`' resolve-relevant fields otherwise. Wires
    /// itself into the registry as its [`ModelUsageProvider`].
    #[must_use]
    pub fn new(
        options: AgentManagerOptions,
        model_registry: Option<ModelRegistry>,
        kernel_manager: Option<Arc<dyn KernelManager>>,
    ) -> Self {
        let model_registry = model_registry.unwrap_or_else(|| {
            ModelRegistry::new(ResolveConfig {
                allow_custom_models: options.allow_custom_models,
                allowed_models: options.allowed_models.clone(),
                default_model_id: options.default_model_id.clone(),
                default_model_settings: options.default_model_settings.clone(),
            })
        });

        let manager = Self {
            agents: Arc::new(RwLock::new(HashMap::new())),
            model_registry,
            conversation_store: ConversationStore::new(options.agent_data_directory.clone()),
            kernel_manager,
            options,
            events: EventBus::new(AGENT_EVENT_LISTENER_CAP),
        };

        manager.model_registry.set_usage_provider(Arc::new(manager.clone()));
        manager
    }

    /// Returns the event bus subscribers can register against.
    #[must_use]
    pub fn events(&self) -> &EventBus<AgentEvent> {
        &self.events
    }

    /// Returns the model registry this manager resolves settings against.
    #[must_use]
    pub fn model_registry(&self) -> &ModelRegistry {
        &self.model_registry
    }

    fn effective_id(config: &AgentConfig) -> Result<String> {
        if config.id.is_empty() {
            return Err(Error::EmptyId);
        }
        if config.name.is_empty() {
            return Err(Error::EmptyName);
        }
        if config.id.contains(':') {
            return Err(Error::IdContainsColon);
        }
        Ok(match &config.namespace {
            Some(namespace) => format!("{namespace}:{}", config.id),
            None => config.id.clone(),
        })
    }

    fn namespace_count(agents: &HashMap<String, Agent>, namespace: &str) -> usize {
        let prefix = format!("{namespace}:");
        agents.keys().filter(|key| key.starts_with(&prefix)).count()
    }

    /// Validates, resolves, stores, and (optionally) auto-attaches a kernel
    /// for a new agent. Returns the effective id it was stored under.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyId`], [`Error::EmptyName`],
    /// [`Error::IdContainsColon`], [`Error::DuplicateAgent`],
    /// [`Error::MaxAgentsReached`], [`Error::NamespaceQuotaReached`], a
    /// wrapped [`agent_model_registry::Error`], or (only when auto-attach
    /// fails with a startup error) a wrapped [`crate::error::AgentStartupError`].
    pub async fn create_agent(&self, config: AgentConfig) -> Result<String> {
        let effective_id = Self::effective_id(&config)?;

        let max_steps = config
            .max_steps
            .unwrap_or(self.options.default_max_steps)
            .min(self.options.max_steps_cap);

        let model_settings = self
            .model_registry
            .resolve_model_settings(config.model_id.as_deref(), config.model_settings.clone())?;

        {
            let agents = self.agents.read().expect("agent manager lock poisoned");
            if agents.contains_key(&effective_id) {
                return Err(Error::DuplicateAgent { effective_id });
            }
            if agents.len() >= self.options.max_agents {
                return Err(Error::MaxAgentsReached {
                    max: self.options.max_agents,
                });
            }
            if let Some(namespace) = &config.namespace {
                let count = Self::namespace_count(&agents, namespace);
                if count >= self.options.max_agents_per_namespace {
                    return Err(Error::NamespaceQuotaReached {
                        namespace: namespace.clone(),
                        max: self.options.max_agents_per_namespace,
                    });
                }
            }
        }

        let agent = Agent::new(effective_id.clone(), config.namespace.clone(), &config, model_settings, max_steps);

        self.agents
            .write()
            .expect("agent manager lock poisoned")
            .insert(effective_id.clone(), agent);
        self.events.publish(AgentEvent::AgentCreated { id: effective_id.clone() });

        if config.auto_attach_kernel {
            let kernel_type = config.kernel_type.or(self.options.default_kernel_type);
            if let (Some(kernel_type), Some(_)) = (kernel_type, &self.kernel_manager) {
                if let Err(err) = self.attach_kernel_to_agent(&effective_id, kernel_type).await {
                    if err.is_startup_error() {
                        self.agents
                            .write()
                            .expect("agent manager lock poisoned")
                            .remove(&effective_id);
                        return Err(err);
                    }
                    self.events.publish(AgentEvent::AgentError {
                        id: effective_id.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        Ok(effective_id)
    }

    /// Returns a clone of the agent stored under `id`, if any.
    pub async fn get_agent(&self, id: &str) -> Option<Agent> {
        self.agents.read().expect("agent manager lock poisoned").get(id).cloned()
    }

    /// Returns whether an agent is registered under `id`.
    pub async fn agent_exists(&self, id: &str) -> bool {
        self.agents.read().expect("agent manager lock poisoned").contains_key(id)
    }

    /// Returns every stored effective id.
    pub async fn get_agent_ids(&self) -> Vec<String> {
        self.agents.read().expect("agent manager lock poisoned").keys().cloned().collect()
    }

    /// Lists agents, optionally filtered to one namespace. Ids are returned
    /// unprefixed, with the namespace split out as its own field.
    pub async fn list_agents(&self, namespace: Option<&str>) -> Vec<AgentSummary> {
        self.agents
            .read()
            .expect("agent manager lock poisoned")
            .values()
            .filter(|agent| namespace.is_none_or(|ns| agent.namespace() == Some(ns)))
            .map(|agent| AgentSummary {
                id: agent
                    .namespace()
                    .and_then(|ns| agent.id().strip_prefix(&format!("{ns}:")))
                    .unwrap_or_else(|| agent.id())
                    .to_owned(),
                namespace: agent.namespace().map(ToOwned::to_owned),
                name: agent.name().to_owned(),
            })
            .collect()
    }

    /// Applies a partial update to the agent stored under `id`,
    /// re-resolving model settings first if the update touches them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotFound`] if `id` is unregistered, or a
    /// wrapped [`agent_model_registry::Error`] if re-resolution fails.
    pub async fn update_agent(&self, id: &str, mut update: AgentConfigUpdate) -> Result<()> {
        let resolved_model_settings = if update.model_id.is_some() || update.model_settings.is_some() {
            Some(
                self.model_registry
                    .resolve_model_settings(update.model_id.as_deref(), update.model_settings.clone())?,
            )
        } else {
            None
        };

        if let Some(max_steps) = update.max_steps {
            update.max_steps = Some(max_steps.min(self.options.max_steps_cap));
        }

        let mut agents = self.agents.write().expect("agent manager lock poisoned");
        let agent = agents.get_mut(id).ok_or_else(|| Error::AgentNotFound { id: id.to_owned() })?;
        agent.update_config(update, resolved_model_settings);
        Ok(())
    }

    /// Destroys the agent stored under `id`, tearing down its kernel (if
    /// any) via the kernel manager first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotFound`] if `id` is unregistered.
    pub async fn destroy_agent(&self, id: &str) -> Result<()> {
        let mut agent = {
            let mut agents = self.agents.write().expect("agent manager lock poisoned");
            agents.remove(id).ok_or_else(|| Error::AgentNotFound { id: id.to_owned() })?
        };

        if let Some(kernel) = agent.detach_kernel() {
            if let Some(kernel_manager) = &self.kernel_manager {
                kernel_manager.destroy_kernel(kernel.id()).await?;
            }
        }
        agent.destroy();
        Ok(())
    }

    /// Destroys every agent, optionally scoped to one namespace. Failures
    /// are collected and returned; as many agents as possible are still
    /// destroyed.
    pub async fn destroy_all(&self, namespace: Option<&str>) -> Vec<(String, Error)> {
        let ids: Vec<String> = self
            .agents
            .read()
            .expect("agent manager lock poisoned")
            .iter()
            .filter(|(_, agent)| namespace.is_none_or(|ns| agent.namespace() == Some(ns)))
            .map(|(id, _)| id.clone())
            .collect();

        let results = futures::future::join_all(ids.into_iter().map(|id| async move {
            let result = self.destroy_agent(&id).await;
            (id, result)
        }))
        .await;

        results
            .into_iter()
            .filter_map(|(id, result)| result.err().map(|err| (id, err)))
            .collect()
    }

    /// Attaches a kernel of `kernel_type` to the agent stored under `id`. If
    /// the agent already holds a kernel, it is detached (and destroyed)
    /// first, so repeated calls are idempotent from the caller's
    /// perspective. Runs the agent's startup script (if any) against the
    /// new kernel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotFound`], [`Error::NoKernelManager`], a
    /// wrapped [`agent_kernel::Error`], or (if the startup script fails) a
    /// wrapped [`crate::error::AgentStartupError`].
    pub async fn attach_kernel_to_agent(&self, id: &str, kernel_type: KernelType) -> Result<()> {
        let kernel_manager = self.kernel_manager.as_ref().ok_or(Error::NoKernelManager)?;

        let (env, startup_script) = {
            let agents = self.agents.read().expect("agent manager lock poisoned");
            let agent = agents.get(id).ok_or_else(|| Error::AgentNotFound { id: id.to_owned() })?;
            (
                agent.kernel_environs().cloned().unwrap_or_default(),
                agent.startup_script().map(ToOwned::to_owned),
            )
        };

        self.detach_kernel_from_agent(id).await?;

        let kernel_id = kernel_manager
            .create_kernel(KernelOptions {
                lang: kernel_type.lang(),
                filesystem: None,
                env,
            })
            .await?;
        let kernel = require_kernel(kernel_manager.as_ref(), kernel_id).await?;

        if let Some(script) = &startup_script {
            if let Err(err) = self.options.startup_script_runner.run(&kernel, script).await {
                kernel_manager.destroy_kernel(kernel_id).await?;
                let mut agents = self.agents.write().expect("agent manager lock poisoned");
                if let Some(agent) = agents.get_mut(id) {
                    agent.set_startup_error(Some(err.clone()));
                }
                return Err(Error::Startup(err));
            }
        }

        let mut agents = self.agents.write().expect("agent manager lock poisoned");
        let agent = agents.get_mut(id).ok_or_else(|| Error::AgentNotFound { id: id.to_owned() })?;
        agent.set_startup_error(None);
        agent.attach_kernel(kernel, kernel_type);
        Ok(())
    }

    /// Detaches and destroys the kernel held by the agent stored under
    /// `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotFound`] if `id` is unregistered, or a
    /// wrapped [`agent_kernel::Error`] if kernel teardown fails.
    pub async fn detach_kernel_from_agent(&self, id: &str) -> Result<()> {
        let kernel = {
            let mut agents = self.agents.write().expect("agent manager lock poisoned");
            let agent = agents.get_mut(id).ok_or_else(|| Error::AgentNotFound { id: id.to_owned() })?;
            agent.detach_kernel()
        };

        if let Some(kernel) = kernel {
            if let Some(kernel_manager) = &self.kernel_manager {
                kernel_manager.destroy_kernel(kernel.id()).await?;
            }
        }
        Ok(())
    }

    /// Saves the agent's conversation history as a JSON transcript.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotFound`] if `id` is unregistered, or a
    /// wrapped [`agent_conversation_store::Error`] if the write fails.
    pub async fn save_conversation(&self, id: &str, filename: Option<&str>) -> Result<std::path::PathBuf> {
        let agent = self
            .agents
            .read()
            .expect("agent manager lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| Error::AgentNotFound { id: id.to_owned() })?;

        let data = ConversationData::new(agent.id().to_owned(), agent.conversation_history().to_vec()).with_metadata(
            ConversationMetadata {
                agent_name: Some(agent.name().to_owned()),
                agent_description: agent.description().map(ToOwned::to_owned),
            },
        );

        Ok(self.conversation_store.save(&data, filename).await?)
    }

    /// Loads a previously saved transcript into the agent's conversation
    /// history. With no `filename`, loads the most recent transcript for
    /// this agent. Best-effort: a missing file or directory leaves the
    /// agent's history untouched and returns `false`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotFound`] if `id` is unregistered.
    pub async fn load_conversation(&self, id: &str, filename: Option<&str>) -> Result<bool> {
        if !self.agent_exists(id).await {
            return Err(Error::AgentNotFound { id: id.to_owned() });
        }

        let loaded = match filename {
            Some(filename) => self.conversation_store.load_file(filename).await,
            None => self.conversation_store.load_latest(id).await,
        };

        let Some(data) = loaded else {
            return Ok(false);
        };

        let mut agents = self.agents.write().expect("agent manager lock poisoned");
        if let Some(agent) = agents.get_mut(id) {
            agent.set_conversation_history(data.messages);
        }
        Ok(true)
    }

    /// Empties the agent's conversation history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotFound`] if `id` is unregistered.
    pub async fn clear_conversation(&self, id: &str) -> Result<()> {
        let mut agents = self.agents.write().expect("agent manager lock poisoned");
        let agent = agents.get_mut(id).ok_or_else(|| Error::AgentNotFound { id: id.to_owned() })?;
        agent.clear_conversation_history();
        Ok(())
    }

    /// Replaces the agent's conversation history wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotFound`] if `id` is unregistered.
    pub async fn set_conversation_history(&self, id: &str, messages: Vec<ChatMessage>) -> Result<()> {
        let mut agents = self.agents.write().expect("agent manager lock poisoned");
        let agent = agents.get_mut(id).ok_or_else(|| Error::AgentNotFound { id: id.to_owned() })?;
        agent.set_conversation_history(messages);
        Ok(())
    }

    /// Removes all but the `keep_count` most recently used agents in
    /// `namespace` (sorted by `lastUsed ?? created` ascending), destroying
    /// each. Per-agent failures are reported but do not stop the sweep.
    /// Returns the number of agents removed.
    pub async fn cleanup_old_agents_in_namespace(&self, namespace: &str, keep_count: usize) -> usize {
        let mut candidates: Vec<(String, chrono::DateTime<chrono::Utc>)> = self
            .agents
            .read()
            .expect("agent manager lock poisoned")
            .values()
            .filter(|agent| agent.namespace() == Some(namespace))
            .map(|agent| (agent.id().to_owned(), agent.last_used().unwrap_or_else(|| agent.created())))
            .collect();

        candidates.sort_by_key(|(_, timestamp)| *timestamp);

        let to_remove = candidates.len().saturating_sub(keep_count);
        let mut removed = 0;
        for (id, _) in candidates.into_iter().take(to_remove) {
            if self.destroy_agent(&id).await.is_ok() {
                removed += 1;
            } else {
                tracing::warn!(id, namespace, "failed to destroy agent during namespace cleanup");
            }
        }
        removed
    }

    /// Aggregate agent counts for a host's liveness/readiness surface.
    pub async fn get_stats(&self) -> AgentManagerStats {
        let agents = self.agents.read().expect("agent manager lock poisoned");
        let mut namespaces = std::collections::HashSet::new();
        let mut agents_with_kernel = 0;
        let mut agents_with_startup_error = 0;

        for agent in agents.values() {
            if let Some(namespace) = agent.namespace() {
                namespaces.insert(namespace.to_owned());
            }
            if agent.kernel().is_some() {
                agents_with_kernel += 1;
            }
            if agent.get_startup_error().is_some() {
                agents_with_startup_error += 1;
            }
        }

        AgentManagerStats {
            total_agents: agents.len(),
            namespaces: namespaces.len(),
            agents_with_kernel,
            agents_with_startup_error,
        }
    }

    /// Per-model usage statistics, delegated to the model registry.
    #[must_use]
    pub fn get_model_stats(&self) -> Vec<ModelStats> {
        self.model_registry.get_model_stats()
    }
}

impl ModelUsageProvider for AgentManager {
    fn agents_using(&self, key: &ModelUsageKey) -> usize {
        self.agents
            .read()
            .expect("agent manager lock poisoned")
            .values()
            .filter(|agent| agent.model_settings().usage_key() == *key)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use agent_kernel::InMemoryKernelManager;

    use super::*;

    fn default_settings() -> ModelSettings {
        ModelSettings::new("fallback", "https://fallback.example", "sk-test", 0.2)
    }

    fn manager() -> AgentManager {
        AgentManager::new(AgentManagerOptions::new(default_settings()), None, None)
    }

    fn config(id: &str, name: &str) -> AgentConfig {
        AgentConfig {
            id: id.to_owned(),
            name: name.to_owned(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn namespace_quota_rejects_the_third_agent() {
        let manager = AgentManager::new(
            AgentManagerOptions {
                max_agents_per_namespace: 2,
                ..AgentManagerOptions::new(default_settings())
            },
            None,
            None,
        );

        let mut a = config("a", "A");
        a.namespace = Some("ns1".to_owned());
        let mut b = config("b", "B");
        b.namespace = Some("ns1".to_owned());
        let mut c = config("c", "C");
        c.namespace = Some("ns1".to_owned());

        assert_eq!(manager.create_agent(a).await.unwrap(), "ns1:a");
        assert_eq!(manager.create_agent(b).await.unwrap(), "ns1:b");

        let err = manager.create_agent(c).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Maximum number of agents per namespace (2) reached for namespace \"ns1\""
        );
    }

    #[tokio::test]
    async fn colon_in_id_is_rejected() {
        let manager = manager();
        let err = manager.create_agent(config("x:y", "X")).await.unwrap_err();
        assert_eq!(err.to_string(), "Agent ID cannot contain colons");
    }

    #[tokio::test]
    async fn custom_model_settings_rejected_when_disallowed() {
        let manager = AgentManager::new(
            AgentManagerOptions {
                allow_custom_models: false,
                ..AgentManagerOptions::new(default_settings())
            },
            None,
            None,
        );

        let mut cfg = config("a", "A");
        cfg.model_settings = Some(ModelSettings::new("m", "u", "k", 0.0));

        let err = manager.create_agent(cfg).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Custom model settings are not allowed. Use a model ID from the registry."
        );
    }

    #[tokio::test]
    async fn removing_a_model_in_use_by_one_agent_fails() {
        let manager = manager();
        manager
            .model_registry()
            .add_model("m1", ModelSettings::new("gpt-4o", "https://api.openai.com", "sk", 0.2));

        let mut cfg = config("a", "A");
        cfg.model_id = Some("m1".to_owned());
        manager.create_agent(cfg).await.unwrap();

        let err = manager.model_registry().remove_model("m1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot remove model m1: it is being used by 1 agent(s)"
        );
    }

    #[tokio::test]
    async fn duplicate_effective_id_is_rejected() {
        let manager = manager();
        manager.create_agent(config("a", "A")).await.unwrap();
        let err = manager.create_agent(config("a", "A again")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateAgent { .. }));
    }

    #[tokio::test]
    async fn max_steps_is_clamped_to_the_cap() {
        let manager = manager();
        let mut cfg = config("a", "A");
        cfg.max_steps = Some(999);
        let id = manager.create_agent(cfg).await.unwrap();
        let agent = manager.get_agent(&id).await.unwrap();
        assert_eq!(agent.max_steps(), 10);
    }

    #[tokio::test]
    async fn update_agent_also_clamps_max_steps_to_the_cap() {
        let manager = manager();
        let id = manager.create_agent(config("a", "A")).await.unwrap();
        manager
            .update_agent(
                &id,
                AgentConfigUpdate {
                    max_steps: Some(9999),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let agent = manager.get_agent(&id).await.unwrap();
        assert_eq!(agent.max_steps(), 10);
    }

    #[tokio::test]
    async fn destroy_agent_removes_it_from_the_map() {
        let manager = manager();
        let id = manager.create_agent(config("a", "A")).await.unwrap();
        manager.destroy_agent(&id).await.unwrap();
        assert!(!manager.agent_exists(&id).await);
    }

    #[tokio::test]
    async fn attach_kernel_round_trips_through_the_kernel_manager() {
        let kernel_manager: Arc<dyn KernelManager> = Arc::new(InMemoryKernelManager::new());
        let manager = AgentManager::new(AgentManagerOptions::new(default_settings()), None, Some(kernel_manager));

        let id = manager.create_agent(config("a", "A")).await.unwrap();
        manager.attach_kernel_to_agent(&id, KernelType::Python).await.unwrap();
        assert!(manager.get_agent(&id).await.unwrap().kernel().is_some());

        manager.detach_kernel_from_agent(&id).await.unwrap();
        assert!(manager.get_agent(&id).await.unwrap().kernel().is_none());
    }

    #[tokio::test]
    async fn cleanup_keeps_only_the_newest_agents_in_namespace() {
        let manager = manager();
        for letter in ["a", "b", "c"] {
            let mut cfg = config(letter, letter);
            cfg.namespace = Some("ns".to_owned());
            manager.create_agent(cfg).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let removed = manager.cleanup_old_agents_in_namespace("ns", 1).await;
        assert_eq!(removed, 2);
        assert_eq!(manager.list_agents(Some("ns")).await.len(), 1);
    }
}
