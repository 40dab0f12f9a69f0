//! The model registry itself.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::Utc;

use agent_events::EventBus;

use crate::entry::ModelRegistryEntry;
use crate::error::{Error, Result};
use crate::events::ModelEvent;
use crate::settings::ModelSettings;
use crate::usage::{ModelUsageProvider, NoUsage};

/// Default per-bus listener cap used by the registry's event bus.
const DEFAULT_MAX_LISTENERS: usize = 100;

/// Aggregated usage figures for a single registry entry, as reported by
/// `getModelStats`.
#[derive(Clone, Debug)]
pub struct ModelStats {
    /// The entry's id.
    pub id: String,
    /// The entry's current settings.
    pub model_settings: ModelSettings,
    /// Number of agents currently resolving to this entry's `(model,
    /// baseURL)` pair.
    pub agents_using: usize,
    /// Most recent `resolveModelSettings` hit, if any.
    pub last_used: Option<chrono::DateTime<Utc>>,
    /// Creation timestamp.
    pub created: chrono::DateTime<Utc>,
}

/// Configuration consulted by `resolveModelSettings`. Owned by the registry
/// and set by whoever constructs it (typically `agent-manager`, composing
/// `AgentManagerOptions`).
#[derive(Clone, Debug)]
pub struct ResolveConfig {
    /// Whether callers may pass inline, unregistered `ModelSettings`.
    pub allow_custom_models: bool,
    /// If set, only these model ids may be resolved by id.
    pub allowed_models: Option<HashSet<String>>,
    /// Model id used when neither `modelId` nor `settings` is given.
    pub default_model_id: Option<String>,
    /// Settings used when no id or default id resolves to anything.
    pub default_model_settings: ModelSettings,
}

struct State {
    entries: HashMap<String, ModelRegistryEntry>,
    resolve_config: ResolveConfig,
    usage_provider: Arc<dyn ModelUsageProvider>,
}

/// Named catalog of [`ModelSettings`], with usage accounting and an event
/// bus that reports `MODEL_ADDED`/`MODEL_REMOVED`/`MODEL_UPDATED`.
///
/// Cloning a `ModelRegistry` shares the same backing store (it is a thin
/// `Arc` handle).
#[derive(Clone)]
pub struct ModelRegistry {
    state: Arc<RwLock<State>>,
    events: EventBus<ModelEvent>,
}

impl ModelRegistry {
    /// Creates an empty registry using `resolve_config` for
    /// `resolveModelSettings` and a no-op usage provider.
    #[must_use]
    pub fn new(resolve_config: ResolveConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(State {
                entries: HashMap::new(),
                resolve_config,
                usage_provider: Arc::new(NoUsage),
            })),
            events: EventBus::new(DEFAULT_MAX_LISTENERS),
        }
    }

    /// Returns the event bus subscribers can register against.
    #[must_use]
    pub fn events(&self) -> &EventBus<ModelEvent> {
        &self.events
    }

    /// Wires in the collaborator used to count agents referencing a model.
    /// See [`crate::usage::ModelUsageProvider`].
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_usage_provider(&self, provider: Arc<dyn ModelUsageProvider>) {
        self.state.write().expect("registry lock poisoned").usage_provider = provider;
    }

    /// Inserts `settings` under `id`. Returns `false` without mutating
    /// anything if `id` is already registered.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn add_model(&self, id: impl Into<String>, settings: ModelSettings) -> bool {
        let id = id.into();
        let mut state = self.state.write().expect("registry lock poisoned");
        if state.entries.contains_key(&id) {
            return false;
        }
        let created = Utc::now();
        state
            .entries
            .insert(id.clone(), ModelRegistryEntry::new(id.clone(), settings.clone(), created));
        drop(state);
        self.events.publish(ModelEvent::Added { id, settings });
        true
    }

    /// Removes `id` from the registry.
    ///
    /// Returns `Ok(false)` if `id` is absent. Returns
    /// [`Error::ModelInUse`] without mutating anything if any agent
    /// currently resolves to this entry's `(model, baseURL)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelInUse`] if an agent still references the model.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn remove_model(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().expect("registry lock poisoned");
        let Some(entry) = state.entries.get(id) else {
            return Ok(false);
        };

        let count = state.usage_provider.agents_using(&entry.model_settings().usage_key());
        if count > 0 {
            return Err(Error::ModelInUse {
                id: id.to_owned(),
                count,
            });
        }

        state.entries.remove(id);
        drop(state);
        self.events.publish(ModelEvent::Removed { id: id.to_owned() });
        Ok(true)
    }

    /// Replaces the settings stored under `id`. Does not alter the resolved
    /// settings already held by existing agents. Returns `false` if `id` is
    /// absent.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn update_model(&self, id: &str, settings: ModelSettings) -> bool {
        let mut state = self.state.write().expect("registry lock poisoned");
        let Some(entry) = state.entries.get_mut(id) else {
            return false;
        };
        let old_settings = entry.model_settings().clone();
        entry.set_model_settings(settings.clone());
        drop(state);
        self.events.publish(ModelEvent::Updated {
            id: id.to_owned(),
            old_settings,
            new_settings: settings,
        });
        true
    }

    /// Returns a clone of the entry stored under `id`, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn get_model(&self, id: &str) -> Option<ModelRegistryEntry> {
        self.state
            .read()
            .expect("registry lock poisoned")
            .entries
            .get(id)
            .cloned()
    }

    /// Returns whether `id` is registered.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn has_model(&self, id: &str) -> bool {
        self.state.read().expect("registry lock poisoned").entries.contains_key(id)
    }

    /// Returns every registered entry.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn list_models(&self) -> Vec<ModelRegistryEntry> {
        self.state
            .read()
            .expect("registry lock poisoned")
            .entries
            .values()
            .cloned()
            .collect()
    }

    /// Resolves a concrete, owned [`ModelSettings`] from an optional model
    /// id and/or optional inline settings, following the fallback chain
    /// described on the type.
    ///
    /// 1. If `settings` is given, it is returned as-is unless custom models
    ///    are disallowed.
    /// 2. Else if `model_id` is given, it is looked up (subject to the
    ///    allow-list) and its `lastUsed` timestamp is stamped.
    /// 3. Else if a default model id is configured, it is resolved the same
    ///    way as (2).
    /// 4. Else the ambient default settings are returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CustomModelsDisallowed`], [`Error::ModelNotAllowed`],
    /// [`Error::NotFound`], or [`Error::DefaultModelMissing`] per the rule
    /// that rejected the request.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn resolve_model_settings(
        &self,
        model_id: Option<&str>,
        settings: Option<ModelSettings>,
    ) -> Result<ModelSettings> {
        if let Some(settings) = settings {
            let state = self.state.read().expect("registry lock poisoned");
            if !state.resolve_config.allow_custom_models {
                return Err(Error::CustomModelsDisallowed);
            }
            return Ok(settings);
        }

        if let Some(model_id) = model_id {
            return self.resolve_by_id(model_id);
        }

        let default_id = self
            .state
            .read()
            .expect("registry lock poisoned")
            .resolve_config
            .default_model_id
            .clone();

        if let Some(default_id) = default_id {
            return self.resolve_by_id(&default_id).map_err(|err| match err {
                Error::NotFound { id } => Error::DefaultModelMissing { id },
                other => other,
            });
        }

        Ok(self
            .state
            .read()
            .expect("registry lock poisoned")
            .resolve_config
            .default_model_settings
            .clone())
    }

    fn resolve_by_id(&self, model_id: &str) -> Result<ModelSettings> {
        let mut state = self.state.write().expect("registry lock poisoned");

        if let Some(allowed) = &state.resolve_config.allowed_models {
            if !allowed.contains(model_id) {
                return Err(Error::ModelNotAllowed {
                    id: model_id.to_owned(),
                });
            }
        }

        let Some(entry) = state.entries.get_mut(model_id) else {
            return Err(Error::NotFound {
                id: model_id.to_owned(),
            });
        };

        entry.stamp_last_used(Utc::now());
        Ok(entry.model_settings().clone())
    }

    /// Returns per-entry usage statistics, sorted by `(agentsUsing desc,
    /// lastUsed desc, created desc)`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn get_model_stats(&self) -> Vec<ModelStats> {
        let state = self.state.read().expect("registry lock poisoned");
        let mut stats: Vec<ModelStats> = state
            .entries
            .values()
            .map(|entry| ModelStats {
                id: entry.id().to_owned(),
                model_settings: entry.model_settings().clone(),
                agents_using: state.usage_provider.agents_using(&entry.model_settings().usage_key()),
                last_used: entry.last_used(),
                created: entry.created(),
            })
            .collect();

        stats.sort_by(|a, b| {
            b.agents_using
                .cmp(&a.agents_using)
                .then_with(|| b.last_used.cmp(&a.last_used))
                .then_with(|| b.created.cmp(&a.created))
        });
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(model: &str, base_url: &str) -> ModelSettings {
        ModelSettings::new(model, base_url, "sk-test", 0.2)
    }

    fn registry_with_defaults() -> ModelRegistry {
        ModelRegistry::new(ResolveConfig {
            allow_custom_models: true,
            allowed_models: None,
            default_model_id: None,
            default_model_settings: settings("fallback", "https://fallback.example"),
        })
    }

    #[test]
    fn add_model_rejects_duplicate_id_without_event() {
        let registry = registry_with_defaults();
        let seen = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen_clone = std::sync::Arc::clone(&seen);
        registry.events().on("MODEL_ADDED", move |_| {
            seen_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        assert!(registry.add_model("m1", settings("gpt-4o", "https://api.openai.com")));
        assert!(!registry.add_model("m1", settings("gpt-4o-mini", "https://api.openai.com")));
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_model_rejects_when_in_use() {
        struct AlwaysInUse;
        impl ModelUsageProvider for AlwaysInUse {
            fn agents_using(&self, _key: &crate::settings::ModelUsageKey) -> usize {
                1
            }
        }

        let registry = registry_with_defaults();
        registry.add_model("m1", settings("gpt-4o", "https://api.openai.com"));
        registry.set_usage_provider(Arc::new(AlwaysInUse));

        let err = registry.remove_model("m1").expect_err("should be in use");
        assert!(matches!(err, Error::ModelInUse { count: 1, .. }));
        assert!(registry.has_model("m1"));
    }

    #[test]
    fn remove_model_returns_false_when_absent() {
        let registry = registry_with_defaults();
        assert!(!registry.remove_model("missing").expect("not an error"));
    }

    #[test]
    fn update_model_does_not_alter_resolved_copies() {
        let registry = registry_with_defaults();
        registry.add_model("m1", settings("gpt-4o", "https://api.openai.com"));
        let resolved = registry.resolve_model_settings(Some("m1"), None).unwrap();

        assert!(registry.update_model("m1", settings("gpt-4o-mini", "https://api.openai.com")));

        assert_eq!(resolved.model, "gpt-4o");
        assert_eq!(registry.get_model("m1").unwrap().model_settings().model, "gpt-4o-mini");
    }

    #[test]
    fn resolve_with_no_model_id_and_no_default_returns_ambient_default() {
        let registry = registry_with_defaults();
        let resolved = registry.resolve_model_settings(None, None).unwrap();
        assert_eq!(resolved.model, "fallback");
    }

    #[test]
    fn resolve_rejects_custom_settings_when_disallowed() {
        let registry = ModelRegistry::new(ResolveConfig {
            allow_custom_models: false,
            allowed_models: None,
            default_model_id: None,
            default_model_settings: settings("fallback", "https://fallback.example"),
        });

        let err = registry
            .resolve_model_settings(None, Some(settings("custom", "https://custom.example")))
            .expect_err("should reject custom settings");
        assert!(matches!(err, Error::CustomModelsDisallowed));
    }

    #[test]
    fn resolve_by_id_stamps_last_used() {
        let registry = registry_with_defaults();
        registry.add_model("m1", settings("gpt-4o", "https://api.openai.com"));
        registry.resolve_model_settings(Some("m1"), None).unwrap();
        assert!(registry.get_model("m1").unwrap().last_used().is_some());
    }

    #[test]
    fn resolve_missing_default_model_id_reports_default_missing() {
        let registry = ModelRegistry::new(ResolveConfig {
            allow_custom_models: true,
            allowed_models: None,
            default_model_id: Some("ghost".to_owned()),
            default_model_settings: settings("fallback", "https://fallback.example"),
        });

        let err = registry
            .resolve_model_settings(None, None)
            .expect_err("should fail");
        assert!(matches!(err, Error::DefaultModelMissing { .. }));
    }

    #[test]
    fn model_stats_sorted_by_usage_then_recency() {
        struct ByModel(std::collections::HashMap<String, usize>);
        impl ModelUsageProvider for ByModel {
            fn agents_using(&self, key: &crate::settings::ModelUsageKey) -> usize {
                self.0.get(key.model()).copied().unwrap_or(0)
            }
        }

        let registry = registry_with_defaults();
        registry.add_model("low", settings("low-model", "https://api.example"));
        registry.add_model("high", settings("high-model", "https://api.example"));

        let mut usage = std::collections::HashMap::new();
        usage.insert("low-model".to_owned(), 1);
        usage.insert("high-model".to_owned(), 5);
        registry.set_usage_provider(Arc::new(ByModel(usage)));

        let stats = registry.get_model_stats();
        assert_eq!(stats[0].id, "high");
        assert_eq!(stats[1].id, "low");
    }
}
