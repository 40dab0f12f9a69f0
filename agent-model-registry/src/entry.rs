//! A single named entry in the model registry.

use chrono::{DateTime, Utc};

use crate::settings::ModelSettings;

/// A registered model, keyed by its caller-supplied `id`.
#[derive(Clone, Debug)]
pub struct ModelRegistryEntry {
    id: String,
    model_settings: ModelSettings,
    created: DateTime<Utc>,
    last_used: Option<DateTime<Utc>>,
}

impl ModelRegistryEntry {
    pub(crate) fn new(id: String, model_settings: ModelSettings, created: DateTime<Utc>) -> Self {
        Self {
            id,
            model_settings,
            created,
            last_used: None,
        }
    }

    /// Returns the registry-unique id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the entry's model settings.
    #[must_use]
    pub fn model_settings(&self) -> &ModelSettings {
        &self.model_settings
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Returns the timestamp of the most recent `resolveModelSettings` hit,
    /// if any.
    #[must_use]
    pub fn last_used(&self) -> Option<DateTime<Utc>> {
        self.last_used
    }

    pub(crate) fn set_model_settings(&mut self, settings: ModelSettings) {
        self.model_settings = settings;
    }

    pub(crate) fn stamp_last_used(&mut self, at: DateTime<Utc>) {
        self.last_used = Some(at);
    }
}
