//! Value type describing how to reach a chat-completion endpoint.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Immutable description of a chat-completion endpoint and its sampling
/// parameters.
///
/// `ModelSettings` has value semantics: clone it rather than share references
/// so that downstream mutation by one holder (e.g. an adapter tuning
/// temperature for a single call) never leaks back into the registry.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSettings {
    /// Provider-facing model identifier, e.g. `"gpt-4o"`.
    pub model: String,
    /// Base URL of the chat-completion endpoint.
    pub base_url: String,
    /// Credential presented to the endpoint. Never logged or displayed in
    /// full; see [`ModelSettings::fmt`].
    pub api_key: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Optional maximum output tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Optional nucleus sampling parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Optional presence penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Optional frequency penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
}

impl ModelSettings {
    /// Creates settings with only the required fields populated.
    #[must_use]
    pub fn new(
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            model: model.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            temperature,
            max_tokens: None,
            top_p: None,
            presence_penalty: None,
            frequency_penalty: None,
        }
    }

    /// Returns the `(model, baseURL)` pair used as the equality key for
    /// usage accounting. Distinct from [`PartialEq`], which compares every
    /// field including `apiKey` and sampling parameters.
    #[must_use]
    pub fn usage_key(&self) -> ModelUsageKey {
        ModelUsageKey {
            model: self.model.clone(),
            base_url: self.base_url.clone(),
        }
    }

    fn redacted_api_key(&self) -> String {
        if self.api_key.is_empty() {
            return String::new();
        }
        let visible: String = self.api_key.chars().take(4).collect();
        format!("{visible}***redacted***")
    }
}

impl fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSettings")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.redacted_api_key())
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("top_p", &self.top_p)
            .field("presence_penalty", &self.presence_penalty)
            .field("frequency_penalty", &self.frequency_penalty)
            .finish()
    }
}

impl fmt::Display for ModelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} (apiKey={})",
            self.model,
            self.base_url,
            self.redacted_api_key()
        )
    }
}

/// The `(model, baseURL)` pair that determines whether two [`ModelSettings`]
/// refer to "the same model" for usage-accounting purposes.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ModelUsageKey {
    model: String,
    base_url: String,
}

impl ModelUsageKey {
    /// Returns the model identifier half of the key.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the base URL half of the key.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_key_ignores_api_key_and_temperature() {
        let a = ModelSettings::new("gpt-4o", "https://api.openai.com", "sk-aaa", 0.2);
        let b = ModelSettings::new("gpt-4o", "https://api.openai.com", "sk-bbb", 0.9);
        assert_eq!(a.usage_key(), b.usage_key());
        assert_ne!(a, b);
    }

    #[test]
    fn debug_redacts_api_key() {
        let settings = ModelSettings::new("gpt-4o", "https://api.openai.com", "sk-supersecret", 0.2);
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("supersecret"));
    }

    #[test]
    fn display_redacts_api_key() {
        let settings = ModelSettings::new("gpt-4o", "https://api.openai.com", "sk-supersecret", 0.2);
        let rendered = settings.to_string();
        assert!(!rendered.contains("supersecret"));
    }
}
