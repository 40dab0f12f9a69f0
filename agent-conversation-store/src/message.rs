//! Transcript message types shared with `agent-manager`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of the speaker that produced a [`ChatMessage`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions steering assistant behaviour.
    System,
    /// User-authored content.
    User,
    /// Assistant (model) responses.
    Assistant,
    /// Tool results returned to the reasoning loop.
    Tool,
}

/// A single message in an agent's conversation history.
///
/// Fields beyond `role`/`content` (e.g. a tool-call name) are carried in
/// `metadata` rather than typed individually, so this crate does not need to
/// understand provider- or tool-specific shapes.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ChatMessage {
    /// Who produced this message.
    pub role: ChatRole,
    /// The message body.
    pub content: String,
    /// Opaque, provider- or tool-specific fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl ChatMessage {
    /// Creates a message with no metadata.
    #[must_use]
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: None,
        }
    }

    /// Attaches a metadata map.
    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
