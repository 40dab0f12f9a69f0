//! The on-disk conversation transcript format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;

/// Optional descriptive fields saved alongside a transcript, for display
/// purposes only.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ConversationMetadata {
    /// The agent's display name at save time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    /// The agent's description at save time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_description: Option<String>,
}

/// A full conversation transcript, as persisted to and loaded from disk.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ConversationData {
    /// The effective agent id this transcript belongs to.
    pub agent_id: String,
    /// The saved message sequence, in order.
    pub messages: Vec<ChatMessage>,
    /// When this transcript was written.
    pub saved_at: DateTime<Utc>,
    /// Optional descriptive metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ConversationMetadata>,
}

impl ConversationData {
    /// Creates a transcript stamped with the current time.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            agent_id: agent_id.into(),
            messages,
            saved_at: Utc::now(),
            metadata: None,
        }
    }

    /// Attaches descriptive metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ConversationMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
