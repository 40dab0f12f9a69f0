//! Best-effort JSON file persistence for conversation transcripts.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::data::ConversationData;
use crate::error::Result;
use crate::sanitize::{filename_for, filename_prefix};

/// Saves and loads [`ConversationData`] as pretty-printed JSON files under a
/// configured data directory.
#[derive(Clone, Debug)]
pub struct ConversationStore {
    data_directory: PathBuf,
}

impl ConversationStore {
    /// Creates a store rooted at `data_directory`. The directory is created
    /// lazily on first save, not here.
    #[must_use]
    pub fn new(data_directory: impl Into<PathBuf>) -> Self {
        Self {
            data_directory: data_directory.into(),
        }
    }

    /// Returns the configured data directory.
    #[must_use]
    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }

    /// Writes `data` as pretty-printed JSON, returning the path written to.
    ///
    /// Creates the data directory if absent; a failure to create it is
    /// logged rather than returned, since the subsequent write will itself
    /// fail with a clearer error if the directory genuinely could not be
    /// created.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the file cannot be written, or
    /// [`crate::Error::Serialize`] if `data` cannot be serialized.
    pub async fn save(&self, data: &ConversationData, filename: Option<&str>) -> Result<PathBuf> {
        if let Err(source) = tokio::fs::create_dir_all(&self.data_directory).await {
            tracing::warn!(
                directory = %self.data_directory.display(),
                %source,
                "failed to create conversation data directory; attempting write anyway"
            );
        }

        let filename = filename
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| filename_for(&data.agent_id, Utc::now().timestamp_millis()));
        let path = self.data_directory.join(filename);

        let json = serde_json::to_vec_pretty(data)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }

    /// Loads the transcript at `self.data_directory().join(filename)`.
    ///
    /// Best-effort: any I/O or parse failure returns `None` rather than an
    /// error.
    pub async fn load_file(&self, filename: &str) -> Option<ConversationData> {
        let path = self.data_directory.join(filename);
        let bytes = tokio::fs::read(&path).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Finds and loads the most recently saved transcript for `agent_id`.
    ///
    /// Scans the data directory for files matching the sanitized-id prefix,
    /// sorts them by the embedded epoch-millisecond timestamp descending,
    /// and loads the newest. Best-effort throughout: a missing directory,
    /// unreadable file, or malformed JSON all yield `None` rather than an
    /// error.
    pub async fn load_latest(&self, agent_id: &str) -> Option<ConversationData> {
        let prefix = filename_prefix(agent_id);
        let mut entries = tokio::fs::read_dir(&self.data_directory).await.ok()?;

        let mut candidates: Vec<(i64, String)> = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(epoch) = parse_epoch(&name, &prefix) {
                candidates.push((epoch, name));
            }
        }

        candidates.sort_by(|a, b| b.0.cmp(&a.0));
        let (_, newest) = candidates.into_iter().next()?;
        self.load_file(&newest).await
    }
}

fn parse_epoch(filename: &str, prefix: &str) -> Option<i64> {
    let rest = filename.strip_prefix(prefix)?;
    let rest = rest.strip_suffix(".json")?;
    rest.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ChatMessage, ChatRole};

    #[tokio::test]
    async fn save_then_load_file_round_trips_messages() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path());
        let data = ConversationData::new(
            "agent-1",
            vec![ChatMessage::new(ChatRole::User, "hello")],
        );

        let path = store.save(&data, Some("t.json")).await.unwrap();
        assert!(path.exists());

        let loaded = store.load_file("t.json").await.unwrap();
        assert_eq!(loaded.messages, data.messages);
    }

    #[tokio::test]
    async fn load_latest_picks_newest_by_embedded_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path());

        let older = ConversationData::new("agent-1", vec![ChatMessage::new(ChatRole::User, "old")]);
        let newer = ConversationData::new("agent-1", vec![ChatMessage::new(ChatRole::User, "new")]);

        store
            .save(&older, Some("conversation_agent-1_1000.json"))
            .await
            .unwrap();
        store
            .save(&newer, Some("conversation_agent-1_2000.json"))
            .await
            .unwrap();

        let loaded = store.load_latest("agent-1").await.unwrap();
        assert_eq!(loaded.messages, newer.messages);
    }

    #[tokio::test]
    async fn load_latest_on_missing_directory_returns_none() {
        let store = ConversationStore::new("/nonexistent/agent-data-dir");
        assert!(store.load_latest("agent-1").await.is_none());
    }

    #[tokio::test]
    async fn load_file_on_malformed_json_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path());
        tokio::fs::write(dir.path().join("bad.json"), b"not json")
            .await
            .unwrap();

        assert!(store.load_file("bad.json").await.is_none());
    }
}
