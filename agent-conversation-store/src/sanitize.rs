//! Filename sanitization and templating for conversation transcripts.

/// Characters replaced with `_` when building a filename from an agent id.
const UNSAFE_CHARS: &[char] = &[':', '|', '@', '/', '\\', '<', '>', '*', '?', '"'];

/// Replaces every unsafe filesystem character in `id` with `_`.
#[must_use]
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Builds the canonical filename for a transcript: `conversation_<sanitized
/// id>_<epoch_ms>.json`.
#[must_use]
pub fn filename_for(agent_id: &str, epoch_ms: i64) -> String {
    format!("conversation_{}_{epoch_ms}.json", sanitize_id(agent_id))
}

/// Prefix shared by every filename produced by [`filename_for`] for a given
/// agent id, used to find existing transcripts on disk.
#[must_use]
pub fn filename_prefix(agent_id: &str) -> String {
    format!("conversation_{}_", sanitize_id(agent_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_every_unsafe_character() {
        let sanitized = sanitize_id(r#"ns:a|b@c/d\e<f>g*h?i"j"#);
        assert!(!sanitized.contains(':'));
        assert!(!sanitized.contains('/'));
        assert!(!sanitized.contains('"'));
    }

    #[test]
    fn filename_embeds_sanitized_id_and_epoch() {
        let name = filename_for("ns:a", 1_700_000_000_000);
        assert_eq!(name, "conversation_ns_a_1700000000000.json");
    }
}
