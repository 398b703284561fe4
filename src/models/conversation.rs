use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::Message;
use crate::config::PREVIEW_LEN;

pub const NEW_CHAT_TITLE: &str = "New Chat";
pub const EMPTY_PREVIEW: &str = "Say hello to start...";
pub const DEFAULT_FOLDER: &str = "Work Projects";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub message_count: usize,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

fn default_title() -> String {
    NEW_CHAT_TITLE.to_string()
}

impl Conversation {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: NEW_CHAT_TITLE.to_string(),
            updated_at: now,
            message_count: 0,
            preview: EMPTY_PREVIEW.to_string(),
            pinned: false,
            folder: DEFAULT_FOLDER.to_string(),
            messages: Vec::new(),
        }
    }

    /// Re-derive the count and preview from the message sequence.
    ///
    /// Every mutation of `messages` must be followed by this call; the two
    /// fields are never edited on their own.
    pub fn refresh_summary(&mut self) {
        self.message_count = self.messages.len();
        self.preview = match self.messages.last() {
            Some(last) => truncate_preview(&last.content),
            None => EMPTY_PREVIEW.to_string(),
        };
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn matches_query(&self, query_lower: &str) -> bool {
        self.title.to_lowercase().contains(query_lower)
            || self.preview.to_lowercase().contains(query_lower)
    }
}

/// First 80 characters of `content`, split on a char boundary.
pub fn truncate_preview(content: &str) -> String {
    content.chars().take(PREVIEW_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_title_and_timestamp_take_defaults() {
        let conv: Conversation = serde_json::from_str(r#"{"id": "c1", "messages": []}"#).unwrap();
        assert_eq!(conv.title, NEW_CHAT_TITLE);
        assert_eq!(conv.updated_at, DateTime::<Utc>::default());
    }

    #[test]
    fn test_truncate_preview_respects_char_boundaries() {
        let text = "é".repeat(100);
        let preview = truncate_preview(&text);
        assert_eq!(preview.chars().count(), 80);
    }

    #[test]
    fn test_refresh_summary_tracks_last_message() {
        let now = Utc::now();
        let mut conv = Conversation::new(now);
        conv.messages.push(Message::user("first", now));
        conv.messages.push(Message::assistant("x".repeat(120), now));
        conv.refresh_summary();

        assert_eq!(conv.message_count, 2);
        assert_eq!(conv.preview, "x".repeat(80));

        conv.messages.clear();
        conv.refresh_summary();
        assert_eq!(conv.preview, EMPTY_PREVIEW);
    }
}
