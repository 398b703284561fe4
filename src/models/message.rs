use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Label used when a history is flattened into a single prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        }
    }

    /// Anything that is not an assistant or system turn is sent as the user.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::User,
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::from_str_lossy(&s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default = "new_id")]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// True when the image is a resource the client fetched and holds itself.
    #[serde(default)]
    pub image_direct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_mime: Option<String>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            role,
            content: content.into(),
            image_url: None,
            image_direct: false,
            audio_url: None,
            audio_mime: None,
            created_at,
            edited_at: None,
        }
    }

    pub fn user(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self::new(Role::User, content, created_at)
    }

    pub fn assistant(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self::new(Role::Assistant, content, created_at)
    }

    pub fn with_image(mut self, url: impl Into<String>, direct: bool) -> Self {
        self.image_url = Some(url.into());
        self.image_direct = direct;
        self
    }

    pub fn with_audio(mut self, url: impl Into<String>, mime: impl Into<String>) -> Self {
        self.audio_url = Some(url.into());
        self.audio_mime = Some(mime.into());
        self
    }
}
