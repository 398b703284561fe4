use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Role;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("API error: {status}")]
    Api { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::NetworkError(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ApiError::NetworkError(format!("Connection failed: {}", err))
        } else {
            ApiError::NetworkError(format!("Request failed: {}", err))
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::InvalidRequest(format!("Invalid endpoint URL: {}", err))
    }
}

/// One turn of the history sent to the text endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

impl HistoryTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Everything the text call needs besides the network client.
#[derive(Debug, Clone, Default)]
pub struct TextRequest {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub messages: Vec<HistoryTurn>,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// A `data:` URL holding the whole clip.
    pub url: String,
    pub mime: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextReply {
    pub content: String,
    pub audio: Option<AudioClip>,
}

impl TextReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            audio: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReply {
    /// Empty when an untrusted host answered with JSON lacking a URL.
    pub url: String,
    pub direct: bool,
}
