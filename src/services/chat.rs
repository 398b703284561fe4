use chrono::{DateTime, Utc};

use crate::config::{DEFAULT_MAX_TOKENS, HISTORY_WINDOW};
use crate::models::{Message, Role};
use crate::providers::{
    classify_intent, ApiError, AssistantBackend, HistoryTurn, ImageReply, Intent, TextReply,
    TextRequest,
};
use crate::services::settings::AppSettings;

pub const IMAGE_REPLY_CONTENT: &str = "Here is the image I generated:";

/// A user turn that has been appended and is waiting on the backend.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub conversation_id: String,
    pub prompt: String,
    /// Conversation messages up to and including the new user message.
    pub history: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantReply {
    Text(TextReply),
    Image(ImageReply),
}

/// Build the text request for a turn: the last `HISTORY_WINDOW` messages,
/// with the configured model and endpoint.
pub fn text_request(settings: &AppSettings, turn: &PendingTurn) -> TextRequest {
    let start = turn.history.len().saturating_sub(HISTORY_WINDOW);
    let messages = turn.history[start..]
        .iter()
        .map(|m| HistoryTurn::new(m.role, m.content.clone()))
        .collect();

    TextRequest {
        prompt: Some(turn.prompt.clone()),
        model: Some(settings.default_text_model.clone()),
        endpoint: Some(settings.text_api_endpoint.clone()),
        messages,
        system_prompt: None,
        max_tokens: Some(DEFAULT_MAX_TOKENS),
    }
}

/// Route a turn to the text or image backend by intent.
pub async fn respond(
    backend: &dyn AssistantBackend,
    settings: &AppSettings,
    turn: &PendingTurn,
) -> Result<AssistantReply, ApiError> {
    match classify_intent(&turn.prompt) {
        Intent::Image => {
            tracing::info!("Generating image for conversation {}", turn.conversation_id);
            let reply = backend
                .generate_image(
                    &turn.prompt,
                    Some(settings.default_image_model.as_str()),
                    Some(settings.image_api_endpoint.as_str()),
                )
                .await?;
            Ok(AssistantReply::Image(reply))
        }
        Intent::Text => {
            tracing::info!("Requesting text reply for conversation {}", turn.conversation_id);
            let reply = backend.complete_text(text_request(settings, turn)).await?;
            Ok(AssistantReply::Text(reply))
        }
    }
}

/// The assistant message for a finished turn. Failures become an
/// `Error: ...` message.
pub fn reply_message(result: Result<AssistantReply, ApiError>, now: DateTime<Utc>) -> Message {
    match result {
        Ok(AssistantReply::Text(reply)) => {
            let message = Message::new(Role::Assistant, reply.content, now);
            match reply.audio {
                Some(audio) => message.with_audio(audio.url, audio.mime),
                None => message,
            }
        }
        Ok(AssistantReply::Image(reply)) => {
            let message = Message::new(Role::Assistant, IMAGE_REPLY_CONTENT, now);
            if reply.url.is_empty() {
                message
            } else {
                message.with_image(reply.url, reply.direct)
            }
        }
        Err(e) => {
            tracing::error!("Assistant request failed: {}", e);
            Message::new(Role::Assistant, format!("Error: {}", e), now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::AudioClip;

    fn turn(history_len: usize) -> PendingTurn {
        let now = Utc::now();
        let history = (0..history_len)
            .map(|i| Message::user(format!("message {}", i), now))
            .collect();
        PendingTurn {
            conversation_id: "c1".to_string(),
            prompt: "latest".to_string(),
            history,
        }
    }

    #[test]
    fn test_text_request_keeps_last_twenty() {
        let request = text_request(&AppSettings::default(), &turn(25));
        assert_eq!(request.messages.len(), HISTORY_WINDOW);
        assert_eq!(request.messages[0].content, "message 5");
        assert_eq!(request.model.as_deref(), Some("openai"));
        assert_eq!(request.max_tokens, Some(DEFAULT_MAX_TOKENS));

        let request = text_request(&AppSettings::default(), &turn(3));
        assert_eq!(request.messages.len(), 3);
    }

    #[test]
    fn test_reply_message_shapes() {
        let now = Utc::now();

        let msg = reply_message(
            Ok(AssistantReply::Text(TextReply {
                content: "tune".to_string(),
                audio: Some(AudioClip {
                    url: "data:audio/mpeg;base64,AA==".to_string(),
                    mime: "audio/mpeg".to_string(),
                }),
            })),
            now,
        );
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.audio_mime.as_deref(), Some("audio/mpeg"));

        let msg = reply_message(
            Ok(AssistantReply::Image(ImageReply {
                url: "https://image.pollinations.ai/prompt/cat".to_string(),
                direct: true,
            })),
            now,
        );
        assert_eq!(msg.content, IMAGE_REPLY_CONTENT);
        assert!(msg.image_direct);

        let msg = reply_message(
            Ok(AssistantReply::Image(ImageReply {
                url: String::new(),
                direct: false,
            })),
            now,
        );
        assert_eq!(msg.image_url, None);

        let msg = reply_message(
            Err(ApiError::Api {
                status: 500,
                body: "boom".to_string(),
            }),
            now,
        );
        assert_eq!(msg.content, "Error: API error: 500");
    }
}
