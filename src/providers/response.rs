//! Normalisation of raw HTTP responses into replies.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde_json::Value;

use super::types::{ApiError, AudioClip, ImageReply, TextReply};

pub const AUDIO_PLACEHOLDER: &str = "Generated an audio response.";
pub const NO_RESPONSE: &str = "No response received";

const FALLBACK_IMAGE_MIME: &str = "image/png";

/// A response after the transport is done with it.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Lowercased media type without parameters, empty if absent.
    pub content_type: String,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: media_type(content_type.unwrap_or_default()),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Non-2xx statuses become `ApiError::Api` carrying the body.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            tracing::error!("API response {}: {}", self.status, self.body_text());
            Err(ApiError::Api {
                status: self.status,
                body: self.body_text(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Audio,
    Image,
    Json,
    Text,
}

fn is_audio(content_type: &str) -> bool {
    content_type.starts_with("audio/")
}

fn is_image(content_type: &str) -> bool {
    content_type.starts_with("image/")
}

fn is_json(content_type: &str) -> bool {
    content_type.contains("application/json")
}

/// Ordered content-type rules; the first predicate that holds decides.
const CONTENT_POLICY: &[(fn(&str) -> bool, BodyKind)] = &[
    (is_audio, BodyKind::Audio),
    (is_image, BodyKind::Image),
    (is_json, BodyKind::Json),
];

pub fn classify_body(content_type: &str) -> BodyKind {
    CONTENT_POLICY
        .iter()
        .find(|(matches, _)| matches(content_type))
        .map(|(_, kind)| *kind)
        .unwrap_or(BodyKind::Text)
}

/// JSON locations a text reply may live at, in priority order.
const TEXT_FIELDS: &[&str] = &[
    "/choices/0/message/content",
    "/output",
    "/response",
    "/text",
    "/result",
];

/// Pick the first known field that is present and not null.
pub fn extract_text(value: &Value) -> Option<String> {
    TEXT_FIELDS
        .iter()
        .filter_map(|pointer| value.pointer(pointer))
        .find(|v| !v.is_null())
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

pub fn text_reply(raw: RawResponse) -> Result<TextReply, ApiError> {
    let raw = raw.error_for_status()?;

    match classify_body(&raw.content_type) {
        BodyKind::Audio => {
            let mime = raw.content_type.clone();
            Ok(TextReply {
                content: AUDIO_PLACEHOLDER.to_string(),
                audio: Some(AudioClip {
                    url: data_url(&mime, &raw.body),
                    mime,
                }),
            })
        }
        BodyKind::Json => {
            let content = match serde_json::from_slice::<Value>(&raw.body) {
                Ok(value) => extract_text(&value).unwrap_or_default(),
                Err(e) => {
                    tracing::warn!("Unparseable JSON reply: {}", e);
                    String::new()
                }
            };
            Ok(TextReply::text(or_no_response(content)))
        }
        BodyKind::Image | BodyKind::Text => Ok(TextReply::text(or_no_response(raw.body_text()))),
    }
}

/// Reply from the trusted image host. Always `direct`. A JSON body without
/// a URL falls back to the request URL; anything else that is not an image
/// is an error.
pub fn trusted_image_reply(raw: RawResponse, request_url: &str) -> Result<ImageReply, ApiError> {
    let raw = raw.error_for_status()?;

    if classify_body(&raw.content_type) == BodyKind::Image {
        return Ok(ImageReply {
            url: data_url(&raw.content_type, &raw.body),
            direct: true,
        });
    }

    let value = serde_json::from_slice::<Value>(&raw.body).map_err(|e| {
        tracing::error!("Image host returned {} instead of an image", raw.content_type);
        ApiError::MalformedResponse(e.to_string())
    })?;
    let url = extract_image_url(&value, &["/url", "/data/0/url"]);

    Ok(ImageReply {
        url: url.unwrap_or_else(|| request_url.to_string()),
        direct: true,
    })
}

/// Reply from a custom image endpoint. Never `direct`; the URL is empty when
/// the JSON carries none.
pub fn untrusted_image_reply(raw: RawResponse) -> Result<ImageReply, ApiError> {
    let raw = raw.error_for_status()?;

    if classify_body(&raw.content_type) == BodyKind::Json {
        let url = serde_json::from_slice::<Value>(&raw.body)
            .ok()
            .and_then(|value| extract_image_url(&value, &["/data/0/url", "/url"]))
            .unwrap_or_default();
        if url.is_empty() {
            tracing::warn!("Image endpoint returned JSON without a URL");
        }
        return Ok(ImageReply { url, direct: false });
    }

    let mime = if raw.content_type.is_empty() {
        FALLBACK_IMAGE_MIME
    } else {
        raw.content_type.as_str()
    };

    Ok(ImageReply {
        url: data_url(mime, &raw.body),
        direct: false,
    })
}

pub fn data_url(mime: &str, body: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(body))
}

fn extract_image_url(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| value.pointer(p).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn or_no_response(content: String) -> String {
    if content.is_empty() {
        NO_RESPONSE.to_string()
    } else {
        content
    }
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_response(value: Value) -> RawResponse {
        RawResponse::new(200, Some("application/json; charset=utf-8"), value.to_string())
    }

    #[test]
    fn test_extract_text_priority() {
        let value = json!({
            "choices": [{ "message": { "content": "from choices" } }],
            "output": "from output",
        });
        assert_eq!(extract_text(&value).as_deref(), Some("from choices"));

        let value = json!({ "response": "r", "text": "t" });
        assert_eq!(extract_text(&value).as_deref(), Some("r"));

        let value = json!({ "output": null, "result": "done" });
        assert_eq!(extract_text(&value).as_deref(), Some("done"));

        assert_eq!(extract_text(&json!({ "other": 1 })), None);
    }

    #[test]
    fn test_json_reply_without_known_field_degrades() {
        let reply = text_reply(json_response(json!({ "unexpected": true }))).unwrap();
        assert_eq!(reply.content, NO_RESPONSE);
        assert_eq!(reply.audio, None);
    }

    #[test]
    fn test_malformed_json_degrades() {
        let raw = RawResponse::new(200, Some("application/json"), "{not json");
        assert_eq!(text_reply(raw).unwrap().content, NO_RESPONSE);
    }

    #[test]
    fn test_plain_text_reply() {
        let raw = RawResponse::new(200, Some("text/plain"), "Hello!");
        assert_eq!(text_reply(raw).unwrap().content, "Hello!");

        let raw = RawResponse::new(200, None, "");
        assert_eq!(text_reply(raw).unwrap().content, NO_RESPONSE);
    }

    #[test]
    fn test_audio_reply_becomes_data_url() {
        let raw = RawResponse::new(200, Some("audio/mpeg"), vec![1u8, 2, 3]);
        let reply = text_reply(raw).unwrap();
        assert_eq!(reply.content, AUDIO_PLACEHOLDER);
        let audio = reply.audio.unwrap();
        assert_eq!(audio.mime, "audio/mpeg");
        assert_eq!(audio.url, "data:audio/mpeg;base64,AQID");
    }

    #[test]
    fn test_non_success_status_is_api_error() {
        let raw = RawResponse::new(503, Some("text/plain"), "busy");
        match text_reply(raw) {
            Err(ApiError::Api { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "busy");
            }
            other => panic!("Expected ApiError::Api, got {:?}", other),
        }
    }

    #[test]
    fn test_image_bytes_direct_flag_depends_on_host() {
        let raw = RawResponse::new(200, Some("image/png"), vec![0u8, 1]);
        let trusted = trusted_image_reply(raw.clone(), "https://image.pollinations.ai/prompt/x").unwrap();
        assert!(trusted.direct);
        assert!(trusted.url.starts_with("data:image/png;base64,"));

        let untrusted = untrusted_image_reply(raw).unwrap();
        assert!(!untrusted.direct);
        assert_eq!(untrusted.url, trusted.url);
    }

    #[test]
    fn test_trusted_json_reply_falls_back_to_request_url() {
        let reply = trusted_image_reply(json_response(json!({ "data": [{ "url": "https://cdn/x.png" }] })), "req")
            .unwrap();
        assert_eq!(reply.url, "https://cdn/x.png");

        let reply = trusted_image_reply(json_response(json!({ "url": "https://cdn/top.png" })), "req")
            .unwrap();
        assert_eq!(reply.url, "https://cdn/top.png");
        assert!(reply.direct);

        let reply = trusted_image_reply(json_response(json!({})), "https://req/url").unwrap();
        assert_eq!(reply.url, "https://req/url");
    }

    #[test]
    fn test_trusted_non_image_body_is_an_error() {
        let raw = RawResponse::new(200, Some("text/html"), "<html>rate limited</html>");
        let err = trusted_image_reply(raw, "https://req/url").unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }

    #[test]
    fn test_untrusted_json_without_url_is_empty() {
        let reply = untrusted_image_reply(json_response(json!({ "status": "queued" }))).unwrap();
        assert_eq!(reply.url, "");
        assert!(!reply.direct);

        let reply = untrusted_image_reply(json_response(json!({ "url": "https://x/y.png" }))).unwrap();
        assert_eq!(reply.url, "https://x/y.png");
    }

    #[test]
    fn test_untrusted_binary_without_content_type_is_png() {
        let reply = untrusted_image_reply(RawResponse::new(200, None, vec![9u8])).unwrap();
        assert!(reply.url.starts_with("data:image/png;base64,"));
    }
}
