use async_trait::async_trait;

use super::types::{ApiError, ImageReply, TextReply, TextRequest};

/// The network side of a chat turn, as seen by the conversation store.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    async fn complete_text(&self, request: TextRequest) -> Result<TextReply, ApiError>;

    async fn generate_image(
        &self,
        prompt: &str,
        model: Option<&str>,
        endpoint: Option<&str>,
    ) -> Result<ImageReply, ApiError>;
}
