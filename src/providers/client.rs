use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::{json, Value};

use super::request::{plan_image_request, plan_text_request, RequestPlan};
use super::response::{text_reply, trusted_image_reply, untrusted_image_reply, RawResponse};
use super::traits::AssistantBackend;
use super::types::{ApiError, ImageReply, TextReply, TextRequest};
use crate::config::TRUSTED_IMAGE_HOST;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomMethod {
    Get,
    Post,
}

/// Client for the text and image generation endpoints.
///
/// Stateless between calls: every call is planned from its arguments and
/// executed as exactly one HTTP request.
#[derive(Debug, Clone)]
pub struct PollinationsClient {
    client: Client,
    trusted_image_host: String,
}

impl Default for PollinationsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PollinationsClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            trusted_image_host: TRUSTED_IMAGE_HOST.to_string(),
        }
    }

    /// Treat `host` (and its subdomains) as the trusted image provider.
    pub fn with_trusted_image_host(mut self, host: impl Into<String>) -> Self {
        self.trusted_image_host = host.into().to_ascii_lowercase();
        self
    }

    pub async fn send_text(&self, request: &TextRequest) -> Result<TextReply, ApiError> {
        let plan = plan_text_request(request)?;
        let raw = self.execute(&plan).await.inspect_err(|e| {
            tracing::error!("Text API error: {}", e);
        })?;
        text_reply(raw)
    }

    pub async fn generate_image(
        &self,
        prompt: &str,
        model: Option<&str>,
        endpoint: Option<&str>,
    ) -> Result<ImageReply, ApiError> {
        let plan = plan_image_request(prompt, model, endpoint, &self.trusted_image_host)?;
        let raw = self.execute(&plan.request).await.inspect_err(|e| {
            tracing::error!("Image API error: {}", e);
        })?;

        if plan.trusted {
            trusted_image_reply(raw, plan.request.url().as_str())
        } else {
            untrusted_image_reply(raw)
        }
    }

    /// Pass a prompt straight through to a user-configured endpoint and hand
    /// back its JSON untouched.
    pub async fn call_custom(
        &self,
        endpoint: &str,
        api_key: Option<&str>,
        prompt: &str,
        method: CustomMethod,
    ) -> Result<Value, ApiError> {
        let mut req = match method {
            CustomMethod::Get => self
                .client
                .get(endpoint)
                .header(CONTENT_TYPE, "application/json"),
            CustomMethod::Post => self
                .client
                .post(endpoint)
                .header(CONTENT_TYPE, "application/json")
                .json(&json!({ "prompt": prompt })),
        };

        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Custom API error {}: {}", status.as_u16(), body);
            return Err(ApiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))
    }

    async fn execute(&self, plan: &RequestPlan) -> Result<RawResponse, ApiError> {
        tracing::debug!("{} {}", plan.method(), plan.url());

        let req = match plan {
            RequestPlan::Get { url } => self.client.get(url.clone()),
            RequestPlan::Post { url, body } => self
                .client
                .post(url.clone())
                .header(CONTENT_TYPE, "application/json")
                .json(body),
        };

        let response = req.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(RawResponse::new(status, content_type.as_deref(), body))
    }
}

#[async_trait]
impl AssistantBackend for PollinationsClient {
    async fn complete_text(&self, request: TextRequest) -> Result<TextReply, ApiError> {
        self.send_text(&request).await
    }

    async fn generate_image(
        &self,
        prompt: &str,
        model: Option<&str>,
        endpoint: Option<&str>,
    ) -> Result<ImageReply, ApiError> {
        PollinationsClient::generate_image(self, prompt, model, endpoint).await
    }
}
