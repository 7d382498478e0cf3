//! Anthropic messages adapter
//!
//! `POST {base_url}/v1/messages` with `x-api-key` and `anthropic-version`.
//! The system prompt goes in the top-level `system` field.

use super::{ProviderAdapter, ProviderError, ProviderKind, check_status};
use crate::config::{FileAnthropicConfig, resolve_api_key};
use async_trait::async_trait;
use moe_application::ports::llm_gateway::{GatewayError, LlmSession};
use moe_domain::ModelRef;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

pub struct AnthropicProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    api_key_env: String,
    api_version: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(config: &FileAnthropicConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &FileAnthropicConfig) -> Self {
        Self {
            client,
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            api_key: resolve_api_key(config.api_key.as_deref(), &config.api_key_env),
            api_key_env: config.api_key_env.clone(),
            api_version: config.api_version.clone(),
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn create_session_with_system_prompt(
        &self,
        model: &ModelRef,
        system_prompt: &str,
    ) -> Result<Box<dyn LlmSession>, GatewayError> {
        let api_key = self.api_key.clone().ok_or_else(|| ProviderError::MissingApiKey {
            provider: ProviderKind::Anthropic,
            env: self.api_key_env.clone(),
        })?;

        Ok(Box::new(AnthropicSession {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            api_key,
            api_version: self.api_version.clone(),
            model: model.clone(),
            system_prompt: system_prompt.to_string(),
            max_tokens: model.max_tokens.unwrap_or(self.max_tokens),
        }))
    }
}

pub struct AnthropicSession {
    client: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    model: ModelRef,
    system_prompt: String,
    max_tokens: u32,
}

impl AnthropicSession {
    fn request_body(&self, content: &str) -> Value {
        let mut body = json!({
            "model": self.model.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": content }],
        });
        if !self.system_prompt.is_empty() {
            body["system"] = json!(self.system_prompt);
        }
        if let Some(temperature) = self.model.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    async fn complete(&self, content: &str) -> Result<String, ProviderError> {
        debug!("POST {} ({})", self.endpoint, self.model);
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&self.request_body(content))
            .send()
            .await?;

        let message: MessagesResponse = check_status(response).await?.json().await?;
        message.into_text()
    }
}

#[async_trait]
impl LlmSession for AnthropicSession {
    fn model(&self) -> &ModelRef {
        &self.model
    }

    async fn send(&self, content: &str) -> Result<String, GatewayError> {
        Ok(self.complete(content).await?)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl MessagesResponse {
    /// Concatenated text blocks
    fn into_text(self) -> Result<String, ProviderError> {
        let text: String = self
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "no text content in message".to_string(),
            ));
        }
        Ok(text)
    }
}
