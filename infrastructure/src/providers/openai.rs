//! OpenAI-compatible chat completions adapter
//!
//! `POST {base_url}/v1/chat/completions`. Works against any server that
//! speaks the same protocol; the API key is optional for local servers.

use super::{ProviderAdapter, ProviderError, ProviderKind, check_status};
use crate::config::{FileOpenAiConfig, resolve_api_key};
use async_trait::async_trait;
use moe_application::ports::llm_gateway::{GatewayError, LlmSession};
use moe_domain::ModelRef;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(config: &FileOpenAiConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &FileOpenAiConfig) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/v1/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            api_key: resolve_api_key(config.api_key.as_deref(), &config.api_key_env),
            max_tokens: config.max_tokens,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn create_session_with_system_prompt(
        &self,
        model: &ModelRef,
        system_prompt: &str,
    ) -> Result<Box<dyn LlmSession>, GatewayError> {
        Ok(Box::new(OpenAiSession {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            model: model.clone(),
            system_prompt: system_prompt.to_string(),
            max_tokens: model.max_tokens.unwrap_or(self.max_tokens),
        }))
    }
}

pub struct OpenAiSession {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: ModelRef,
    system_prompt: String,
    max_tokens: u32,
}

impl OpenAiSession {
    fn request_body(&self, content: &str) -> Value {
        let mut messages = Vec::new();
        if !self.system_prompt.is_empty() {
            messages.push(json!({ "role": "system", "content": self.system_prompt }));
        }
        messages.push(json!({ "role": "user", "content": content }));

        let mut body = json!({
            "model": self.model.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
        });
        if let Some(temperature) = self.model.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    async fn complete(&self, content: &str) -> Result<String, ProviderError> {
        let mut request = self.client.post(&self.endpoint).json(&self.request_body(content));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!("POST {} ({})", self.endpoint, self.model);
        let response = check_status(request.send().await?).await?;
        let completion: ChatCompletion = response.json().await?;
        completion.into_text()
    }
}

#[async_trait]
impl LlmSession for OpenAiSession {
    fn model(&self) -> &ModelRef {
        &self.model
    }

    async fn send(&self, content: &str) -> Result<String, GatewayError> {
        Ok(self.complete(content).await?)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatCompletion {
    fn into_text(self) -> Result<String, ProviderError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("no choices in completion".to_string()))
    }
}
