//! HTTP LLM providers behind the application's `LlmGateway` port

pub mod anthropic;
pub mod openai;
pub mod routing;

use async_trait::async_trait;
use moe_application::ports::llm_gateway::{GatewayError, LlmSession};
use moe_domain::ModelRef;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Some(ProviderKind::OpenAi),
            "anthropic" => Some(ProviderKind::Anthropic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised by the HTTP adapters before they reach the gateway port
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider}: no API key (set {env} or api_key)")]
    MissingApiKey { provider: ProviderKind, env: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::MissingApiKey { .. } => GatewayError::SessionError(err.to_string()),
            ProviderError::Http(e) if e.is_timeout() => GatewayError::Timeout,
            ProviderError::Http(e) if e.is_connect() => GatewayError::ConnectionError(e.to_string()),
            ProviderError::Http(e) => GatewayError::RequestFailed(e.to_string()),
            ProviderError::Status { status: 404, body } => GatewayError::ModelNotAvailable(body),
            ProviderError::Status { status: 408, .. } => GatewayError::Timeout,
            ProviderError::Status { .. } => GatewayError::RequestFailed(err.to_string()),
            ProviderError::InvalidResponse(msg) => GatewayError::Other(msg),
        }
    }
}

/// One HTTP backend
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn create_session_with_system_prompt(
        &self,
        model: &ModelRef,
        system_prompt: &str,
    ) -> Result<Box<dyn LlmSession>, GatewayError>;
}

/// Turn a non-2xx response into [`ProviderError::Status`]
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body: moe_domain::core::string::truncate(&body, 300),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_kind() {
        assert_eq!(ProviderKind::parse("openai"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::parse(" Anthropic "), Some(ProviderKind::Anthropic));
        assert_eq!(ProviderKind::parse("bedrock"), None);
    }

    #[test]
    fn test_error_mapping() {
        let err: GatewayError = ProviderError::Status {
            status: 404,
            body: "model not found".to_string(),
        }
        .into();
        assert_eq!(err, GatewayError::ModelNotAvailable("model not found".to_string()));

        let err: GatewayError = ProviderError::Status {
            status: 429,
            body: "slow down".to_string(),
        }
        .into();
        assert_eq!(err, GatewayError::RequestFailed("HTTP 429: slow down".to_string()));

        let err: GatewayError = ProviderError::MissingApiKey {
            provider: ProviderKind::Anthropic,
            env: "ANTHROPIC_API_KEY".to_string(),
        }
        .into();
        assert!(matches!(err, GatewayError::SessionError(msg) if msg.contains("ANTHROPIC_API_KEY")));
    }
}
