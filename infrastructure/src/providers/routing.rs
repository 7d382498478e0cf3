use super::anthropic::AnthropicProvider;
use super::openai::OpenAiProvider;
use super::{ProviderAdapter, ProviderKind};
use crate::config::FileProvidersConfig;
use async_trait::async_trait;
use moe_application::ports::llm_gateway::{GatewayError, LlmGateway, LlmSession};
use moe_domain::ModelRef;
use std::sync::Arc;
use tracing::debug;

/// Gateway that picks an adapter by the model's provider name
pub struct RoutingGateway {
    providers: Vec<Arc<dyn ProviderAdapter>>,
    default_kind: ProviderKind,
}

impl RoutingGateway {
    pub fn new(providers: Vec<Arc<dyn ProviderAdapter>>, default_kind: ProviderKind) -> Self {
        Self {
            providers,
            default_kind,
        }
    }

    /// OpenAI-compatible and Anthropic adapters built from `[providers]`
    pub fn from_config(config: &FileProvidersConfig) -> Self {
        let client = reqwest::Client::new();
        let providers: Vec<Arc<dyn ProviderAdapter>> = vec![
            Arc::new(OpenAiProvider::with_client(client.clone(), &config.openai)),
            Arc::new(AnthropicProvider::with_client(client, &config.anthropic)),
        ];
        let default_kind = config
            .default
            .as_deref()
            .and_then(ProviderKind::parse)
            .unwrap_or_default();
        Self::new(providers, default_kind)
    }

    /// Routing priority:
    ///  1. The adapter whose kind matches `model.provider`
    ///  2. The default provider kind
    ///  3. The first registered adapter
    ///  4. No adapters: `GatewayError::ModelNotAvailable`
    fn resolve_provider(&self, model: &ModelRef) -> Result<&dyn ProviderAdapter, GatewayError> {
        if let Some(kind) = ProviderKind::parse(&model.provider)
            && let Some(p) = self.find(kind)
        {
            return Ok(p);
        }

        debug!(
            "No adapter for provider '{}', using default {}",
            model.provider, self.default_kind
        );
        self.find(self.default_kind)
            .or_else(|| self.providers.first().map(|p| p.as_ref()))
            .ok_or_else(|| {
                GatewayError::ModelNotAvailable(format!("no provider available for {}", model))
            })
    }

    fn find(&self, kind: ProviderKind) -> Option<&dyn ProviderAdapter> {
        self.providers
            .iter()
            .find(|p| p.kind() == kind)
            .map(|p| p.as_ref())
    }
}

#[async_trait]
impl LlmGateway for RoutingGateway {
    async fn create_session_with_system_prompt(
        &self,
        model: &ModelRef,
        system_prompt: &str,
    ) -> Result<Box<dyn LlmSession>, GatewayError> {
        self.resolve_provider(model)?
            .create_session_with_system_prompt(model, system_prompt)
            .await
    }
}
