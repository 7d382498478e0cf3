//! Model reference value object

use serde::{Deserialize, Serialize};

/// Reference to an LLM backend (Value Object)
///
/// Names the provider the request is routed to and the model asked,
/// plus optional sampling parameters. Voters and the single-LLM path
/// both carry one of these.
///
/// # Example
///
/// ```
/// use moe_domain::ModelRef;
///
/// let model = ModelRef::new("openai", "gpt-4o-mini").with_temperature(0.2);
/// assert_eq!(model.to_string(), "openai/gpt-4o-mini");
/// assert_eq!(model.temperature, Some(0.2));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRef {
    /// Provider name used for routing (e.g. "openai", "anthropic")
    pub provider: String,
    /// Model identifier understood by the provider
    pub model: String,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Response token limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ModelRef {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Model identifier without the provider prefix
    pub fn as_str(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}
