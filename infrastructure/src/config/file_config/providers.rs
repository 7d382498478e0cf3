//! Provider configuration from TOML (`[providers]` section)

use serde::{Deserialize, Serialize};

/// Anthropic API provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAnthropicConfig {
    /// Environment variable name for the API key (default: "ANTHROPIC_API_KEY").
    pub api_key_env: String,
    /// Direct API key (prefer the env var).
    pub api_key: Option<String>,
    /// Base URL for the Anthropic API.
    pub base_url: String,
    /// Max tokens when the participant sets none.
    pub max_tokens: u32,
    /// Anthropic API version header.
    pub api_version: String,
}

impl Default for FileAnthropicConfig {
    fn default() -> Self {
        Self {
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 512,
            api_version: "2023-06-01".to_string(),
        }
    }
}

/// OpenAI-compatible API provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOpenAiConfig {
    /// Environment variable name for the API key (default: "OPENAI_API_KEY").
    pub api_key_env: String,
    /// Direct API key (prefer the env var).
    pub api_key: Option<String>,
    /// Base URL; point it at any OpenAI-compatible server.
    pub base_url: String,
    /// Max tokens when the participant sets none.
    pub max_tokens: u32,
}

impl Default for FileOpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 512,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProvidersConfig {
    /// Provider used for unknown provider names: "openai" or "anthropic".
    pub default: Option<String>,
    pub anthropic: FileAnthropicConfig,
    pub openai: FileOpenAiConfig,
}

/// Resolve an API key: explicit value first, then the named env var.
pub fn resolve_api_key(api_key: Option<&str>, api_key_env: &str) -> Option<String> {
    api_key
        .filter(|k| !k.trim().is_empty())
        .map(str::to_string)
        .or_else(|| std::env::var(api_key_env).ok())
        .filter(|k| !k.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_providers() {
        let toml_str = r#"
default = "anthropic"

[openai]
base_url = "http://localhost:8000"
api_key_env = "LOCAL_LLM_KEY"
"#;
        let config: FileProvidersConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default.as_deref(), Some("anthropic"));
        assert_eq!(config.openai.base_url, "http://localhost:8000");
        assert_eq!(config.openai.api_key_env, "LOCAL_LLM_KEY");
        assert_eq!(config.anthropic, FileAnthropicConfig::default());
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let key = resolve_api_key(Some("sk-explicit"), "MOE_TEST_UNSET_KEY_VAR");
        assert_eq!(key.as_deref(), Some("sk-explicit"));
    }

    #[test]
    fn test_missing_api_key() {
        assert_eq!(resolve_api_key(None, "MOE_TEST_UNSET_KEY_VAR"), None);
        assert_eq!(resolve_api_key(Some("  "), "MOE_TEST_UNSET_KEY_VAR"), None);
    }
}
