//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod logging;
mod providers;
mod reload;
mod voting;

pub use logging::{FileLoggingConfig, LOG_LEVELS};
pub use providers::{FileAnthropicConfig, FileOpenAiConfig, FileProvidersConfig, resolve_api_key};
pub use reload::FileReloadConfig;
pub use voting::FileVotingConfig;

use crate::providers::ProviderKind;
use moe_domain::{ConfigIssue, ConfigIssueCode, VotingConfiguration};
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// MoE voting settings and participants
    pub voting: FileVotingConfig,
    /// LLM provider endpoints and credentials
    pub providers: FileProvidersConfig,
    /// Tracing and voting event log
    pub logging: FileLoggingConfig,
    /// Periodic hot reload
    pub reload: FileReloadConfig,
}

impl FileConfig {
    /// Domain view of the `[voting]` section
    pub fn to_voting_configuration(&self) -> VotingConfiguration {
        self.voting.to_voting_configuration()
    }

    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Checks, in order:
    /// 1. The voting configuration itself (participants, ranges, fallback model)
    /// 2. Provider names the router cannot serve
    /// 3. Enum-like strings (`providers.default`, `logging.level`)
    /// 4. Reload interval
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.to_voting_configuration().validate();

        for provider in self.voting.referenced_providers() {
            if !provider.trim().is_empty() && ProviderKind::parse(provider).is_none() {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::UnknownProvider {
                        provider: provider.to_string(),
                    },
                    format!(
                        "voting: unknown provider '{}', requests go to the default provider",
                        provider
                    ),
                ));
            }
        }

        if let Some(default) = &self.providers.default
            && ProviderKind::parse(default).is_none()
        {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidEnumValue {
                    field: "providers.default".to_string(),
                    value: default.clone(),
                },
                format!(
                    "providers.default: unknown value '{}', falling back to 'openai'",
                    default
                ),
            ));
        }

        if !self.logging.is_valid_level() {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidEnumValue {
                    field: "logging.level".to_string(),
                    value: self.logging.level.clone(),
                },
                format!(
                    "logging.level: unknown value '{}', falling back to 'info'",
                    self.logging.level
                ),
            ));
        }

        if self.reload.enabled && self.reload.interval_secs == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::OutOfRange {
                    field: "reload.interval_secs",
                },
                "reload.interval_secs: must be at least 1, using 1",
            ));
        }

        issues
    }
}
