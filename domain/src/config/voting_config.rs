//! Voting configuration (process-wide, hot-reloadable)

use super::validation::{ConfigIssue, ConfigIssueCode};
use crate::core::model::ModelRef;
use crate::voting::consensus::{ConsensusAlgorithm, ConsensusSettings};
use crate::voting::debate::{DebatePolicy, MIN_VALID_VOTES};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Participant id used when the single-LLM model is configured explicitly
pub const SINGLE_LLM_ID: &str = "single_llm";

/// One LLM voter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantConfig {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub model: String,
    /// Role described to the model in the prompt (e.g. "intent classifier")
    pub role: String,
    pub weight: f64,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Overrides the default voting prompt
    pub prompt_template: Option<String>,
}

impl Default for ParticipantConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            provider: String::new(),
            model: String::new(),
            role: "intent classifier".to_string(),
            weight: 1.0,
            temperature: None,
            max_tokens: None,
            prompt_template: None,
        }
    }
}

impl ParticipantConfig {
    pub fn new(id: impl Into<String>, provider: impl Into<String>, model: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            provider: provider.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = Some(template.into());
        self
    }

    pub fn model_ref(&self) -> ModelRef {
        ModelRef {
            provider: self.provider.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    fn validate_into(&self, label: &str, issues: &mut Vec<ConfigIssue>) {
        for (field, value) in [
            ("name", &self.name),
            ("provider", &self.provider),
            ("model", &self.model),
        ] {
            if value.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::EmptyField {
                        participant: label.to_string(),
                        field,
                    },
                    format!("participant '{}' has an empty {}", label, field),
                ));
            }
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::NonPositiveWeight {
                    id: label.to_string(),
                },
                format!(
                    "participant '{}' weight must be greater than 0 (got {})",
                    label, self.weight
                ),
            ));
        }
    }
}

/// Model used when voting is disabled or has failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SingleLlmConfig {
    pub provider: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub prompt_template: Option<String>,
    /// Falls back to the per-vote timeout when unset
    pub timeout_ms: Option<u64>,
}

/// Process-wide voting configuration
///
/// Read-only during a voting round; replaced wholesale on reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfiguration {
    pub version: String,
    pub description: String,
    pub moe_enabled: bool,
    /// Voters in registration order
    pub participants: Vec<ParticipantConfig>,
    pub max_debate_rounds: usize,
    pub parallel_voting: bool,
    pub consensus_threshold: f64,
    pub timeout_per_vote_ms: u64,
    /// Intent/action names offered to voters
    pub available_actions: Vec<String>,
    pub single_llm: Option<SingleLlmConfig>,
    /// Retry a failed vote in single-LLM mode
    pub fallback_enabled: bool,
    pub confidence_boost: f64,
    pub consensus_algorithm: ConsensusAlgorithm,
    /// Valid votes a round needs before consensus is attempted
    pub minimum_votes: usize,
    pub enable_entity_merging: bool,
    pub enable_subtask_consolidation: bool,
}

impl Default for VotingConfiguration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            description: String::new(),
            moe_enabled: true,
            participants: Vec::new(),
            max_debate_rounds: 1,
            parallel_voting: true,
            consensus_threshold: 0.6,
            timeout_per_vote_ms: 30_000,
            available_actions: Vec::new(),
            single_llm: None,
            fallback_enabled: true,
            confidence_boost: 0.0,
            consensus_algorithm: ConsensusAlgorithm::Weighted,
            minimum_votes: MIN_VALID_VOTES,
            enable_entity_merging: true,
            enable_subtask_consolidation: true,
        }
    }
}

impl VotingConfiguration {
    pub fn participant(&self, id: &str) -> Option<&ParticipantConfig> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// The model answering in single-LLM mode, described as a participant
    ///
    /// An explicit `single_llm` section wins; otherwise the first
    /// registered participant is used.
    pub fn single_llm_participant(&self) -> Option<ParticipantConfig> {
        match &self.single_llm {
            Some(single) => Some(ParticipantConfig {
                id: SINGLE_LLM_ID.to_string(),
                name: format!("{}/{}", single.provider, single.model),
                provider: single.provider.clone(),
                model: single.model.clone(),
                temperature: single.temperature,
                max_tokens: single.max_tokens,
                prompt_template: single.prompt_template.clone(),
                ..Default::default()
            }),
            None => self.participants.first().cloned(),
        }
    }

    pub fn single_llm_timeout_ms(&self) -> u64 {
        self.single_llm
            .as_ref()
            .and_then(|s| s.timeout_ms)
            .unwrap_or(self.timeout_per_vote_ms)
    }

    pub fn consensus_settings(&self) -> ConsensusSettings {
        ConsensusSettings {
            algorithm: self.consensus_algorithm,
            confidence_threshold: self.consensus_threshold,
            confidence_boost: self.confidence_boost,
            merge_entities: self.enable_entity_merging,
            consolidate_subtasks: self.enable_subtask_consolidation,
        }
    }

    pub fn debate_policy(&self) -> DebatePolicy {
        DebatePolicy::new(self.max_debate_rounds, self.consensus_threshold)
            .with_min_valid_votes(self.minimum_votes)
    }

    /// Collect every problem in the configuration.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        for participant in &self.participants {
            let id = participant.id.trim();
            if id.is_empty() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::EmptyField {
                        participant: participant.name.clone(),
                        field: "id",
                    },
                    format!("participant '{}' has an empty id", participant.name),
                ));
            } else if !seen.insert(id) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::DuplicateParticipant { id: id.to_string() },
                    format!("participant id '{}' is used more than once", id),
                ));
            }
            participant.validate_into(id, &mut issues);
        }

        if self.max_debate_rounds < 1 {
            issues.push(out_of_range("max_debate_rounds", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.consensus_threshold) {
            issues.push(out_of_range("consensus_threshold", "must be within [0, 1]"));
        }
        if self.timeout_per_vote_ms == 0 {
            issues.push(out_of_range("timeout_per_vote_ms", "must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.confidence_boost) {
            issues.push(out_of_range("confidence_boost", "must be within [0, 1]"));
        }
        if self.minimum_votes < 1 {
            issues.push(out_of_range("minimum_votes", "must be at least 1"));
        }

        match (self.moe_enabled, self.participants.len()) {
            (true, 0) => issues.push(ConfigIssue::error(
                ConfigIssueCode::NoParticipants,
                "MoE voting is enabled but no participants are configured",
            )),
            (false, 0) => issues.push(ConfigIssue::warning(
                ConfigIssueCode::NoParticipants,
                "no participants configured",
            )),
            (true, n) if n < self.minimum_votes => issues.push(ConfigIssue::warning(
                ConfigIssueCode::TooFewParticipants,
                format!(
                    "{} participant(s) but minimum_votes is {}: every vote will fall back to single-LLM mode",
                    n, self.minimum_votes
                ),
            )),
            _ => {}
        }

        if let Some(single) = &self.single_llm {
            if single.provider.trim().is_empty() || single.model.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::EmptyField {
                        participant: SINGLE_LLM_ID.to_string(),
                        field: "model",
                    },
                    "single_llm needs both provider and model",
                ));
            }
            if single.timeout_ms == Some(0) {
                issues.push(out_of_range("single_llm.timeout_ms", "must be greater than 0"));
            }
        } else if self.participants.is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::NoSingleLlmModel,
                "no model available for single-LLM mode",
            ));
        }

        issues
    }
}

fn out_of_range(field: &'static str, rule: &str) -> ConfigIssue {
    ConfigIssue::error(
        ConfigIssueCode::OutOfRange { field },
        format!("{} {}", field, rule),
    )
}
