//! Voting configuration from TOML (`[voting]` section)

use moe_domain::{ConsensusAlgorithm, ParticipantConfig, SingleLlmConfig, VotingConfiguration};
use serde::{Deserialize, Serialize};

/// Raw `[voting]` section.
///
/// Participants and the single-LLM model reuse the domain types directly;
/// the remaining keys are flattened into [`VotingConfiguration`] by
/// [`FileVotingConfig::to_voting_configuration`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileVotingConfig {
    pub version: String,
    pub description: String,
    /// Run MoE voting; `false` answers every request with the single LLM
    pub moe_enabled: bool,
    pub max_debate_rounds: usize,
    pub parallel_voting: bool,
    pub consensus_threshold: f64,
    pub timeout_per_vote_ms: u64,
    pub fallback_enabled: bool,
    pub confidence_boost: f64,
    /// `weighted` (default), `plurality`, `confidence_weighted` or `borda`
    pub consensus_algorithm: ConsensusAlgorithm,
    pub minimum_votes: usize,
    pub enable_entity_merging: bool,
    pub enable_subtask_consolidation: bool,
    pub available_actions: Vec<String>,
    /// `[[voting.participants]]` tables, in registration order
    pub participants: Vec<ParticipantConfig>,
    /// `[voting.single_llm]`
    pub single_llm: Option<SingleLlmConfig>,
}

impl Default for FileVotingConfig {
    fn default() -> Self {
        let defaults = VotingConfiguration::default();
        Self {
            version: defaults.version,
            description: defaults.description,
            moe_enabled: defaults.moe_enabled,
            max_debate_rounds: defaults.max_debate_rounds,
            parallel_voting: defaults.parallel_voting,
            consensus_threshold: defaults.consensus_threshold,
            timeout_per_vote_ms: defaults.timeout_per_vote_ms,
            fallback_enabled: defaults.fallback_enabled,
            confidence_boost: defaults.confidence_boost,
            consensus_algorithm: defaults.consensus_algorithm,
            minimum_votes: defaults.minimum_votes,
            enable_entity_merging: defaults.enable_entity_merging,
            enable_subtask_consolidation: defaults.enable_subtask_consolidation,
            available_actions: defaults.available_actions,
            participants: defaults.participants,
            single_llm: defaults.single_llm,
        }
    }
}

impl FileVotingConfig {
    /// Convert to the domain configuration.
    ///
    /// Participants without a display name get their id as name.
    pub fn to_voting_configuration(&self) -> VotingConfiguration {
        let participants = self
            .participants
            .iter()
            .cloned()
            .map(|mut p| {
                if p.name.trim().is_empty() {
                    p.name = p.id.clone();
                }
                p
            })
            .collect();

        VotingConfiguration {
            version: self.version.clone(),
            description: self.description.clone(),
            moe_enabled: self.moe_enabled,
            participants,
            max_debate_rounds: self.max_debate_rounds,
            parallel_voting: self.parallel_voting,
            consensus_threshold: self.consensus_threshold,
            timeout_per_vote_ms: self.timeout_per_vote_ms,
            available_actions: self.available_actions.clone(),
            single_llm: self.single_llm.clone(),
            fallback_enabled: self.fallback_enabled,
            confidence_boost: self.confidence_boost,
            consensus_algorithm: self.consensus_algorithm,
            minimum_votes: self.minimum_votes,
            enable_entity_merging: self.enable_entity_merging,
            enable_subtask_consolidation: self.enable_subtask_consolidation,
        }
    }

    /// Provider names referenced by participants and the single-LLM model
    pub fn referenced_providers(&self) -> impl Iterator<Item = &str> {
        self.participants
            .iter()
            .map(|p| p.provider.as_str())
            .chain(self.single_llm.iter().map(|s| s.provider.as_str()))
    }
}
