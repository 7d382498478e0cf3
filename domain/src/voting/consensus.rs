//! Consensus over a set of intent votes
//!
//! [`ConsensusEngine::resolve`] reconciles the votes of one round into a
//! single [`ConsensusResult`]:
//!
//! 1. Invalid votes (empty intent, non-finite confidence) are discarded.
//! 2. Votes are grouped by intent; a group scores the sum of its votes'
//!    [`ConsensusAlgorithm::score`] (`confidence × weight` by default).
//! 3. The highest score wins. Ties go to the group with more votes, then
//!    to the group whose first vote was registered earliest.
//! 4. Entities and subtasks are merged from the winning group only.

use super::vote::{Entities, Subtask, Vote};
use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-9;

/// How the final decision was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusMethod {
    /// Equal weights, several intents
    Majority,
    /// Non-uniform weights, several intents
    Weighted,
    /// Every valid vote named the same intent
    Unanimity,
    /// Voting disabled by configuration; one LLM answered
    SingleLlmMode,
    /// Voting failed and the single-LLM safety net answered
    Fallback,
}

impl ConsensusMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusMethod::Majority => "majority",
            ConsensusMethod::Weighted => "weighted",
            ConsensusMethod::Unanimity => "unanimity",
            ConsensusMethod::SingleLlmMode => "single_llm_mode",
            ConsensusMethod::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ConsensusMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How each vote contributes to its intent's score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusAlgorithm {
    /// `confidence × weight`
    #[default]
    #[serde(alias = "weighted-majority", alias = "weighted_majority")]
    Weighted,
    /// One point per vote
    Plurality,
    /// Confidence only, weights ignored
    #[serde(alias = "confidence-weighted")]
    ConfidenceWeighted,
    /// Weight only, confidence ignored
    #[serde(alias = "borda-count", alias = "borda_count")]
    Borda,
}

impl ConsensusAlgorithm {
    pub fn score(&self, vote: &Vote) -> f64 {
        match self {
            ConsensusAlgorithm::Weighted => vote.weighted_score(),
            ConsensusAlgorithm::Plurality => 1.0,
            ConsensusAlgorithm::ConfidenceWeighted => vote.confidence,
            ConsensusAlgorithm::Borda => vote.llm_weight,
        }
    }

    /// Whether participant weights affect the outcome
    pub fn uses_weights(&self) -> bool {
        matches!(self, ConsensusAlgorithm::Weighted | ConsensusAlgorithm::Borda)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusAlgorithm::Weighted => "weighted",
            ConsensusAlgorithm::Plurality => "plurality",
            ConsensusAlgorithm::ConfidenceWeighted => "confidence_weighted",
            ConsensusAlgorithm::Borda => "borda",
        }
    }
}

impl std::fmt::Display for ConsensusAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How strongly the voters agreed on the winner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgreementLevel {
    /// Winner holds at least two thirds of the valid votes
    High,
    /// Winner holds a plain majority
    Medium,
    /// Winner holds a plurality only
    Low,
    /// No valid votes
    Failed,
}

impl AgreementLevel {
    /// Level for `count` winning votes out of `total` valid votes
    pub fn from_counts(count: usize, total: usize) -> Self {
        if total == 0 || count == 0 {
            AgreementLevel::Failed
        } else if 3 * count >= 2 * total {
            AgreementLevel::High
        } else if 2 * count > total {
            AgreementLevel::Medium
        } else {
            AgreementLevel::Low
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AgreementLevel::Failed)
    }
}

impl std::fmt::Display for AgreementLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgreementLevel::High => write!(f, "HIGH"),
            AgreementLevel::Medium => write!(f, "MEDIUM"),
            AgreementLevel::Low => write!(f, "LOW"),
            AgreementLevel::Failed => write!(f, "FAILED"),
        }
    }
}

/// Final decision for one user request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub final_intent: String,
    /// Always within [0, 1]
    pub consensus_confidence: f64,
    pub final_entities: Entities,
    pub final_subtasks: Vec<Subtask>,
    pub consensus_method: ConsensusMethod,
    pub agreement_level: AgreementLevel,
    /// Valid votes that took part in the decision
    pub participating_votes: usize,
    /// Every vote considered, including discarded ones
    pub total_votes: usize,
    /// Debate rounds that ran (0 for single-LLM decisions)
    pub rounds: usize,
    pub reasoning: String,
}

impl ConsensusResult {
    /// A result with no decision
    pub fn failed(total_votes: usize, reasoning: impl Into<String>) -> Self {
        Self {
            final_intent: String::new(),
            consensus_confidence: 0.0,
            final_entities: Entities::new(),
            final_subtasks: Vec::new(),
            consensus_method: ConsensusMethod::Majority,
            agreement_level: AgreementLevel::Failed,
            participating_votes: 0,
            total_votes,
            rounds: 0,
            reasoning: reasoning.into(),
        }
    }

    /// Decision taken from one LLM answer (single-LLM mode or fallback)
    pub fn from_single_vote(vote: &Vote, method: ConsensusMethod) -> Self {
        Self {
            final_intent: vote.intent.clone(),
            consensus_confidence: vote.confidence.clamp(0.0, 1.0),
            final_entities: vote.entities.clone(),
            final_subtasks: vote.subtasks.clone(),
            consensus_method: method,
            agreement_level: AgreementLevel::High,
            participating_votes: 1,
            total_votes: 1,
            rounds: 0,
            reasoning: format!(
                "Decision by {} ({}): '{}' with confidence {:.2}. {}",
                vote.llm_name,
                method,
                vote.intent,
                vote.confidence,
                vote.reasoning
            )
            .trim_end()
            .to_string(),
        }
    }

    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn is_success(&self) -> bool {
        !self.agreement_level.is_failed() && !self.final_intent.is_empty()
    }

    /// Share of considered votes that took part, in percent
    pub fn participation_rate(&self) -> f64 {
        if self.total_votes == 0 {
            0.0
        } else {
            self.participating_votes as f64 / self.total_votes as f64 * 100.0
        }
    }
}

/// Tunables for [`ConsensusEngine`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusSettings {
    pub algorithm: ConsensusAlgorithm,
    /// Confidence a contested winner must reach before the boost applies
    pub confidence_threshold: f64,
    /// Added to a contested winner's confidence at or above the threshold
    pub confidence_boost: f64,
    /// Union the winning group's entities; otherwise keep those of its
    /// most confident vote
    pub merge_entities: bool,
    /// Dedupe the winning group's subtasks; otherwise keep those of its
    /// most confident vote
    pub consolidate_subtasks: bool,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            algorithm: ConsensusAlgorithm::Weighted,
            confidence_threshold: 0.6,
            confidence_boost: 0.0,
            merge_entities: true,
            consolidate_subtasks: true,
        }
    }
}

struct IntentGroup<'a> {
    intent: &'a str,
    score: f64,
    members: Vec<&'a Vote>,
}

/// Score-based consensus over intent votes
#[derive(Debug, Clone, Default)]
pub struct ConsensusEngine {
    settings: ConsensusSettings,
}

impl ConsensusEngine {
    pub fn new(settings: ConsensusSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ConsensusSettings {
        &self.settings
    }

    /// Resolve a set of votes into one decision. Never panics; an empty or
    /// all-invalid set yields [`AgreementLevel::Failed`].
    pub fn resolve(&self, votes: &[Vote]) -> ConsensusResult {
        let total_votes = votes.len();
        let valid: Vec<&Vote> = votes.iter().filter(|v| v.is_valid()).collect();

        if valid.is_empty() {
            return ConsensusResult::failed(total_votes, "No valid votes to reach consensus");
        }

        let algorithm = self.settings.algorithm;
        let groups = group_by_intent(&valid, algorithm);
        let Some(winner) = pick_winner(&groups) else {
            return ConsensusResult::failed(total_votes, "No valid votes to reach consensus");
        };

        let method = if groups.len() == 1 {
            ConsensusMethod::Unanimity
        } else if !algorithm.uses_weights() || has_uniform_weights(&valid) {
            ConsensusMethod::Majority
        } else {
            ConsensusMethod::Weighted
        };

        let mut confidence = if groups.len() == 1 {
            mean_confidence(&winner.members, algorithm)
        } else {
            let total_score: f64 = groups.iter().map(|g| g.score).sum();
            if total_score > EPSILON {
                winner.score / total_score
            } else {
                0.0
            }
        };
        if groups.len() > 1 && confidence + EPSILON >= self.settings.confidence_threshold {
            confidence += self.settings.confidence_boost;
        }
        let confidence = confidence.clamp(0.0, 1.0);

        let agreement_level = AgreementLevel::from_counts(winner.members.len(), valid.len());

        let top = most_confident(&winner.members);
        let final_entities = match (self.settings.merge_entities, top) {
            (true, _) => merge_entities(&winner.members),
            (false, Some(vote)) => vote.entities.clone(),
            (false, None) => Entities::new(),
        };
        let final_subtasks = match (self.settings.consolidate_subtasks, top) {
            (true, _) => merge_subtasks(&winner.members),
            (false, Some(vote)) => vote.subtasks.clone(),
            (false, None) => Vec::new(),
        };

        ConsensusResult {
            final_intent: winner.intent.to_string(),
            consensus_confidence: confidence,
            final_entities,
            final_subtasks,
            consensus_method: method,
            agreement_level,
            participating_votes: valid.len(),
            total_votes,
            rounds: 1,
            reasoning: describe(winner, &valid, algorithm, method, confidence, total_votes),
        }
    }
}

/// Fraction of valid votes that share the most common intent (by count)
///
/// Used by the debate policy as the provisional agreement after a round.
pub fn plurality_share(votes: &[Vote]) -> f64 {
    let valid: Vec<&Vote> = votes.iter().filter(|v| v.is_valid()).collect();
    if valid.is_empty() {
        return 0.0;
    }
    let groups = group_by_intent(&valid, ConsensusAlgorithm::Plurality);
    let max_count = groups.iter().map(|g| g.members.len()).max().unwrap_or(0);
    max_count as f64 / valid.len() as f64
}

fn group_by_intent<'a>(votes: &[&'a Vote], algorithm: ConsensusAlgorithm) -> Vec<IntentGroup<'a>> {
    let mut groups: Vec<IntentGroup<'a>> = Vec::new();
    for &vote in votes {
        let intent = vote.intent.trim();
        let score = algorithm.score(vote);
        match groups.iter_mut().find(|g| g.intent == intent) {
            Some(group) => {
                group.score += score;
                group.members.push(vote);
            }
            None => groups.push(IntentGroup {
                intent,
                score,
                members: vec![vote],
            }),
        }
    }
    groups
}

/// Groups are in order of first appearance, so keeping the earlier group
/// on a full tie implements the "earliest registered" rule.
fn pick_winner<'a, 'b>(groups: &'b [IntentGroup<'a>]) -> Option<&'b IntentGroup<'a>> {
    let mut best: Option<&IntentGroup<'a>> = None;
    for group in groups {
        best = match best {
            None => Some(group),
            Some(current) => {
                let better = if (group.score - current.score).abs() > EPSILON {
                    group.score > current.score
                } else {
                    group.members.len() > current.members.len()
                };
                if better { Some(group) } else { Some(current) }
            }
        };
    }
    best
}

fn has_uniform_weights(votes: &[&Vote]) -> bool {
    match votes.first() {
        Some(first) => votes
            .iter()
            .all(|v| (v.llm_weight - first.llm_weight).abs() <= EPSILON),
        None => true,
    }
}

/// Mean confidence of a unanimous group, weighted when the algorithm
/// uses weights
fn mean_confidence(votes: &[&Vote], algorithm: ConsensusAlgorithm) -> f64 {
    let weight = |v: &Vote| if algorithm.uses_weights() { v.llm_weight } else { 1.0 };
    let total_weight: f64 = votes.iter().map(|&v| weight(v)).sum();
    if total_weight <= EPSILON {
        return 0.0;
    }
    votes.iter().map(|&v| v.confidence * weight(v)).sum::<f64>() / total_weight
}

/// Earliest on equal confidence
fn most_confident<'a>(votes: &[&'a Vote]) -> Option<&'a Vote> {
    let mut best: Option<&'a Vote> = None;
    for &vote in votes {
        best = match best {
            Some(current) if vote.confidence <= current.confidence + EPSILON => Some(current),
            _ => Some(vote),
        };
    }
    best
}

/// Union of entities; on key collision the most confident vote wins
/// (earliest on equal confidence).
fn merge_entities(votes: &[&Vote]) -> Entities {
    let mut chosen: std::collections::BTreeMap<&str, (&str, f64)> = Default::default();
    for vote in votes {
        for (key, value) in &vote.entities {
            match chosen.get(key.as_str()) {
                Some((_, confidence)) if vote.confidence <= *confidence + EPSILON => {}
                _ => {
                    chosen.insert(key.as_str(), (value.as_str(), vote.confidence));
                }
            }
        }
    }
    chosen
        .into_iter()
        .map(|(k, (v, _))| (k.to_string(), v.to_string()))
        .collect()
}

/// Concatenate subtasks, dedupe by action keeping the highest priority,
/// preserving first appearance order.
fn merge_subtasks(votes: &[&Vote]) -> Vec<Subtask> {
    let mut merged: Vec<Subtask> = Vec::new();
    for subtask in votes.iter().flat_map(|v| v.subtasks.iter()) {
        let action = subtask.action.trim();
        if action.is_empty() {
            continue;
        }
        match merged.iter_mut().find(|s| s.action == action) {
            Some(existing) => existing.priority = existing.priority.max(subtask.priority),
            None => merged.push(Subtask::new(action, subtask.priority)),
        }
    }
    merged
}

fn describe(
    winner: &IntentGroup<'_>,
    valid: &[&Vote],
    algorithm: ConsensusAlgorithm,
    method: ConsensusMethod,
    confidence: f64,
    total_votes: usize,
) -> String {
    let mut text = format!(
        "Consensus on '{}' by {} ({} scoring) with {}/{} valid votes (confidence {:.2}",
        winner.intent,
        method,
        algorithm,
        winner.members.len(),
        valid.len(),
        confidence
    );
    if total_votes > valid.len() {
        text.push_str(&format!(", {} discarded", total_votes - valid.len()));
    }
    text.push_str("). Votes:");
    for vote in valid {
        text.push_str(&format!(
            " {}={} ({:.2}, w{:.1});",
            vote.llm_name, vote.intent, vote.confidence, vote.llm_weight
        ));
    }
    text.pop();
    text
}
