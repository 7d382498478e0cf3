//! Vote types for MoE intent voting
//!
//! This module defines the voting primitives: one [`Vote`] per voter per
//! round, the [`Subtask`]s a voter proposes, and the typed [`VoteFailure`]
//! returned when a voter could not produce a vote.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Entities extracted from the utterance (name -> value)
pub type Entities = BTreeMap<String, String>;

/// Priority of a proposed subtask
///
/// Ordered so that `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubtaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl SubtaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtaskPriority::Low => "low",
            SubtaskPriority::Medium => "medium",
            SubtaskPriority::High => "high",
        }
    }

    /// Map a numeric rank (1 = low, 2 = medium, 3 = high)
    pub fn from_rank(rank: i64) -> Option<Self> {
        match rank {
            1 => Some(SubtaskPriority::Low),
            2 => Some(SubtaskPriority::Medium),
            3 => Some(SubtaskPriority::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubtaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SubtaskPriority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "baja" => Ok(SubtaskPriority::Low),
            "medium" | "media" | "normal" => Ok(SubtaskPriority::Medium),
            "high" | "alta" => Ok(SubtaskPriority::High),
            other => other
                .parse::<i64>()
                .ok()
                .and_then(SubtaskPriority::from_rank)
                .ok_or_else(|| DomainError::unknown("priority", s)),
        }
    }
}

/// A unit of work a voter proposes for executing the intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    /// Action name (e.g. "consultar_tiempo", "encender_luz")
    pub action: String,
    #[serde(default)]
    pub priority: SubtaskPriority,
}

impl Subtask {
    pub fn new(action: impl Into<String>, priority: SubtaskPriority) -> Self {
        Self {
            action: action.into(),
            priority,
        }
    }
}

/// A single vote from one LLM voter in one round
///
/// Votes are immutable once produced; the builder methods are used while
/// the voter assembles it.
///
/// # Example
///
/// ```
/// use moe_domain::Vote;
///
/// let vote = Vote::new("llm_a", "consultar_tiempo", 0.9)
///     .with_weight(1.5)
///     .with_entity("ubicacion", "Madrid");
/// assert!(vote.is_valid());
/// assert!((vote.weighted_score() - 1.35).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub vote_id: String,
    /// Participant identifier
    pub llm_id: String,
    /// Participant display name
    pub llm_name: String,
    /// Classified intent
    pub intent: String,
    /// Confidence in the intent (0.0 to 1.0)
    pub confidence: f64,
    /// Participant weight (default 1.0)
    pub llm_weight: f64,
    pub entities: Entities,
    pub subtasks: Vec<Subtask>,
    pub reasoning: String,
    /// Debate round that produced this vote (1-indexed)
    pub round: usize,
    pub processing_time_ms: u64,
}

impl Vote {
    /// Create a vote with default weight 1.0; confidence is clamped to [0, 1]
    pub fn new(llm_id: impl Into<String>, intent: impl Into<String>, confidence: f64) -> Self {
        let llm_id = llm_id.into();
        Self {
            vote_id: format!("vote_{}", llm_id),
            llm_name: llm_id.clone(),
            llm_id,
            intent: intent.into(),
            confidence: confidence.clamp(0.0, 1.0),
            llm_weight: 1.0,
            entities: Entities::new(),
            subtasks: Vec::new(),
            reasoning: String::new(),
            round: 1,
            processing_time_ms: 0,
        }
    }

    pub fn with_vote_id(mut self, vote_id: impl Into<String>) -> Self {
        self.vote_id = vote_id.into();
        self
    }

    pub fn with_name(mut self, llm_name: impl Into<String>) -> Self {
        self.llm_name = llm_name.into();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.llm_weight = weight;
        self
    }

    pub fn with_entity(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entities.insert(key.into(), value.into());
        self
    }

    pub fn with_entities(mut self, entities: Entities) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_subtask(mut self, action: impl Into<String>, priority: SubtaskPriority) -> Self {
        self.subtasks.push(Subtask::new(action, priority));
        self
    }

    pub fn with_subtasks(mut self, subtasks: Vec<Subtask>) -> Self {
        self.subtasks = subtasks;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_round(mut self, round: usize) -> Self {
        self.round = round;
        self
    }

    pub fn with_processing_time(mut self, millis: u64) -> Self {
        self.processing_time_ms = millis;
        self
    }

    /// confidence × weight
    pub fn weighted_score(&self) -> f64 {
        self.confidence * self.llm_weight
    }

    /// A vote takes part in consensus only with a non-empty intent and
    /// finite, non-negative confidence and weight.
    pub fn is_valid(&self) -> bool {
        !self.intent.trim().is_empty()
            && self.confidence.is_finite()
            && self.confidence >= 0.0
            && self.llm_weight.is_finite()
            && self.llm_weight >= 0.0
    }
}

/// Why a voter produced no vote
///
/// Failures are local to the voter: the round continues with the
/// remaining votes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoteFailure {
    #[error("voter {llm_id} timed out after {timeout_ms} ms")]
    Timeout { llm_id: String, timeout_ms: u64 },

    #[error("voter {llm_id} returned malformed output: {reason}")]
    Malformed { llm_id: String, reason: String },

    #[error("voter {llm_id} backend error: {message}")]
    Backend { llm_id: String, message: String },
}

impl VoteFailure {
    pub fn llm_id(&self) -> &str {
        match self {
            VoteFailure::Timeout { llm_id, .. }
            | VoteFailure::Malformed { llm_id, .. }
            | VoteFailure::Backend { llm_id, .. } => llm_id,
        }
    }

    /// Short machine-readable label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            VoteFailure::Timeout { .. } => "timeout",
            VoteFailure::Malformed { .. } => "malformed",
            VoteFailure::Backend { .. } => "backend",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, VoteFailure::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_creation() {
        let vote = Vote::new("llm_a", "ayuda", 0.7);
        assert_eq!(vote.llm_id, "llm_a");
        assert_eq!(vote.llm_name, "llm_a");
        assert_eq!(vote.vote_id, "vote_llm_a");
        assert_eq!(vote.llm_weight, 1.0);
        assert_eq!(vote.round, 1);
        assert!(vote.entities.is_empty());
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(Vote::new("a", "ayuda", 1.7).confidence, 1.0);
        assert_eq!(Vote::new("a", "ayuda", -0.2).confidence, 0.0);
    }

    #[test]
    fn test_validity() {
        assert!(Vote::new("a", "ayuda", 0.5).is_valid());
        assert!(!Vote::new("a", "  ", 0.5).is_valid());
        assert!(!Vote::new("a", "ayuda", f64::NAN).is_valid());
        assert!(!Vote::new("a", "ayuda", 0.5).with_weight(-1.0).is_valid());
    }

    #[test]
    fn test_weighted_score() {
        let vote = Vote::new("a", "ayuda", 0.8).with_weight(2.0);
        assert!((vote.weighted_score() - 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(SubtaskPriority::High > SubtaskPriority::Medium);
        assert!(SubtaskPriority::Medium > SubtaskPriority::Low);
        assert_eq!(SubtaskPriority::default(), SubtaskPriority::Medium);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("HIGH".parse::<SubtaskPriority>().ok(), Some(SubtaskPriority::High));
        assert_eq!("alta".parse::<SubtaskPriority>().ok(), Some(SubtaskPriority::High));
        assert_eq!("media".parse::<SubtaskPriority>().ok(), Some(SubtaskPriority::Medium));
        assert_eq!("1".parse::<SubtaskPriority>().ok(), Some(SubtaskPriority::Low));
        assert!("urgent".parse::<SubtaskPriority>().is_err());
        assert!("7".parse::<SubtaskPriority>().is_err());
    }

    #[test]
    fn test_vote_failure_accessors() {
        let failure = VoteFailure::Timeout {
            llm_id: "llm_b".to_string(),
            timeout_ms: 500,
        };
        assert_eq!(failure.llm_id(), "llm_b");
        assert_eq!(failure.kind(), "timeout");
        assert!(failure.is_timeout());
        assert_eq!(failure.to_string(), "voter llm_b timed out after 500 ms");

        let malformed = VoteFailure::Malformed {
            llm_id: "llm_c".to_string(),
            reason: "no JSON object".to_string(),
        };
        assert_eq!(malformed.kind(), "malformed");
        assert!(!malformed.is_timeout());
    }
}
