//! Debate termination policy
//!
//! After each round the controller asks [`DebatePolicy::evaluate`] whether
//! another round is worth running. Rules are checked in order:
//!
//! 1. Fewer valid votes than the policy's minimum (two by default): stop,
//!    the fallback path takes over.
//! 2. Provisional agreement reached the consensus threshold.
//! 3. The configured number of rounds is exhausted.
//! 4. Stalemate: every voter that voted in both rounds kept its intent.

use super::consensus::plurality_share;
use super::round::VotingRound;
use serde::{Deserialize, Serialize};

/// Default minimum of valid votes for a round to count as a vote
pub const MIN_VALID_VOTES: usize = 2;

/// Why the debate stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    ThresholdReached,
    RoundsExhausted,
    Stalemate,
    InsufficientVotes,
}

impl TerminationReason {
    /// Whether the outcome must go through the fallback path
    pub fn needs_fallback(&self) -> bool {
        matches!(self, TerminationReason::InsufficientVotes)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::ThresholdReached => "threshold_reached",
            TerminationReason::RoundsExhausted => "rounds_exhausted",
            TerminationReason::Stalemate => "stalemate",
            TerminationReason::InsufficientVotes => "insufficient_votes",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebateDecision {
    Continue,
    Terminate(TerminationReason),
}

impl DebateDecision {
    pub fn is_continue(&self) -> bool {
        matches!(self, DebateDecision::Continue)
    }
}

/// Decides whether another debate round is likely to improve consensus
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebatePolicy {
    pub max_rounds: usize,
    pub consensus_threshold: f64,
    pub min_valid_votes: usize,
}

impl DebatePolicy {
    pub fn new(max_rounds: usize, consensus_threshold: f64) -> Self {
        Self {
            max_rounds: max_rounds.max(1),
            consensus_threshold,
            min_valid_votes: MIN_VALID_VOTES,
        }
    }

    /// At least one valid vote is always required
    pub fn with_min_valid_votes(mut self, min_valid_votes: usize) -> Self {
        self.min_valid_votes = min_valid_votes.max(1);
        self
    }

    pub fn evaluate(&self, round: &VotingRound) -> DebateDecision {
        if round.valid_vote_count() < self.min_valid_votes {
            return DebateDecision::Terminate(TerminationReason::InsufficientVotes);
        }
        if plurality_share(&round.votes) + 1e-9 >= self.consensus_threshold {
            return DebateDecision::Terminate(TerminationReason::ThresholdReached);
        }
        if round.round_number >= self.max_rounds {
            return DebateDecision::Terminate(TerminationReason::RoundsExhausted);
        }
        if is_stalemate(round) {
            return DebateDecision::Terminate(TerminationReason::Stalemate);
        }
        DebateDecision::Continue
    }
}

/// No repeat voter changed its intent since the previous round
fn is_stalemate(round: &VotingRound) -> bool {
    if round.is_first() {
        return false;
    }
    let mut compared = 0;
    for vote in round.valid_votes() {
        if let Some(prior) = round.prior_vote_of(&vote.llm_id)
            && prior.is_valid()
        {
            if prior.intent.trim() != vote.intent.trim() {
                return false;
            }
            compared += 1;
        }
    }
    compared > 0
}
