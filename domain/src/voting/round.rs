//! Voting round entity

use super::vote::Vote;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Conversation context passed along with the utterance
///
/// A `BTreeMap` so the prompt renders keys in a stable order.
pub type ConversationContext = BTreeMap<String, serde_json::Value>;

/// One debate round for a single user request (Entity)
///
/// Holds the request data shared by every round and the votes collected
/// in this round. Votes from the previous round are carried forward so
/// the prompt builder can show each voter what the others said.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingRound {
    pub round_id: String,
    pub user_message: String,
    pub conversation_context: ConversationContext,
    pub conversation_history: Vec<String>,
    /// 1-indexed round number
    pub round_number: usize,
    pub votes: Vec<Vote>,
    /// Votes of the round before this one (empty in round 1)
    pub prior_votes: Vec<Vote>,
}

impl VotingRound {
    pub fn new(round_id: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            round_id: round_id.into(),
            user_message: user_message.into(),
            conversation_context: ConversationContext::new(),
            conversation_history: Vec::new(),
            round_number: 1,
            votes: Vec::new(),
            prior_votes: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: ConversationContext) -> Self {
        self.conversation_context = context;
        self
    }

    pub fn with_history(mut self, history: Vec<String>) -> Self {
        self.conversation_history = history;
        self
    }

    /// Deterministic vote id for a participant in this round
    pub fn vote_id_for(&self, llm_id: &str) -> String {
        format!("vote_{}_{}_{}", self.round_id, self.round_number, llm_id)
    }

    /// Record a vote; a second vote from the same participant replaces the first
    pub fn record_vote(&mut self, vote: Vote) {
        if let Some(existing) = self.votes.iter_mut().find(|v| v.llm_id == vote.llm_id) {
            *existing = vote;
        } else {
            self.votes.push(vote);
        }
    }

    pub fn valid_votes(&self) -> impl Iterator<Item = &Vote> {
        self.votes.iter().filter(|v| v.is_valid())
    }

    pub fn valid_vote_count(&self) -> usize {
        self.valid_votes().count()
    }

    /// Previous-round vote of a participant, if any
    pub fn prior_vote_of(&self, llm_id: &str) -> Option<&Vote> {
        self.prior_votes.iter().find(|v| v.llm_id == llm_id)
    }

    /// Successor round: same request, next number, this round's votes as prior
    pub fn next_round(&self) -> VotingRound {
        VotingRound {
            round_id: self.round_id.clone(),
            user_message: self.user_message.clone(),
            conversation_context: self.conversation_context.clone(),
            conversation_history: self.conversation_history.clone(),
            round_number: self.round_number + 1,
            votes: Vec::new(),
            prior_votes: self.votes.clone(),
        }
    }

    pub fn is_first(&self) -> bool {
        self.round_number == 1
    }
}
