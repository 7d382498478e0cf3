//! Domain layer for intent-moe
//!
//! This crate contains the core voting logic, entities, and value objects.
//! It has no dependencies on infrastructure concerns and performs no I/O.
//!
//! # Core Concepts
//!
//! ## MoE voting
//!
//! Several LLM "voters" classify the same utterance into an intent with
//! entities and subtasks:
//!
//! - **Vote**: one voter's answer in one round
//! - **VotingRound**: the request plus the votes collected in a round
//! - **ConsensusEngine**: score-based reconciliation of votes (weighted by default)
//! - **DebatePolicy**: whether another round is worth running
//! - **FallbackStage**: the single-LLM safety net
//!
//! ## Configuration
//!
//! [`VotingConfiguration`] is a plain value validated into a list of
//! [`ConfigIssue`]s; loading and hot reload live in the outer layers.

pub mod config;
pub mod core;
pub mod prompt;
pub mod voting;

// Re-export commonly used types
pub use config::{
    ConfigIssue, ConfigIssueCode, ParticipantConfig, Severity, SingleLlmConfig,
    VotingConfiguration,
};
pub use core::{error::DomainError, model::ModelRef};
pub use prompt::{PromptBuilder, VotingPromptTemplate};
pub use voting::{
    AgreementLevel, ConsensusAlgorithm, ConsensusEngine, ConsensusMethod, ConsensusResult,
    ConsensusSettings, ConversationContext, DebateDecision, DebatePolicy, Entities, FallbackEvent,
    FallbackStage, MIN_VALID_VOTES, ParseError, SingleLlmReason, Subtask, SubtaskPriority,
    TerminationReason, Vote, VoteFailure, VotePayload, VotingRound, parse_vote_response,
    plurality_share,
};
