//! MoE voting domain
//!
//! Several LLM voters classify the same utterance independently; their
//! votes are reconciled into one decision.
//!
//! # Flow
//!
//! ```text
//! VotingRound (round 1)
//!     │  one Vote per participant
//!     ▼
//! DebatePolicy ──continue──▶ VotingRound::next_round() ──▶ ...
//!     │ terminate
//!     ▼
//! ConsensusEngine::resolve ──▶ ConsensusResult
//!     │ failed / insufficient votes
//!     ▼
//! FallbackStage (single-LLM safety net)
//! ```

pub mod consensus;
pub mod debate;
pub mod fallback;
pub mod parsing;
pub mod round;
pub mod vote;

pub use consensus::{
    AgreementLevel, ConsensusAlgorithm, ConsensusEngine, ConsensusMethod, ConsensusResult,
    ConsensusSettings, plurality_share,
};
pub use debate::{DebateDecision, DebatePolicy, MIN_VALID_VOTES, TerminationReason};
pub use fallback::{FallbackEvent, FallbackStage, SingleLlmReason};
pub use parsing::{ParseError, VotePayload, parse_vote_response};
pub use round::{ConversationContext, VotingRound};
pub use vote::{Entities, Subtask, SubtaskPriority, Vote, VoteFailure};
