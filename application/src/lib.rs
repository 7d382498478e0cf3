//! Application layer for intent-moe
//!
//! This crate contains use cases, port definitions, and the hot-swappable
//! configuration store. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{ConfigRejected, VotingConfigStore};
pub use ports::{
    llm_gateway::{GatewayError, LlmGateway, LlmSession},
    progress::{NoProgress, VotingProgressNotifier},
    voting_logger::{NoVotingLogger, VotingEvent, VotingLogger},
};
pub use use_cases::cast_vote::{CastVoteUseCase, VoteRequest};
pub use use_cases::fallback::{FallbackCoordinator, SingleLlmError};
pub use use_cases::run_debate::{DebateController, DebateOutcome};
pub use use_cases::run_voting::{
    RunVotingInput, RunVotingUseCase, USER_FACING_MESSAGE, VotingError, VotingStatistics,
};
