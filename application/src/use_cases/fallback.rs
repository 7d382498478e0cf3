//! Fallback coordinator
//!
//! Answers a request with a single LLM, either because MoE voting is
//! disabled or because voting produced no usable decision. The single-LLM
//! call runs once under its own timeout; there are no further retries.

use crate::ports::llm_gateway::LlmGateway;
use crate::ports::voting_logger::{VotingEvent, VotingLogger};
use crate::use_cases::cast_vote::{CastVoteUseCase, VoteRequest};
use moe_domain::{
    ConsensusResult, DomainError, FallbackEvent, FallbackStage, PromptBuilder, SingleLlmReason, VoteFailure,
    VotingConfiguration, VotingRound,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SingleLlmError {
    #[error("no model available for single-LLM mode")]
    NoModel,

    #[error(transparent)]
    Vote(#[from] VoteFailure),
}

pub struct FallbackCoordinator<G: LlmGateway + 'static> {
    voter: CastVoteUseCase<G>,
    logger: Arc<dyn VotingLogger>,
}

impl<G: LlmGateway + 'static> FallbackCoordinator<G> {
    pub fn new(voter: CastVoteUseCase<G>, logger: Arc<dyn VotingLogger>) -> Self {
        Self { voter, logger }
    }

    /// First stage after reading the configuration
    pub fn start(config: &VotingConfiguration) -> Result<FallbackStage, DomainError> {
        FallbackStage::CheckConfig.next(FallbackEvent::from_config(config.moe_enabled))
    }

    /// One single-LLM call for `round`'s request.
    ///
    /// The decision's method is `single_llm_mode` or `fallback` depending
    /// on `reason`.
    pub async fn answer(
        &self,
        config: &VotingConfiguration,
        round: &VotingRound,
        reason: SingleLlmReason,
    ) -> Result<ConsensusResult, SingleLlmError> {
        let participant = config.single_llm_participant().ok_or(SingleLlmError::NoModel)?;
        let timeout_ms = config.single_llm_timeout_ms();

        info!(
            "Single-LLM mode ({:?}) with {}",
            reason,
            participant.model_ref()
        );

        let builder = PromptBuilder::new(config.available_actions.clone());
        let request = VoteRequest {
            prompt: builder.build(&participant, round),
            vote_id: round.vote_id_for(&participant.id),
            round: round.round_number,
            timeout: Duration::from_millis(timeout_ms),
            participant,
        };

        let method = reason.method();
        match self.voter.execute(request).await {
            Ok(vote) => {
                let result = ConsensusResult::from_single_vote(&vote, method);
                self.logger.log(VotingEvent::new(
                    "single_llm",
                    json!({
                        "round_id": round.round_id,
                        "method": method.as_str(),
                        "llm_id": vote.llm_id,
                        "intent": vote.intent,
                        "confidence": vote.confidence,
                    }),
                ));
                Ok(result)
            }
            Err(failure) => {
                warn!("Single-LLM call failed: {}", failure);
                self.logger.log(VotingEvent::new(
                    "single_llm_failed",
                    json!({
                        "round_id": round.round_id,
                        "method": method.as_str(),
                        "kind": failure.kind(),
                        "error": failure.to_string(),
                    }),
                ));
                Err(SingleLlmError::Vote(failure))
            }
        }
    }
}
