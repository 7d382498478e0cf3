//! Cast Vote use case
//!
//! One voter: asks a single LLM to classify the utterance and turns the
//! completion into a [`Vote`]. Every failure comes back as a typed
//! [`VoteFailure`]; nothing here aborts the round.

use crate::ports::llm_gateway::{GatewayError, LlmGateway};
use moe_domain::{ParticipantConfig, Vote, VoteFailure, VotingPromptTemplate, parse_vote_response};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Everything a voter needs for one call
#[derive(Debug, Clone)]
pub struct VoteRequest {
    pub participant: ParticipantConfig,
    pub prompt: String,
    pub vote_id: String,
    pub round: usize,
    pub timeout: Duration,
}

/// Use case for casting one vote
pub struct CastVoteUseCase<G: LlmGateway + 'static> {
    gateway: Arc<G>,
}

impl<G: LlmGateway + 'static> Clone for CastVoteUseCase<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
        }
    }
}

impl<G: LlmGateway + 'static> CastVoteUseCase<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Ask the participant's model and parse its vote.
    ///
    /// The timeout covers session creation and the completion; on expiry
    /// the in-flight call is dropped.
    pub async fn execute(&self, request: VoteRequest) -> Result<Vote, VoteFailure> {
        let participant = &request.participant;
        let llm_id = participant.id.clone();
        let model = participant.model_ref();
        let started = Instant::now();

        debug!("Voter {} ({}) round {}", llm_id, model, request.round);

        let system_prompt = VotingPromptTemplate::system(&participant.role);
        let call = async {
            let session = self
                .gateway
                .create_session_with_system_prompt(&model, &system_prompt)
                .await?;
            session.send(&request.prompt).await
        };

        let timeout_ms = request.timeout.as_millis() as u64;
        let raw = match tokio::time::timeout(request.timeout, call).await {
            Ok(Ok(text)) => text,
            Ok(Err(GatewayError::Timeout)) | Err(_) => {
                warn!("Voter {} timed out after {} ms", llm_id, timeout_ms);
                return Err(VoteFailure::Timeout { llm_id, timeout_ms });
            }
            Ok(Err(e)) => {
                warn!("Voter {} backend error: {}", llm_id, e);
                return Err(VoteFailure::Backend {
                    llm_id,
                    message: e.to_string(),
                });
            }
        };

        let payload = parse_vote_response(&raw).map_err(|e| {
            warn!("Voter {} returned malformed output: {}", llm_id, e);
            VoteFailure::Malformed {
                llm_id: llm_id.clone(),
                reason: e.to_string(),
            }
        })?;

        let vote = payload
            .into_vote(llm_id.clone())
            .with_vote_id(request.vote_id)
            .with_name(participant.name.clone())
            .with_weight(participant.weight)
            .with_round(request.round)
            .with_processing_time(started.elapsed().as_millis() as u64);

        debug!(
            "Voter {} voted {} ({:.2})",
            llm_id, vote.intent, vote.confidence
        );
        Ok(vote)
    }
}
