//! Debate controller
//!
//! Runs voting rounds until the [`DebatePolicy`] says stop. Within a round
//! every participant votes once, either concurrently (`JoinSet`) or one
//! after another in registration order. Each call has its own timeout, so
//! a slow voter only loses its own vote.

use crate::ports::llm_gateway::LlmGateway;
use crate::ports::progress::VotingProgressNotifier;
use crate::ports::voting_logger::{VotingEvent, VotingLogger};
use crate::use_cases::cast_vote::{CastVoteUseCase, VoteRequest};
use moe_domain::{
    DebateDecision, ParticipantConfig, PromptBuilder, TerminationReason, Vote, VoteFailure,
    VotingConfiguration, VotingRound, plurality_share,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Result of a finished debate
#[derive(Debug, Clone)]
pub struct DebateOutcome {
    /// The last round that ran; its votes feed the consensus engine
    pub final_round: VotingRound,
    pub rounds_run: usize,
    pub reason: TerminationReason,
    /// Voter failures across all rounds
    pub failures: Vec<VoteFailure>,
}

impl DebateOutcome {
    pub fn valid_votes(&self) -> usize {
        self.final_round.valid_vote_count()
    }
}

pub struct DebateController<G: LlmGateway + 'static> {
    voter: CastVoteUseCase<G>,
    logger: Arc<dyn VotingLogger>,
}

impl<G: LlmGateway + 'static> DebateController<G> {
    pub fn new(voter: CastVoteUseCase<G>, logger: Arc<dyn VotingLogger>) -> Self {
        Self { voter, logger }
    }

    /// Run rounds starting from `first_round` until the policy terminates.
    pub async fn run(
        &self,
        config: &VotingConfiguration,
        first_round: VotingRound,
        progress: &dyn VotingProgressNotifier,
    ) -> DebateOutcome {
        let policy = config.debate_policy();
        let builder = PromptBuilder::new(config.available_actions.clone());
        let timeout = Duration::from_millis(config.timeout_per_vote_ms);
        let mut failures = Vec::new();
        let mut round = first_round;

        loop {
            info!(
                "Voting round {} of {} with {} participants",
                round.round_number,
                policy.max_rounds,
                config.participants.len()
            );
            progress.on_round_start(round.round_number, config.participants.len());

            let requests = self.requests_for(config, &builder, &round, timeout);
            let results = if config.parallel_voting {
                self.collect_parallel(requests).await
            } else {
                self.collect_sequential(requests).await
            };

            for result in results {
                match result {
                    Ok(vote) => {
                        progress.on_vote_cast(round.round_number, &vote.llm_id, true);
                        self.log_vote(&round, &vote);
                        round.record_vote(vote);
                    }
                    Err(failure) => {
                        progress.on_vote_cast(round.round_number, failure.llm_id(), false);
                        self.log_failure(&round, &failure);
                        failures.push(failure);
                    }
                }
            }

            let agreement = plurality_share(&round.votes);
            progress.on_round_complete(round.round_number, agreement);
            self.logger.log(VotingEvent::new(
                "round_complete",
                json!({
                    "round_id": round.round_id,
                    "round": round.round_number,
                    "valid_votes": round.valid_vote_count(),
                    "agreement": agreement,
                }),
            ));
            debug!(
                "Round {} agreement {:.2} ({} valid votes)",
                round.round_number,
                agreement,
                round.valid_vote_count()
            );

            match policy.evaluate(&round) {
                DebateDecision::Continue => {
                    round = round.next_round();
                }
                DebateDecision::Terminate(reason) => {
                    info!(
                        "Debate finished after {} round(s): {}",
                        round.round_number, reason
                    );
                    progress.on_debate_end(round.round_number, reason);
                    self.logger.log(VotingEvent::new(
                        "debate_end",
                        json!({
                            "round_id": round.round_id,
                            "rounds": round.round_number,
                            "reason": reason.as_str(),
                        }),
                    ));
                    return DebateOutcome {
                        rounds_run: round.round_number,
                        final_round: round,
                        reason,
                        failures,
                    };
                }
            }
        }
    }

    fn requests_for(
        &self,
        config: &VotingConfiguration,
        builder: &PromptBuilder,
        round: &VotingRound,
        timeout: Duration,
    ) -> Vec<VoteRequest> {
        config
            .participants
            .iter()
            .map(|participant: &ParticipantConfig| VoteRequest {
                participant: participant.clone(),
                prompt: builder.build(participant, round),
                vote_id: round.vote_id_for(&participant.id),
                round: round.round_number,
                timeout,
            })
            .collect()
    }

    /// All voters concurrently; results keep registration order
    async fn collect_parallel(&self, requests: Vec<VoteRequest>) -> Vec<Result<Vote, VoteFailure>> {
        let ids: Vec<String> = requests.iter().map(|r| r.participant.id.clone()).collect();
        let mut slots: Vec<Option<Result<Vote, VoteFailure>>> = vec![None; requests.len()];
        let mut join_set = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            let voter = self.voter.clone();
            join_set.spawn(async move { (index, voter.execute(request).await) });
        }

        let mut join_errors = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => {
                    warn!("Voter task join error: {}", e);
                    join_errors.push(e.to_string());
                }
            }
        }

        // A task that panicked or was cancelled never filled its slot
        let mut join_errors = join_errors.into_iter();
        slots
            .into_iter()
            .zip(ids)
            .map(|(slot, llm_id)| {
                slot.unwrap_or_else(|| {
                    Err(VoteFailure::Backend {
                        llm_id,
                        message: join_errors
                            .next()
                            .unwrap_or_else(|| "voter task did not finish".to_string()),
                    })
                })
            })
            .collect()
    }

    async fn collect_sequential(&self, requests: Vec<VoteRequest>) -> Vec<Result<Vote, VoteFailure>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.voter.execute(request).await);
        }
        results
    }

    fn log_vote(&self, round: &VotingRound, vote: &Vote) {
        self.logger.log(VotingEvent::new(
            "vote_cast",
            json!({
                "round_id": round.round_id,
                "round": round.round_number,
                "llm_id": vote.llm_id,
                "intent": vote.intent,
                "confidence": vote.confidence,
                "weight": vote.llm_weight,
                "processing_time_ms": vote.processing_time_ms,
            }),
        ));
    }

    fn log_failure(&self, round: &VotingRound, failure: &VoteFailure) {
        self.logger.log(VotingEvent::new(
            "vote_failed",
            json!({
                "round_id": round.round_id,
                "round": round.round_number,
                "llm_id": failure.llm_id(),
                "kind": failure.kind(),
                "error": failure.to_string(),
            }),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::progress::NoProgress;
    use crate::ports::voting_logger::NoVotingLogger;
    use crate::use_cases::test_support::{Script, ScriptedGateway};
    use std::sync::Mutex;

    fn config(models: &[&str], max_rounds: usize, threshold: f64) -> VotingConfiguration {
        VotingConfiguration {
            participants: models
                .iter()
                .map(|m| ParticipantConfig::new(*m, "openai", *m))
                .collect(),
            max_debate_rounds: max_rounds,
            consensus_threshold: threshold,
            timeout_per_vote_ms: 1_000,
            ..Default::default()
        }
    }

    fn controller(gateway: &Arc<ScriptedGateway>) -> DebateController<ScriptedGateway> {
        DebateController::new(
            CastVoteUseCase::new(Arc::clone(gateway)),
            Arc::new(NoVotingLogger),
        )
    }

    struct RecordingLogger(Mutex<Vec<&'static str>>);

    impl VotingLogger for RecordingLogger {
        fn log(&self, event: VotingEvent) {
            self.0.lock().unwrap().push(event.event_type);
        }
    }

    #[tokio::test]
    async fn test_single_round_when_threshold_reached() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("a", vec![Script::vote("ayuda", 0.9)])
                .script("b", vec![Script::vote("ayuda", 0.8)])
                .script("c", vec![Script::vote("saludo", 0.7)]),
        );
        let outcome = controller(&gateway)
            .run(&config(&["a", "b", "c"], 3, 0.6), VotingRound::new("r", "hola"), &NoProgress)
            .await;

        assert_eq!(outcome.rounds_run, 1);
        assert_eq!(outcome.reason, TerminationReason::ThresholdReached);
        assert_eq!(outcome.valid_votes(), 3);
        let ids: Vec<_> = outcome.final_round.votes.iter().map(|v| v.llm_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_debate_continues_and_embeds_prior_votes() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("a", vec![Script::vote("ayuda", 0.9), Script::vote("ayuda", 0.9)])
                .script("b", vec![Script::vote("saludo", 0.8), Script::vote("ayuda", 0.7)]),
        );
        let outcome = controller(&gateway)
            .run(&config(&["a", "b"], 3, 0.9), VotingRound::new("r", "hola"), &NoProgress)
            .await;

        assert_eq!(outcome.rounds_run, 2);
        assert_eq!(outcome.reason, TerminationReason::ThresholdReached);
        let prompts = gateway.prompts_for("b");
        assert_eq!(prompts.len(), 2);
        assert!(!prompts[0].contains("Previous round"));
        assert!(prompts[1].contains("- a: ayuda"));
    }

    #[tokio::test]
    async fn test_no_voter_called_more_than_max_rounds() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("a", vec![Script::vote("ayuda", 0.9); 5])
                .script("b", vec![Script::vote("saludo", 0.9), Script::vote("despedida", 0.9), Script::vote("ayuda", 0.9)])
                .script("c", vec![Script::vote("despedida", 0.9), Script::vote("saludo", 0.9), Script::vote("saludo", 0.9)]),
        );
        let outcome = controller(&gateway)
            .run(&config(&["a", "b", "c"], 2, 0.9), VotingRound::new("r", "hola"), &NoProgress)
            .await;

        assert_eq!(outcome.rounds_run, 2);
        assert_eq!(outcome.reason, TerminationReason::RoundsExhausted);
        for model in ["a", "b", "c"] {
            assert!(gateway.calls_for(model) <= 2);
        }
    }

    #[tokio::test]
    async fn test_stalemate_stops_early() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("a", vec![Script::vote("ayuda", 0.9); 5])
                .script("b", vec![Script::vote("saludo", 0.9); 5]),
        );
        let outcome = controller(&gateway)
            .run(&config(&["a", "b"], 5, 0.9), VotingRound::new("r", "hola"), &NoProgress)
            .await;

        assert_eq!(outcome.rounds_run, 2);
        assert_eq!(outcome.reason, TerminationReason::Stalemate);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_isolated() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("a", vec![Script::vote("ayuda", 0.9)])
                .script("b", vec![Script::Hang])
                .script("c", vec![Script::Reply("not json".into())])
                .script("d", vec![Script::vote("ayuda", 0.6)]),
        );
        let outcome = controller(&gateway)
            .run(&config(&["a", "b", "c", "d"], 1, 0.6), VotingRound::new("r", "hola"), &NoProgress)
            .await;

        assert_eq!(outcome.valid_votes(), 2);
        assert_eq!(outcome.failures.len(), 2);
        assert!(outcome.failures.iter().any(|f| f.is_timeout() && f.llm_id() == "b"));
        assert!(outcome.failures.iter().any(|f| f.kind() == "malformed" && f.llm_id() == "c"));
    }

    #[tokio::test]
    async fn test_insufficient_votes() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("a", vec![Script::vote("ayuda", 0.9)])
                .script("b", vec![Script::Fail("down".into())]),
        );
        let outcome = controller(&gateway)
            .run(&config(&["a", "b"], 3, 0.6), VotingRound::new("r", "hola"), &NoProgress)
            .await;

        assert_eq!(outcome.reason, TerminationReason::InsufficientVotes);
        assert!(outcome.reason.needs_fallback());
    }

    #[tokio::test]
    async fn test_sequential_voting_keeps_order_and_logs() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("a", vec![Script::vote("ayuda", 0.9)])
                .script("b", vec![Script::vote("ayuda", 0.8)]),
        );
        let logger = Arc::new(RecordingLogger(Mutex::new(Vec::new())));
        let controller = DebateController::new(
            CastVoteUseCase::new(Arc::clone(&gateway)),
            Arc::clone(&logger) as Arc<dyn VotingLogger>,
        );
        let mut cfg = config(&["a", "b"], 1, 0.6);
        cfg.parallel_voting = false;

        let outcome = controller.run(&cfg, VotingRound::new("r", "hola"), &NoProgress).await;
        assert_eq!(outcome.final_round.votes[0].llm_id, "a");
        assert_eq!(outcome.final_round.votes[1].llm_id, "b");
        assert_eq!(
            *logger.0.lock().unwrap(),
            vec!["vote_cast", "vote_cast", "round_complete", "debate_end"]
        );
    }

    #[tokio::test]
    async fn test_panicking_voter_is_recorded_as_failure() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("a", vec![Script::Panic])
                .script("b", vec![Script::vote("ayuda", 0.9)])
                .script("c", vec![Script::vote("ayuda", 0.8)]),
        );
        let logger = Arc::new(RecordingLogger(Mutex::new(Vec::new())));
        let controller = DebateController::new(
            CastVoteUseCase::new(Arc::clone(&gateway)),
            Arc::clone(&logger) as Arc<dyn VotingLogger>,
        );

        let outcome = controller
            .run(&config(&["a", "b", "c"], 1, 0.6), VotingRound::new("r", "hola"), &NoProgress)
            .await;

        assert_eq!(outcome.valid_votes(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].llm_id(), "a");
        assert_eq!(outcome.failures[0].kind(), "backend");
        assert_eq!(
            *logger.0.lock().unwrap(),
            vec!["vote_failed", "vote_cast", "vote_cast", "round_complete", "debate_end"]
        );
    }
}
