//! Run Voting use case
//!
//! The voting orchestrator: takes one user utterance and returns one
//! decision. It reads a configuration snapshot at request start, then
//! walks the fallback state machine:
//!
//! ```text
//! CheckConfig ─▶ InvokeVoting ─(debate + consensus)─▶ Resolved
//!      │               │ failed
//!      ▼               ▼
//!   SingleLlmMode(disabled | failed) ─▶ Resolved | Failed
//! ```

use crate::config::{ConfigRejected, VotingConfigStore};
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::progress::{NoProgress, VotingProgressNotifier};
use crate::ports::voting_logger::{NoVotingLogger, VotingEvent, VotingLogger};
use crate::use_cases::cast_vote::CastVoteUseCase;
use crate::use_cases::fallback::{FallbackCoordinator, SingleLlmError};
use crate::use_cases::run_debate::DebateController;
use chrono::{DateTime, Utc};
use moe_domain::config::has_errors;
use moe_domain::{
    ConfigIssue, ConsensusAlgorithm, ConsensusEngine, ConsensusResult, ConversationContext, DomainError,
    FallbackEvent, FallbackStage, VotingConfiguration, VotingRound,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Message shown to the user whenever no decision could be reached
pub const USER_FACING_MESSAGE: &str = "could not understand request";

/// Errors that can occur during a voting request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VotingError {
    #[error("Insufficient votes: {valid} valid, {required} required")]
    InsufficientVotes { valid: usize, required: usize },

    #[error("Consensus failed: {0}")]
    ConsensusFailed(String),

    #[error("Single-LLM mode failed: {0}")]
    SingleLlmFailed(SingleLlmError),

    #[error("Voting failed ({voting}) and fallback failed ({fallback})")]
    FallbackFailed {
        voting: Box<VotingError>,
        fallback: SingleLlmError,
    },

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl VotingError {
    /// What the conversation manager may show; never the raw error
    pub fn user_facing_message(&self) -> &'static str {
        USER_FACING_MESSAGE
    }
}

/// Input for the RunVoting use case
#[derive(Debug, Clone)]
pub struct RunVotingInput {
    pub user_message: String,
    pub context: ConversationContext,
    pub history: Vec<String>,
}

impl RunVotingInput {
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            context: ConversationContext::new(),
            history: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: ConversationContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_history(mut self, history: Vec<String>) -> Self {
        self.history = history;
        self
    }
}

/// Snapshot of the orchestrator state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VotingStatistics {
    pub participant_count: usize,
    pub moe_enabled: bool,
    pub active_rounds: usize,
    pub parallel_voting: bool,
    pub max_debate_rounds: usize,
    pub consensus_threshold: f64,
    pub consensus_algorithm: ConsensusAlgorithm,
    pub minimum_votes: usize,
    pub timeout_per_vote_ms: u64,
    pub config_version: String,
    pub last_reload: Option<DateTime<Utc>>,
    pub reload_count: u64,
}

/// Decrements the active round counter when the request ends
struct ActiveRoundGuard {
    counter: Arc<AtomicUsize>,
}

impl ActiveRoundGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for ActiveRoundGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Use case for running MoE voting on one utterance
pub struct RunVotingUseCase<G: LlmGateway + 'static> {
    store: Arc<VotingConfigStore>,
    debate: DebateController<G>,
    fallback: FallbackCoordinator<G>,
    logger: Arc<dyn VotingLogger>,
    active_rounds: Arc<AtomicUsize>,
}

impl<G: LlmGateway + 'static> RunVotingUseCase<G> {
    pub fn new(gateway: Arc<G>, store: Arc<VotingConfigStore>) -> Self {
        Self::with_logger(gateway, store, Arc::new(NoVotingLogger))
    }

    pub fn with_logger(
        gateway: Arc<G>,
        store: Arc<VotingConfigStore>,
        logger: Arc<dyn VotingLogger>,
    ) -> Self {
        let voter = CastVoteUseCase::new(gateway);
        Self {
            store,
            debate: DebateController::new(voter.clone(), Arc::clone(&logger)),
            fallback: FallbackCoordinator::new(voter, Arc::clone(&logger)),
            logger,
            active_rounds: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Execute the use case with default (no-op) progress
    pub async fn execute(&self, input: RunVotingInput) -> Result<ConsensusResult, VotingError> {
        self.execute_with_progress(input, &NoProgress).await
    }

    /// Execute the use case with progress callbacks
    pub async fn execute_with_progress(
        &self,
        input: RunVotingInput,
        progress: &dyn VotingProgressNotifier,
    ) -> Result<ConsensusResult, VotingError> {
        let config = self.store.snapshot();
        let _guard = ActiveRoundGuard::enter(&self.active_rounds);

        let round = VotingRound::new(format!("round_{}", Uuid::new_v4()), input.user_message)
            .with_context(input.context)
            .with_history(input.history);

        info!(
            "Voting request {} (moe_enabled={}, participants={})",
            round.round_id,
            config.moe_enabled,
            config.participants.len()
        );

        let mut stage = FallbackCoordinator::<G>::start(&config)?;
        let mut decision: Option<ConsensusResult> = None;
        let mut voting_error: Option<VotingError> = None;
        let mut single_error: Option<SingleLlmError> = None;

        while !stage.is_terminal() {
            stage = match stage {
                FallbackStage::InvokeVoting => {
                    match self.run_voting(&config, &round, progress).await {
                        Ok(result) => {
                            decision = Some(result);
                            stage.next(FallbackEvent::VotingSucceeded)?
                        }
                        Err(e) => {
                            warn!("Voting failed for {}: {}", round.round_id, e);
                            self.logger.log(VotingEvent::new(
                                "voting_failed",
                                json!({
                                    "round_id": round.round_id,
                                    "error": e.to_string(),
                                    "fallback_enabled": config.fallback_enabled,
                                }),
                            ));
                            voting_error = Some(e);
                            stage.next(FallbackEvent::VotingFailed {
                                fallback_enabled: config.fallback_enabled,
                            })?
                        }
                    }
                }
                FallbackStage::SingleLlmMode(reason) => {
                    progress.on_single_llm(reason);
                    match self.fallback.answer(&config, &round, reason).await {
                        Ok(result) => {
                            decision = Some(result);
                            stage.next(FallbackEvent::SingleLlmSucceeded)?
                        }
                        Err(e) => {
                            single_error = Some(e);
                            stage.next(FallbackEvent::SingleLlmFailed)?
                        }
                    }
                }
                FallbackStage::CheckConfig => {
                    stage.next(FallbackEvent::from_config(config.moe_enabled))?
                }
                FallbackStage::Resolved | FallbackStage::Failed => break,
            };
        }

        match (stage, decision) {
            (FallbackStage::Resolved, Some(result)) => {
                info!(
                    "Decision for {}: {} ({:.2}, {}, {})",
                    round.round_id,
                    result.final_intent,
                    result.consensus_confidence,
                    result.consensus_method,
                    result.agreement_level
                );
                self.log_decision(&round, &result);
                progress.on_decision(&result);
                Ok(result)
            }
            _ => Err(match (voting_error, single_error) {
                (Some(voting), Some(fallback)) => VotingError::FallbackFailed {
                    voting: Box::new(voting),
                    fallback,
                },
                (Some(voting), None) => voting,
                (None, Some(single)) => VotingError::SingleLlmFailed(single),
                (None, None) => VotingError::ConsensusFailed("no decision reached".to_string()),
            }),
        }
    }

    /// Debate followed by consensus on the final round's votes
    async fn run_voting(
        &self,
        config: &VotingConfiguration,
        round: &VotingRound,
        progress: &dyn VotingProgressNotifier,
    ) -> Result<ConsensusResult, VotingError> {
        let outcome = self.debate.run(config, round.clone(), progress).await;

        if outcome.reason.needs_fallback() {
            return Err(VotingError::InsufficientVotes {
                valid: outcome.valid_votes(),
                required: config.debate_policy().min_valid_votes,
            });
        }

        let engine = ConsensusEngine::new(config.consensus_settings());
        let result = engine.resolve(&outcome.final_round.votes);
        if !result.is_success() {
            return Err(VotingError::ConsensusFailed(result.reasoning));
        }
        Ok(result.with_rounds(outcome.rounds_run))
    }

    fn log_decision(&self, round: &VotingRound, result: &ConsensusResult) {
        self.logger.log(VotingEvent::new(
            "consensus",
            json!({
                "round_id": round.round_id,
                "final_intent": result.final_intent,
                "confidence": result.consensus_confidence,
                "method": result.consensus_method.as_str(),
                "agreement_level": result.agreement_level.to_string(),
                "participating_votes": result.participating_votes,
                "total_votes": result.total_votes,
                "rounds": result.rounds,
                "entities": result.final_entities,
                "subtasks": result.final_subtasks,
            }),
        ));
    }

    /// Validate and swap in a new configuration; the old one stays on error
    pub fn reload_configuration(
        &self,
        config: VotingConfiguration,
    ) -> Result<Vec<ConfigIssue>, ConfigRejected> {
        let version = config.version.clone();
        let participants = config.participants.len();
        let issues = self.store.replace(config)?;
        self.logger.log(VotingEvent::new(
            "config_reloaded",
            json!({ "version": version, "participants": participants }),
        ));
        Ok(issues)
    }

    pub fn statistics(&self) -> VotingStatistics {
        let config = self.store.snapshot();
        VotingStatistics {
            participant_count: config.participants.len(),
            moe_enabled: config.moe_enabled,
            active_rounds: self.active_rounds.load(Ordering::SeqCst),
            parallel_voting: config.parallel_voting,
            max_debate_rounds: config.max_debate_rounds,
            consensus_threshold: config.consensus_threshold,
            consensus_algorithm: config.consensus_algorithm,
            minimum_votes: config.minimum_votes,
            timeout_per_vote_ms: config.timeout_per_vote_ms,
            config_version: config.version.clone(),
            last_reload: self.store.last_reload(),
            reload_count: self.store.reload_count(),
        }
    }

    /// Configuration valid and some model can answer in single-LLM mode
    pub fn is_healthy(&self) -> bool {
        let config = self.store.snapshot();
        !has_errors(&config.validate()) && config.single_llm_participant().is_some()
    }

    pub fn configuration(&self) -> Arc<VotingConfiguration> {
        self.store.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::{Script, ScriptedGateway};
    use moe_domain::{
        AgreementLevel, ConsensusMethod, ParticipantConfig, SingleLlmConfig, SingleLlmReason,
        TerminationReason,
    };
    use std::sync::Mutex;

    fn config(models: &[&str]) -> VotingConfiguration {
        VotingConfiguration {
            participants: models
                .iter()
                .map(|m| ParticipantConfig::new(*m, "openai", *m))
                .collect(),
            timeout_per_vote_ms: 1_000,
            ..Default::default()
        }
    }

    fn use_case(
        gateway: &Arc<ScriptedGateway>,
        config: VotingConfiguration,
    ) -> RunVotingUseCase<ScriptedGateway> {
        RunVotingUseCase::new(Arc::clone(gateway), Arc::new(VotingConfigStore::new(config)))
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl VotingProgressNotifier for RecordingProgress {
        fn on_round_start(&self, round_number: usize, participants: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("start:{}:{}", round_number, participants));
        }

        fn on_vote_cast(&self, _round_number: usize, llm_id: &str, success: bool) {
            self.events
                .lock()
                .unwrap()
                .push(format!("vote:{}:{}", llm_id, success));
        }

        fn on_round_complete(&self, round_number: usize, _agreement: f64) {
            self.events.lock().unwrap().push(format!("complete:{}", round_number));
        }

        fn on_debate_end(&self, _rounds: usize, reason: TerminationReason) {
            self.events.lock().unwrap().push(format!("end:{}", reason));
        }

        fn on_single_llm(&self, reason: SingleLlmReason) {
            self.events.lock().unwrap().push(format!("single:{:?}", reason));
        }

        fn on_decision(&self, result: &ConsensusResult) {
            self.events
                .lock()
                .unwrap()
                .push(format!("decision:{}", result.final_intent));
        }
    }

    #[tokio::test]
    async fn test_three_voter_majority() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("a", vec![Script::vote("consultar_tiempo", 0.9)])
                .script("b", vec![Script::vote("consultar_tiempo", 0.8)])
                .script("c", vec![Script::vote("ayuda", 0.6)]),
        );
        let use_case = use_case(&gateway, config(&["a", "b", "c"]));

        let result = use_case
            .execute(RunVotingInput::new("¿qué tiempo hace en Madrid?"))
            .await
            .unwrap();

        assert_eq!(result.final_intent, "consultar_tiempo");
        assert_eq!(result.agreement_level, AgreementLevel::High);
        assert_eq!(result.consensus_method, ConsensusMethod::Majority);
        assert!((result.consensus_confidence - 0.739).abs() < 1e-3);
        assert_eq!(result.rounds, 1);
        assert_eq!(use_case.statistics().active_rounds, 0);
    }

    #[tokio::test]
    async fn test_moe_disabled_makes_exactly_one_call() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("a", vec![Script::vote("ayuda", 0.7)])
                .script("b", vec![Script::vote("saludo", 0.7)]),
        );
        let mut cfg = config(&["a", "b"]);
        cfg.moe_enabled = false;

        let result = use_case(&gateway, cfg)
            .execute(RunVotingInput::new("ayuda"))
            .await
            .unwrap();

        assert_eq!(gateway.total_calls(), 1);
        assert_eq!(result.consensus_method, ConsensusMethod::SingleLlmMode);
        assert_eq!(result.participating_votes, 1);
        assert_eq!(result.final_intent, "ayuda");
    }

    #[tokio::test]
    async fn test_insufficient_votes_fall_back() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("a", vec![Script::Fail("down".into())])
                .script("b", vec![Script::Reply("garbage".into())])
                .script("solo", vec![Script::vote("reproducir_musica", 0.65)]),
        );
        let mut cfg = config(&["a", "b"]);
        cfg.single_llm = Some(SingleLlmConfig {
            provider: "openai".to_string(),
            model: "solo".to_string(),
            ..Default::default()
        });
        let progress = RecordingProgress::default();

        let result = use_case(&gateway, cfg)
            .execute_with_progress(RunVotingInput::new("pon música"), &progress)
            .await
            .unwrap();

        assert_eq!(result.consensus_method, ConsensusMethod::Fallback);
        assert_eq!(result.final_intent, "reproducir_musica");
        let events = progress.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start:1:2",
                "vote:a:false",
                "vote:b:false",
                "complete:1",
                "end:insufficient_votes",
                "single:VotingFailed",
                "decision:reproducir_musica",
            ]
        );
    }

    #[tokio::test]
    async fn test_fallback_disabled_is_hard_failure() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("a", vec![Script::vote("ayuda", 0.9)])
                .script("b", vec![Script::Fail("down".into())]),
        );
        let mut cfg = config(&["a", "b"]);
        cfg.fallback_enabled = false;

        let err = use_case(&gateway, cfg)
            .execute(RunVotingInput::new("ayuda"))
            .await
            .unwrap_err();

        assert_eq!(err, VotingError::InsufficientVotes { valid: 1, required: 2 });
        assert_eq!(err.user_facing_message(), USER_FACING_MESSAGE);
        assert_eq!(gateway.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_minimum_votes_and_algorithm_from_config() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("a", vec![Script::vote("ayuda", 0.3), Script::vote("ayuda", 0.3)])
                .script("b", vec![Script::vote("ayuda", 0.3), Script::vote("ayuda", 0.3)])
                .script("c", vec![Script::vote("saludo", 0.9), Script::Fail("down".into())]),
        );
        let mut cfg = config(&["a", "b", "c"]);
        cfg.consensus_algorithm = ConsensusAlgorithm::Plurality;
        cfg.consensus_threshold = 0.5;

        let orchestrator = use_case(&gateway, cfg.clone());
        let result = orchestrator.execute(RunVotingInput::new("hola")).await.unwrap();
        // Weighted scoring would pick "saludo" (0.9 against 0.6)
        assert_eq!(result.final_intent, "ayuda");
        assert!((result.consensus_confidence - 2.0 / 3.0).abs() < 1e-9);

        cfg.minimum_votes = 3;
        cfg.fallback_enabled = false;
        orchestrator.reload_configuration(cfg).unwrap();
        let err = orchestrator.execute(RunVotingInput::new("hola")).await.unwrap_err();
        assert_eq!(err, VotingError::InsufficientVotes { valid: 2, required: 3 });
    }

    #[tokio::test]
    async fn test_voting_and_fallback_both_fail() {
        let gateway = Arc::new(ScriptedGateway::new());
        let err = use_case(&gateway, config(&["a", "b"]))
            .execute(RunVotingInput::new("ayuda"))
            .await
            .unwrap_err();

        assert!(matches!(err, VotingError::FallbackFailed { .. }));
        // two voters plus one fallback call to the first participant
        assert_eq!(gateway.total_calls(), 3);
        assert_eq!(gateway.calls_for("a"), 2);
    }

    #[tokio::test]
    async fn test_single_llm_failure_when_disabled() {
        let gateway = Arc::new(ScriptedGateway::new());
        let mut cfg = config(&["a"]);
        cfg.moe_enabled = false;

        let err = use_case(&gateway, cfg)
            .execute(RunVotingInput::new("ayuda"))
            .await
            .unwrap_err();
        assert!(matches!(err, VotingError::SingleLlmFailed(_)));
        assert_eq!(gateway.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_reload_and_statistics() {
        let gateway = Arc::new(ScriptedGateway::new());
        let use_case = use_case(&gateway, config(&["a", "b"]));
        assert!(use_case.is_healthy());

        let mut next = config(&["a", "b", "c"]);
        next.version = "2.0".to_string();
        next.max_debate_rounds = 3;
        next.consensus_algorithm = ConsensusAlgorithm::Borda;
        use_case.reload_configuration(next).unwrap();

        let stats = use_case.statistics();
        assert_eq!(stats.participant_count, 3);
        assert_eq!(stats.max_debate_rounds, 3);
        assert_eq!(stats.consensus_algorithm, ConsensusAlgorithm::Borda);
        assert_eq!(stats.minimum_votes, 2);
        assert_eq!(stats.config_version, "2.0");
        assert_eq!(stats.reload_count, 1);
        assert!(stats.last_reload.is_some());

        let mut broken = config(&["a"]);
        broken.timeout_per_vote_ms = 0;
        assert!(use_case.reload_configuration(broken).is_err());
        assert_eq!(use_case.statistics().participant_count, 3);
    }

    #[tokio::test]
    async fn test_unhealthy_without_models() {
        let gateway = Arc::new(ScriptedGateway::new());
        let use_case = use_case(&gateway, VotingConfiguration::default());
        assert!(!use_case.is_healthy());
    }

    #[tokio::test]
    async fn test_context_and_history_reach_the_prompt() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("a", vec![Script::vote("consultar_tiempo", 0.9)])
                .script("b", vec![Script::vote("consultar_tiempo", 0.9)]),
        );
        let mut context = ConversationContext::new();
        context.insert("ubicacion".to_string(), serde_json::json!("Sevilla"));

        use_case(&gateway, config(&["a", "b"]))
            .execute(
                RunVotingInput::new("¿y mañana?")
                    .with_context(context)
                    .with_history(vec!["¿qué tiempo hace?".to_string(), "soleado".to_string()]),
            )
            .await
            .unwrap();

        let prompt = &gateway.prompts_for("a")[0];
        assert!(prompt.contains("- ubicacion: Sevilla"));
        assert!(prompt.contains("¿qué tiempo hace? | soleado"));
    }
}
