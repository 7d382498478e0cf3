//! Progress notification port
//!
//! Defines the interface for reporting progress during a voting request.

use moe_domain::{ConsensusResult, SingleLlmReason, TerminationReason};

/// Callback for progress updates during voting
///
/// Implementations live in the host process and can forward progress
/// wherever they need (logs, websockets, metrics).
pub trait VotingProgressNotifier: Send + Sync {
    /// Called when a debate round starts
    fn on_round_start(&self, round_number: usize, participants: usize);

    /// Called when a voter finishes, successfully or not
    fn on_vote_cast(&self, round_number: usize, llm_id: &str, success: bool);

    /// Called when a round has collected all its votes
    fn on_round_complete(&self, round_number: usize, agreement: f64);

    /// Called when the debate stops
    fn on_debate_end(&self, _rounds: usize, _reason: TerminationReason) {}

    /// Called when the single-LLM path is taken
    fn on_single_llm(&self, _reason: SingleLlmReason) {}

    /// Called with the final decision
    fn on_decision(&self, _result: &ConsensusResult) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl VotingProgressNotifier for NoProgress {
    fn on_round_start(&self, _round_number: usize, _participants: usize) {}
    fn on_vote_cast(&self, _round_number: usize, _llm_id: &str, _success: bool) {}
    fn on_round_complete(&self, _round_number: usize, _agreement: f64) {}
}
