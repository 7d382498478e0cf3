//! Fallback state machine
//!
//! ```text
//! CheckConfig ──moe_disabled──▶ SingleLlmMode(VotingDisabled) ──┐
//!      │                                                        │
//!  moe_enabled                                                  ├──▶ Resolved | Failed
//!      ▼                                                        │
//! InvokeVoting ──voting_failed──▶ SingleLlmMode(VotingFailed) ──┘
//!      │
//!      └──voting_succeeded──▶ Resolved
//! ```
//!
//! The single-LLM path runs at most once per request: a failure there is
//! terminal.

use super::consensus::ConsensusMethod;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Why the request is answered by one LLM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleLlmReason {
    /// MoE voting is disabled in the configuration
    VotingDisabled,
    /// Voting ran but produced no usable decision
    VotingFailed,
}

impl SingleLlmReason {
    /// Consensus method reported for a decision taken on this path
    pub fn method(&self) -> ConsensusMethod {
        match self {
            SingleLlmReason::VotingDisabled => ConsensusMethod::SingleLlmMode,
            SingleLlmReason::VotingFailed => ConsensusMethod::Fallback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStage {
    CheckConfig,
    InvokeVoting,
    SingleLlmMode(SingleLlmReason),
    Resolved,
    Failed,
}

impl FallbackStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FallbackStage::Resolved | FallbackStage::Failed)
    }

    pub fn next(self, event: FallbackEvent) -> Result<FallbackStage, DomainError> {
        use FallbackEvent as E;
        use FallbackStage as S;

        match (self, event) {
            (S::CheckConfig, E::MoeDisabled) => {
                Ok(S::SingleLlmMode(SingleLlmReason::VotingDisabled))
            }
            (S::CheckConfig, E::MoeEnabled) => Ok(S::InvokeVoting),
            (S::InvokeVoting, E::VotingSucceeded) => Ok(S::Resolved),
            (S::InvokeVoting, E::VotingFailed { fallback_enabled: true }) => {
                Ok(S::SingleLlmMode(SingleLlmReason::VotingFailed))
            }
            (S::InvokeVoting, E::VotingFailed { fallback_enabled: false }) => Ok(S::Failed),
            (S::SingleLlmMode(_), E::SingleLlmSucceeded) => Ok(S::Resolved),
            (S::SingleLlmMode(_), E::SingleLlmFailed) => Ok(S::Failed),
            (stage, event) => Err(DomainError::InvalidTransition {
                stage: stage.to_string(),
                event: event.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for FallbackStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackStage::CheckConfig => write!(f, "check_config"),
            FallbackStage::InvokeVoting => write!(f, "invoke_voting"),
            FallbackStage::SingleLlmMode(SingleLlmReason::VotingDisabled) => {
                write!(f, "single_llm_mode")
            }
            FallbackStage::SingleLlmMode(SingleLlmReason::VotingFailed) => write!(f, "fallback"),
            FallbackStage::Resolved => write!(f, "resolved"),
            FallbackStage::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackEvent {
    MoeEnabled,
    MoeDisabled,
    VotingSucceeded,
    VotingFailed { fallback_enabled: bool },
    SingleLlmSucceeded,
    SingleLlmFailed,
}

impl FallbackEvent {
    /// Event that leaves [`FallbackStage::CheckConfig`] for a configuration
    pub fn from_config(moe_enabled: bool) -> Self {
        if moe_enabled {
            FallbackEvent::MoeEnabled
        } else {
            FallbackEvent::MoeDisabled
        }
    }
}

impl std::fmt::Display for FallbackEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackEvent::MoeEnabled => write!(f, "moe_enabled"),
            FallbackEvent::MoeDisabled => write!(f, "moe_disabled"),
            FallbackEvent::VotingSucceeded => write!(f, "voting_succeeded"),
            FallbackEvent::VotingFailed { .. } => write!(f, "voting_failed"),
            FallbackEvent::SingleLlmSucceeded => write!(f, "single_llm_succeeded"),
            FallbackEvent::SingleLlmFailed => write!(f, "single_llm_failed"),
        }
    }
}
