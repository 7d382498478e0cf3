//! Voting configuration for the domain layer
//!
//! The configuration is a plain value: loading it from files and swapping
//! it at runtime happen in the outer layers.

mod validation;
mod voting_config;

pub use validation::{ConfigIssue, ConfigIssueCode, Severity, has_errors};
pub use voting_config::{ParticipantConfig, SINGLE_LLM_ID, SingleLlmConfig, VotingConfiguration};
