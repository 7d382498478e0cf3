//! Prompt domain
//!
//! Templates and the per-participant prompt builder used by voters.

mod voting;

pub use voting::{PromptBuilder, VotingPromptTemplate};
