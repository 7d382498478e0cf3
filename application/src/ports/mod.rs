//! Port definitions (interfaces for external adapters)

pub mod llm_gateway;
pub mod progress;
pub mod voting_logger;
