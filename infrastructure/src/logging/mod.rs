//! Logging infrastructure.
//!
//! - [`init_tracing`] installs the process-wide `tracing` subscriber
//! - [`JsonlVotingLogger`] writes voting events as JSONL through the
//!   [`VotingLogger`](moe_application::VotingLogger) port

mod jsonl_logger;
mod subscriber;

pub use jsonl_logger::JsonlVotingLogger;
pub use subscriber::{LoggingError, init_tracing};
