//! Port for structured voting event logging.
//!
//! Defines the [`VotingLogger`] trait for recording voting events (rounds,
//! individual votes, consensus decisions, fallbacks) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures each
//! decision in a machine-readable format (JSONL).

use serde_json::Value;

/// A structured voting event for logging.
///
/// Each event has a type string and a JSON payload containing
/// event-specific fields. The adapter adds the timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct VotingEvent {
    /// Event type identifier (e.g., "round_complete", "vote_failed", "consensus").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl VotingEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging voting events to a structured log.
///
/// `log` is synchronous and non-fallible: logging failures must never
/// disrupt a voting request.
pub trait VotingLogger: Send + Sync {
    /// Record a voting event.
    fn log(&self, event: VotingEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoVotingLogger;

impl VotingLogger for NoVotingLogger {
    fn log(&self, _event: VotingEvent) {}
}
