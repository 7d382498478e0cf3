//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Invalid fallback transition: {event} while in {stage}")]
    InvalidTransition { stage: String, event: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl DomainError {
    pub(crate) fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        DomainError::UnknownValue {
            kind,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_value_display() {
        let error = DomainError::unknown("priority", "urgent");
        assert_eq!(error.to_string(), "Unknown priority: urgent");
    }

    #[test]
    fn test_invalid_transition_display() {
        let error = DomainError::InvalidTransition {
            stage: "resolved".to_string(),
            event: "voting_failed".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid fallback transition: voting_failed while in resolved"
        );
    }
}
