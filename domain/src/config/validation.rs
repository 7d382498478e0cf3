//! Configuration validation issues.
//!
//! Validation never fails fast: every problem found is collected as a
//! [`ConfigIssue`] so the caller can log all of them at once. Issues with
//! [`Severity::Error`] make a configuration unusable; warnings are logged
//! and the configuration is still applied.
//!
//! # Examples
//!
//! ```
//! use moe_domain::config::{ParticipantConfig, VotingConfiguration, has_errors};
//!
//! let config = VotingConfiguration {
//!     participants: vec![ParticipantConfig::new("gpt", "openai", "gpt-4o-mini")],
//!     ..Default::default()
//! };
//! let issues = config.validate();
//! assert!(!has_errors(&issues)); // a single voter only warns
//! assert_eq!(issues.len(), 1);
//! ```

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A required participant field is empty.
    EmptyField { participant: String, field: &'static str },
    /// Two participants share the same id.
    DuplicateParticipant { id: String },
    /// Participant weight is zero, negative or not finite.
    NonPositiveWeight { id: String },
    /// A numeric setting is outside its allowed range.
    OutOfRange { field: &'static str },
    /// MoE voting has no participants configured.
    NoParticipants,
    /// Fewer participants than `minimum_votes`: every vote ends in the fallback path.
    TooFewParticipants,
    /// No model is available for single-LLM mode.
    NoSingleLlmModel,
    /// A string setting has an unrecognised value.
    InvalidEnumValue { field: String, value: String },
    /// A provider is referenced but not configured.
    UnknownProvider { provider: String },
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", label, self.message)
    }
}

/// Whether any issue is fatal
pub fn has_errors(issues: &[ConfigIssue]) -> bool {
    issues.iter().any(ConfigIssue::is_error)
}
