//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Default tracing level; `RUST_LOG` overrides it.
    pub level: String,
    /// Directory for daily-rolling log files (stderr only when unset)
    pub directory: Option<PathBuf>,
    /// File name prefix inside `directory`
    pub file_prefix: String,
    /// ANSI colors on stderr
    pub ansi: bool,
    /// JSONL voting event log path (disabled when unset)
    pub voting_log: Option<PathBuf>,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "intent-moe.log".to_string(),
            ansi: true,
            voting_log: None,
        }
    }
}

impl FileLoggingConfig {
    pub fn is_valid_level(&self) -> bool {
        LOG_LEVELS.contains(&self.level.to_lowercase().as_str())
    }
}
