//! Hot reload settings from TOML (`[reload]` section)

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileReloadConfig {
    pub enabled: bool,
    /// Seconds between file checks
    pub interval_secs: u64,
}

impl Default for FileReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
        }
    }
}

impl FileReloadConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}
