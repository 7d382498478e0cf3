//! Configuration file loading for intent-moe
//!
//! This module handles file I/O, merging of configuration from multiple
//! sources and periodic hot reload. The priority order (highest to lowest):
//!
//! 1. `MOE_` environment variables
//! 2. Explicitly given config file
//! 3. Project root: `./moe.toml` or `./.moe.toml`
//! 4. Global: `$XDG_CONFIG_HOME/intent-moe/config.toml`
//! 5. Default values

mod file_config;
mod loader;
mod watcher;

pub use file_config::{
    FileAnthropicConfig, FileConfig, FileLoggingConfig, FileOpenAiConfig, FileProvidersConfig,
    FileReloadConfig, FileVotingConfig, LOG_LEVELS, resolve_api_key,
};
pub use loader::{ConfigLoadError, ConfigLoader};
pub use watcher::{ConfigWatcher, ReloadOutcome};
