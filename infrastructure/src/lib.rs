//! Infrastructure layer for intent-moe
//!
//! Adapters for the application ports:
//!
//! - [`config`]: TOML/env loading with figment and periodic hot reload
//! - [`providers`]: OpenAI-compatible and Anthropic HTTP gateways with routing
//! - [`logging`]: `tracing` subscriber setup and the JSONL voting event log
//! - [`bootstrap`]: wires everything into a [`VotingService`]

pub mod bootstrap;
pub mod config;
pub mod logging;
pub mod providers;

pub use bootstrap::VotingService;
pub use config::{
    ConfigLoadError, ConfigLoader, ConfigWatcher, FileConfig, FileLoggingConfig,
    FileProvidersConfig, FileReloadConfig, FileVotingConfig, ReloadOutcome,
};
pub use logging::{JsonlVotingLogger, LoggingError, init_tracing};
pub use providers::{
    ProviderAdapter, ProviderError, ProviderKind, anthropic::AnthropicProvider,
    openai::OpenAiProvider, routing::RoutingGateway,
};
