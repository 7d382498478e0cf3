//! Wiring of the voting service from a loaded [`FileConfig`].
//!
//! The host process loads the configuration once, builds a
//! [`VotingService`] and, when hot reload is enabled, starts its watcher.

use crate::config::{ConfigLoadError, ConfigWatcher, FileConfig};
use crate::logging::JsonlVotingLogger;
use crate::providers::routing::RoutingGateway;
use moe_application::ports::voting_logger::{NoVotingLogger, VotingLogger};
use moe_application::{ConfigRejected, RunVotingUseCase, VotingConfigStore};
use moe_domain::config::has_errors;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct VotingService {
    pub orchestrator: Arc<RunVotingUseCase<RoutingGateway>>,
    pub store: Arc<VotingConfigStore>,
    watcher: Option<Arc<ConfigWatcher>>,
}

impl VotingService {
    /// Build the orchestrator, HTTP gateway, event log and watcher.
    ///
    /// `config_path` is the explicit file the watcher re-reads (project and
    /// global files are always re-read).
    pub fn from_file_config(
        file: &FileConfig,
        config_path: Option<PathBuf>,
    ) -> Result<Self, ConfigLoadError> {
        let issues = file.validate();
        if has_errors(&issues) {
            return Err(ConfigRejected { issues }.into());
        }
        for issue in &issues {
            warn!("Configuration: {}", issue);
        }

        let store = Arc::new(VotingConfigStore::new(file.to_voting_configuration()));
        let gateway = Arc::new(RoutingGateway::from_config(&file.providers));
        let logger: Arc<dyn VotingLogger> = match file
            .logging
            .voting_log
            .as_ref()
            .and_then(JsonlVotingLogger::new)
        {
            Some(jsonl) => {
                info!("Voting events logged to {}", jsonl.path().display());
                Arc::new(jsonl)
            }
            None => Arc::new(NoVotingLogger),
        };

        let orchestrator = Arc::new(RunVotingUseCase::with_logger(
            gateway,
            Arc::clone(&store),
            logger,
        ));

        let watcher = file.reload.enabled.then(|| {
            let target = Arc::clone(&orchestrator);
            let watcher = ConfigWatcher::new(config_path, file.reload.interval(), move |config| {
                target.reload_configuration(config)
            });
            if let Err(e) = watcher.mark_current() {
                warn!("Could not fingerprint configuration sources: {}", e);
            }
            Arc::new(watcher)
        });

        Ok(Self {
            orchestrator,
            store,
            watcher,
        })
    }

    pub fn watcher(&self) -> Option<&Arc<ConfigWatcher>> {
        self.watcher.as_ref()
    }

    /// Spawn the hot reload loop; `None` when reload is disabled
    pub fn start_watcher(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        self.watcher
            .as_ref()
            .map(|watcher| Arc::clone(watcher).spawn(cancel))
    }
}
