//! Periodic configuration hot reload
//!
//! [`ConfigWatcher`] re-reads the configuration sources on an interval and
//! hands every changed, valid configuration to an apply function, usually
//! [`VotingConfigStore::replace`] or the orchestrator's
//! `reload_configuration`. Invalid files are logged and the previous
//! configuration stays active.

use super::loader::{ConfigLoadError, ConfigLoader};
use moe_application::{ConfigRejected, VotingConfigStore};
use moe_domain::{ConfigIssue, VotingConfiguration};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type ApplyFn =
    dyn Fn(VotingConfiguration) -> Result<Vec<ConfigIssue>, ConfigRejected> + Send + Sync;

/// Result of one reload attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ReloadOutcome {
    /// Sources are byte-identical to the last applied load
    Unchanged,
    /// New configuration is active; carries its warnings
    Applied(Vec<ConfigIssue>),
}

pub struct ConfigWatcher {
    config_path: Option<PathBuf>,
    interval: Duration,
    apply: Arc<ApplyFn>,
    last_fingerprint: Mutex<Option<u64>>,
}

impl ConfigWatcher {
    pub fn new<F>(config_path: Option<PathBuf>, interval: Duration, apply: F) -> Self
    where
        F: Fn(VotingConfiguration) -> Result<Vec<ConfigIssue>, ConfigRejected>
            + Send
            + Sync
            + 'static,
    {
        Self {
            config_path,
            interval,
            apply: Arc::new(apply),
            last_fingerprint: Mutex::new(None),
        }
    }

    /// Watcher that swaps configurations into `store`
    pub fn for_store(
        config_path: Option<PathBuf>,
        interval: Duration,
        store: Arc<VotingConfigStore>,
    ) -> Self {
        Self::new(config_path, interval, move |config| store.replace(config))
    }

    /// Treat the current sources as already applied, so the first tick
    /// does not reload what the host loaded at startup.
    pub fn mark_current(&self) -> Result<(), ConfigLoadError> {
        let fingerprint = ConfigLoader::fingerprint(self.config_path.as_deref())?;
        *self.lock_fingerprint() = Some(fingerprint);
        Ok(())
    }

    /// Reload only when the sources changed since the last applied load
    pub fn check(&self) -> Result<ReloadOutcome, ConfigLoadError> {
        let fingerprint = ConfigLoader::fingerprint(self.config_path.as_deref())?;
        if *self.lock_fingerprint() == Some(fingerprint) {
            debug!("Configuration unchanged");
            return Ok(ReloadOutcome::Unchanged);
        }
        self.reload_with(fingerprint)
    }

    /// Reload regardless of whether the sources changed
    pub fn force_reload(&self) -> Result<ReloadOutcome, ConfigLoadError> {
        let fingerprint = ConfigLoader::fingerprint(self.config_path.as_deref())?;
        self.reload_with(fingerprint)
    }

    fn reload_with(&self, fingerprint: u64) -> Result<ReloadOutcome, ConfigLoadError> {
        let (file_config, _) = ConfigLoader::load_validated(self.config_path.as_deref())?;
        let issues = (self.apply)(file_config.to_voting_configuration())?;
        *self.lock_fingerprint() = Some(fingerprint);
        info!("Configuration reloaded ({} warnings)", issues.len());
        Ok(ReloadOutcome::Applied(issues))
    }

    /// Run [`ConfigWatcher::check`] every interval until `cancel` fires.
    ///
    /// Failed reloads are logged; the watcher keeps running.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick completes immediately
            ticker.tick().await;
            info!(
                "Watching configuration every {} s",
                self.interval.as_secs_f64()
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Configuration watcher stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.check() {
                            warn!("Configuration reload failed, keeping previous: {}", e);
                        }
                    }
                }
            }
        })
    }

    fn lock_fingerprint(&self) -> std::sync::MutexGuard<'_, Option<u64>> {
        self.last_fingerprint
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[voting]
version = "1.1"

[[voting.participants]]
id = "a"
provider = "openai"
model = "gpt-4o-mini"

[[voting.participants]]
id = "b"
provider = "openai"
model = "gpt-4o"
"#;

    fn setup(body: &str) -> (tempfile::TempDir, PathBuf, Arc<VotingConfigStore>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moe.toml");
        std::fs::write(&path, body).unwrap();
        let store = Arc::new(VotingConfigStore::new(VotingConfiguration::default()));
        (dir, path, store)
    }

    #[test]
    fn test_check_applies_then_skips_unchanged() {
        let (_dir, path, store) = setup(VALID);
        let watcher =
            ConfigWatcher::for_store(Some(path), Duration::from_secs(1), Arc::clone(&store));

        assert!(matches!(watcher.check().unwrap(), ReloadOutcome::Applied(_)));
        assert_eq!(store.snapshot().version, "1.1");
        assert_eq!(store.reload_count(), 1);

        assert_eq!(watcher.check().unwrap(), ReloadOutcome::Unchanged);
        assert_eq!(store.reload_count(), 1);
    }

    #[test]
    fn test_force_reload_ignores_fingerprint() {
        let (_dir, path, store) = setup(VALID);
        let watcher =
            ConfigWatcher::for_store(Some(path), Duration::from_secs(1), Arc::clone(&store));
        watcher.mark_current().unwrap();

        assert_eq!(watcher.check().unwrap(), ReloadOutcome::Unchanged);
        assert!(matches!(
            watcher.force_reload().unwrap(),
            ReloadOutcome::Applied(_)
        ));
        assert_eq!(store.reload_count(), 1);
    }

    #[test]
    fn test_invalid_file_keeps_previous() {
        let (_dir, path, store) = setup(VALID);
        let watcher = ConfigWatcher::for_store(
            Some(path.clone()),
            Duration::from_secs(1),
            Arc::clone(&store),
        );
        watcher.check().unwrap();

        std::fs::write(&path, "[voting]\nmax_debate_rounds = 0\n").unwrap();
        let err = watcher.check().unwrap_err();
        assert!(matches!(err, ConfigLoadError::Rejected(_)));
        assert_eq!(store.snapshot().version, "1.1");

        // Fixed file is picked up on the next check
        std::fs::write(&path, VALID.replace("1.1", "1.2")).unwrap();
        assert!(matches!(watcher.check().unwrap(), ReloadOutcome::Applied(_)));
        assert_eq!(store.snapshot().version, "1.2");
    }

    #[tokio::test]
    async fn test_spawned_watcher_stops_on_cancel() {
        let (_dir, path, store) = setup(VALID);
        let watcher = Arc::new(ConfigWatcher::for_store(
            Some(path),
            Duration::from_millis(20),
            Arc::clone(&store),
        ));
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&watcher).spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(store.snapshot().version, "1.1");
        assert_eq!(store.reload_count(), 1);
    }
}
