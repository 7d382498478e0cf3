//! Hot-swappable voting configuration.
//!
//! [`VotingConfigStore`] holds the active [`VotingConfiguration`] behind an
//! `RwLock<Arc<_>>`. A request clones the `Arc` once at its start and keeps
//! that snapshot for its whole lifetime, so a concurrent reload never shows
//! it a partial update.

use chrono::{DateTime, Utc};
use moe_domain::config::has_errors;
use moe_domain::{ConfigIssue, VotingConfiguration};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{info, warn};

/// A configuration that failed validation; the previous one stays active.
#[derive(Error, Debug, Clone)]
#[error("configuration rejected: {}", summarize(.issues))]
pub struct ConfigRejected {
    pub issues: Vec<ConfigIssue>,
}

fn summarize(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .filter(|i| i.is_error())
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct VotingConfigStore {
    current: RwLock<Arc<VotingConfiguration>>,
    reload_count: AtomicU64,
    last_reload: RwLock<Option<DateTime<Utc>>>,
}

impl VotingConfigStore {
    /// Wrap an initial configuration. It is not validated here; callers
    /// load it through [`VotingConfigStore::replace`] when they need that.
    pub fn new(config: VotingConfiguration) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
            reload_count: AtomicU64::new(0),
            last_reload: RwLock::new(None),
        }
    }

    /// The active configuration
    pub fn snapshot(&self) -> Arc<VotingConfiguration> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Validate and atomically swap in a new configuration.
    ///
    /// Returns the (warning-only) issues on success.
    pub fn replace(&self, config: VotingConfiguration) -> Result<Vec<ConfigIssue>, ConfigRejected> {
        let issues = config.validate();
        if has_errors(&issues) {
            for issue in issues.iter().filter(|i| i.is_error()) {
                warn!("Rejected voting configuration: {}", issue.message);
            }
            return Err(ConfigRejected { issues });
        }

        for issue in &issues {
            warn!("Voting configuration: {}", issue);
        }

        let version = config.version.clone();
        let participants = config.participants.len();
        {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *guard = Arc::new(config);
        }
        *self.last_reload.write().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        self.reload_count.fetch_add(1, Ordering::Relaxed);

        info!(
            "Voting configuration {} applied ({} participants)",
            version, participants
        );
        Ok(issues)
    }

    pub fn reload_count(&self) -> u64 {
        self.reload_count.load(Ordering::Relaxed)
    }

    pub fn last_reload(&self) -> Option<DateTime<Utc>> {
        *self.last_reload.read().unwrap_or_else(PoisonError::into_inner)
    }
}
