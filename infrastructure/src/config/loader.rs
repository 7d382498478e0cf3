//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use moe_application::ConfigRejected;
use moe_domain::ConfigIssue;
use moe_domain::config::has_errors;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR: &str = "intent-moe";
const PROJECT_FILES: [&str; 2] = ["moe.toml", ".moe.toml"];
const ENV_PREFIX: &str = "MOE_";

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error(transparent)]
    Rejected(#[from] ConfigRejected),
}

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `MOE_` environment variables (`__` separates nested keys,
    ///    e.g. `MOE_VOTING__MOE_ENABLED=false`)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./moe.toml` or `./.moe.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/intent-moe/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, ConfigLoadError> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));
        for path in Self::sources(config_path)? {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract().map_err(|e| ConfigLoadError::Extract(Box::new(e)))
    }

    /// Load and validate; error-level issues reject the whole file.
    ///
    /// Returns the configuration with its remaining warnings.
    pub fn load_validated(
        config_path: Option<&Path>,
    ) -> Result<(FileConfig, Vec<ConfigIssue>), ConfigLoadError> {
        let config = Self::load(config_path)?;
        let issues = config.validate();
        if has_errors(&issues) {
            return Err(ConfigRejected { issues }.into());
        }
        Ok((config, issues))
    }

    /// Load only default configuration
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Existing config files in merge order (lowest priority first)
    pub fn sources(config_path: Option<&Path>) -> Result<Vec<PathBuf>, ConfigLoadError> {
        let mut sources = Vec::new();

        if let Some(global) = Self::global_config_path()
            && global.exists()
        {
            sources.push(global);
        }
        if let Some(project) = Self::project_config_path() {
            sources.push(project);
        }
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigLoadError::NotFound(path.to_path_buf()));
            }
            sources.push(path.to_path_buf());
        }

        Ok(sources)
    }

    /// Hash of every source file's path and content.
    ///
    /// Unchanged files give the same fingerprint, so a reload can be skipped.
    pub fn fingerprint(config_path: Option<&Path>) -> Result<u64, ConfigLoadError> {
        let mut hasher = DefaultHasher::new();
        for path in Self::sources(config_path)? {
            let bytes = std::fs::read(&path).map_err(|source| ConfigLoadError::Read {
                path: path.clone(),
                source,
            })?;
            path.hash(&mut hasher);
            bytes.hash(&mut hasher);
        }
        Ok(hasher.finish())
    }

    /// Get the global config file path
    ///
    /// Returns XDG_CONFIG_HOME/intent-moe/config.toml if set,
    /// otherwise the platform config directory.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("voting.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    const TWO_VOTERS: &str = r#"
[voting]
max_debate_rounds = 3

[[voting.participants]]
id = "a"
provider = "openai"
model = "gpt-4o-mini"

[[voting.participants]]
id = "b"
provider = "anthropic"
model = "claude-3-5-haiku-latest"
"#;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert!(config.voting.participants.is_empty());
        assert!(config.voting.moe_enabled);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        // Should return a path (even if file doesn't exist)
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("intent-moe"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, TWO_VOTERS);

        let config = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(config.voting.max_debate_rounds, 3);
        assert_eq!(config.voting.participants.len(), 2);
        // Untouched sections keep their defaults
        assert_eq!(config.voting.timeout_per_vote_ms, 30_000);
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = ConfigLoader::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigLoadError::NotFound(_)));
    }

    #[test]
    fn test_load_validated_rejects_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[voting]\nconsensus_threshold = 1.5\n");

        let err = ConfigLoader::load_validated(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Rejected(_)));
    }

    #[test]
    fn test_load_validated_accepts_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, TWO_VOTERS);

        let (config, issues) = ConfigLoader::load_validated(Some(&path)).unwrap();
        assert_eq!(config.to_voting_configuration().participants.len(), 2);
        assert!(issues.iter().all(|i| !i.is_error()));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, TWO_VOTERS);

        let first = ConfigLoader::fingerprint(Some(&path)).unwrap();
        assert_eq!(first, ConfigLoader::fingerprint(Some(&path)).unwrap());

        write_config(&dir, "[voting]\nmoe_enabled = false\n");
        assert_ne!(first, ConfigLoader::fingerprint(Some(&path)).unwrap());
    }
}
