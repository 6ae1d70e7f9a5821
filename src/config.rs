use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::sync::MissingParentPolicy;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_settle_delay_ms() -> u64 {
    2000
}

fn default_probe_interval_secs() -> u64 {
    15
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// API root of the audit backend (e.g., "http://10.0.2.2:8000/api")
    pub server_url: Option<String>,
    /// Bearer token for the audit backend
    pub access_token: Option<String>,
    /// Bound on every remote call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Wait after reconnecting before an automatic sync starts
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// How often `watch` probes the server
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    /// What to do with a child whose parent has no remote id yet
    #[serde(default)]
    pub missing_parent: MissingParentPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            access_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            probe_interval_secs: default_probe_interval_secs(),
            missing_parent: MissingParentPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Returns true if sync is configured (has both server_url and access_token)
    pub fn is_configured(&self) -> bool {
        self.server_url.is_some() && self.access_token.is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    /// Copy safe to print: the token is cut to its first characters.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.access_token = self
            .access_token
            .as_ref()
            .map(|t| format!("{}...", t.chars().take(8).collect::<String>()));
        copy
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    /// Sync configuration
    pub sync: SyncConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    sync: Option<SyncConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let default_db_path = Self::default_data_dir().join("fieldsync.db");

        // Start with defaults
        let mut database_path = ConfigValue::new(default_db_path, ConfigSource::Default);
        let mut config_file = None;
        let mut sync = SyncConfig::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(sync_config) = file_config.sync {
                sync = sync_config;
            }
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("FIELDSYNC_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("FIELDSYNC_SERVER_URL") {
            sync.server_url = Some(url);
        }
        if let Ok(token) = std::env::var("FIELDSYNC_ACCESS_TOKEN") {
            sync.access_token = Some(token);
        }

        Ok(Self {
            database_path,
            config_file,
            sync,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/fieldsync/
    /// - macOS: ~/Library/Application Support/fieldsync/
    /// - Windows: %APPDATA%/fieldsync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fieldsync")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/fieldsync/
    /// - macOS: ~/Library/Application Support/fieldsync/
    /// - Windows: %APPDATA%/fieldsync/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fieldsync")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert!(config
            .database_path
            .value
            .to_string_lossy()
            .contains("fieldsync.db"));
        assert_eq!(config.database_path.source, ConfigSource::Default);
        assert!(config.config_file.is_none());
        assert_eq!(config.sync.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.sync.settle_delay(), Duration::from_millis(2000));
        assert_eq!(config.sync.missing_parent, MissingParentPolicy::Fallback);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: /custom/path/db.sqlite").unwrap();
        writeln!(file, "sync:").unwrap();
        writeln!(file, "  server_url: http://localhost:8000/api").unwrap();
        writeln!(file, "  access_token: abc123").unwrap();
        writeln!(file, "  missing_parent: skip").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(
            config.database_path.value,
            PathBuf::from("/custom/path/db.sqlite")
        );
        assert_eq!(config.database_path.source, ConfigSource::File);
        assert_eq!(config.config_file, Some(config_path));
        assert!(config.sync.is_configured());
        assert_eq!(config.sync.missing_parent, MissingParentPolicy::Skip);
        // Unset keys in the sync section keep their defaults
        assert_eq!(config.sync.probe_interval_secs, 15);
    }

    #[test]
    fn test_relative_database_path_resolves_against_config_dir() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: data/field.db").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(
            config.database_path.value,
            temp_dir.path().join("data/field.db")
        );
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: /from/file.db").unwrap();

        std::env::set_var("FIELDSYNC_DATABASE_PATH", "/from/env.db");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.database_path.value, PathBuf::from("/from/env.db"));
        assert_eq!(config.database_path.source, ConfigSource::Environment);

        // Clean up
        std::env::remove_var("FIELDSYNC_DATABASE_PATH");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_redacted_hides_token() {
        let sync = SyncConfig {
            access_token: Some("abcdefghijklmnop".to_string()),
            ..Default::default()
        };
        assert_eq!(sync.redacted().access_token.as_deref(), Some("abcdefgh..."));
    }
}
