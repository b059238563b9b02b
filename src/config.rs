//! Configuration file parser for ~/.config/quotebox/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings, since they are
//! usually typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::remote::SERVER_CATEGORY;

/// Placeholder echo service standing in for a real quote backend.
pub const DEFAULT_ENDPOINT: &str = "https://jsonplaceholder.typicode.com/posts";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote quote endpoint (GET for the quote set, POST for new quotes).
    pub endpoint: String,

    /// Seconds between background syncs in watch mode. 0 disables polling.
    pub poll_interval_secs: u64,

    /// Per-request timeout for the remote endpoint.
    pub request_timeout_secs: u64,

    /// Maximum number of entries taken from each remote fetch.
    pub remote_limit: usize,

    /// Category label given to quotes that arrive from the server.
    pub server_category: String,

    /// Whether newly added quotes are posted to the endpoint.
    pub publish_new_quotes: bool,

    /// Terminal columns available for a rendered line.
    pub display_width: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            poll_interval_secs: 30,
            request_timeout_secs: 10,
            remote_limit: 5,
            server_category: SERVER_CATEGORY.to_string(),
            publish_new_quotes: true,
            display_width: 100,
        }
    }
}

impl Config {
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "endpoint",
        "poll_interval_secs",
        "request_timeout_secs",
        "remote_limit",
        "server_category",
        "publish_new_quotes",
        "display_width",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Larger than 1 MB → `Err(ConfigError::TooLarge)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            endpoint = %config.endpoint,
            poll_interval_secs = config.poll_interval_secs,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Poll period, or `None` when polling is disabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.remote_limit, 5);
        assert_eq!(config.server_category, "Server");
        assert!(config.publish_new_quotes);
        assert_eq!(config.display_width, 100);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/quotebox_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.poll_interval_secs, 30);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("quotebox_config_test_whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("quotebox_config_test_partial", "poll_interval_secs = 5\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.remote_limit, 5); // default
        assert!(config.publish_new_quotes); // default
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
endpoint = "http://localhost:8080/quotes"
poll_interval_secs = 0
request_timeout_secs = 3
remote_limit = 20
server_category = "Remote"
publish_new_quotes = false
display_width = 60
"#;
        let (dir, path) = write_config("quotebox_config_test_full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.endpoint, "http://localhost:8080/quotes");
        assert_eq!(config.poll_interval(), None);
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.remote_limit, 20);
        assert_eq!(config.server_category, "Remote");
        assert!(!config.publish_new_quotes);
        assert_eq!(config.display_width, 60);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("quotebox_config_test_invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("quotebox_config_test_wrongtype", "remote_limit = \"many\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config(
            "quotebox_config_test_unknown",
            "remote_limit = 2\npoll_intervall_secs = 10\n",
        );
        let config = Config::load(&path).unwrap();
        assert_eq!(config.remote_limit, 2);
        assert_eq!(config.poll_interval_secs, 30);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("quotebox_config_test_too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_timeout_never_zero() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
