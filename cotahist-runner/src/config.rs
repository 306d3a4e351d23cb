//! Feed configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration pointing at the public endpoints.

use cotahist_core::data::origin::{OriginOptions, DEFAULT_ORIGIN_URL};
use cotahist_core::data::yahoo::{YahooOptions, DEFAULT_YAHOO_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Worker threads used when the config does not say otherwise.
pub const DEFAULT_WORKERS: usize = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration: `[origin]`, `[secondary]` and `[pool]` tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    pub origin: OriginConfig,
    pub secondary: SecondaryConfig,
    pub pool: PoolConfig,
}

/// Exchange origin of the daily bulk files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OriginConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Skip TLS certificate verification for the origin only.
    pub accept_invalid_certs: bool,
    pub user_agent: Option<String>,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ORIGIN_URL.to_string(),
            timeout_secs: 30,
            accept_invalid_certs: false,
            user_agent: None,
        }
    }
}

/// Secondary adjusted-close source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecondaryConfig {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Appended to exchange codes to form the secondary symbol.
    pub symbol_suffix: String,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_YAHOO_URL.to_string(),
            timeout_secs: 30,
            symbol_suffix: ".SA".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

impl FeedConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.workers == 0 {
            return Err(ConfigError::Invalid("pool.workers must be at least 1".into()));
        }
        if self.origin.timeout_secs == 0 {
            return Err(ConfigError::Invalid("origin.timeout_secs must be positive".into()));
        }
        if self.secondary.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "secondary.timeout_secs must be positive".into(),
            ));
        }
        if self.origin.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("origin.base_url is empty".into()));
        }
        if self.secondary.enabled && self.secondary.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("secondary.base_url is empty".into()));
        }
        Ok(())
    }

    pub fn origin_options(&self) -> OriginOptions {
        let defaults = OriginOptions::default();
        OriginOptions {
            base_url: self.origin.base_url.clone(),
            timeout: Duration::from_secs(self.origin.timeout_secs),
            user_agent: self.origin.user_agent.clone().unwrap_or(defaults.user_agent),
            accept_invalid_certs: self.origin.accept_invalid_certs,
        }
    }

    pub fn yahoo_options(&self) -> YahooOptions {
        YahooOptions {
            base_url: self.secondary.base_url.clone(),
            timeout: Duration::from_secs(self.secondary.timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = FeedConfig::from_toml("").unwrap();
        assert_eq!(config, FeedConfig::default());
        assert_eq!(config.pool.workers, 5);
        assert_eq!(config.origin.timeout_secs, 30);
        assert_eq!(config.secondary.symbol_suffix, ".SA");
        assert!(!config.origin.accept_invalid_certs);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = FeedConfig::from_toml(
            r#"
            [origin]
            timeout_secs = 10
            accept_invalid_certs = true

            [pool]
            workers = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.origin.timeout_secs, 10);
        assert!(config.origin.accept_invalid_certs);
        assert_eq!(config.origin.base_url, DEFAULT_ORIGIN_URL);
        assert_eq!(config.pool.workers, 8);
        assert!(config.secondary.enabled);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = FeedConfig::from_toml("[pool]\nworkers = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = FeedConfig::from_toml("[secondary]\ntimeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_key_is_a_parse_error() {
        let err = FeedConfig::from_toml("[pool]\nthreads = 4\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[secondary]\nenabled = false").unwrap();
        let config = FeedConfig::from_file(file.path()).unwrap();
        assert!(!config.secondary.enabled);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FeedConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn options_carry_timeouts() {
        let config = FeedConfig::from_toml("[origin]\ntimeout_secs = 7\n").unwrap();
        let origin = config.origin_options();
        assert_eq!(origin.timeout, Duration::from_secs(7));
        assert!(origin.user_agent.starts_with("cotahist/"));
        assert_eq!(config.yahoo_options().timeout, Duration::from_secs(30));
    }
}
