//! Application configuration: defaults, optional `config.toml`, environment overrides

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::controller::{SessionSettings, SupervisorSettings, MAX_BATCH_SIZE};

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "SPOTIFY_CONTINUOUS_CONFIG";
pub const CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "SPOTIFY_CLIENT_SECRET";
pub const REDIRECT_URI_ENV: &str = "SPOTIFY_REDIRECT_URI";

const PLACEHOLDER_CLIENT_ID: &str = "YOUR_CLIENT_ID";
const PLACEHOLDER_CLIENT_SECRET: &str = "YOUR_CLIENT_SECRET";

/// Largest page the Spotify catalog endpoints hand out
const MAX_PAGE_SIZE: u32 = 50;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0} is not set (use {1} or config.toml)")]
    Missing(&'static str, &'static str),

    #[error("{0} still holds the placeholder value, set your real Spotify app credentials")]
    Placeholder(&'static str),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Root configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Where rspotify keeps the OAuth token between runs
    pub token_cache_path: PathBuf,
    pub supervisor: SupervisorConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub poll_interval_secs: u64,
    pub error_backoff_secs: u64,
    pub max_consecutive_errors: u32,
    pub batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub result_limit: u32,
    pub album_page_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:8888/callback".to_string(),
            token_cache_path: PathBuf::from(".cache/spotify_token.json"),
            supervisor: SupervisorConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            error_backoff_secs: 60,
            max_consecutive_errors: 5,
            batch_size: MAX_BATCH_SIZE,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            result_limit: 10,
            album_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl AppConfig {
    /// Build the configuration from file and environment, then validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let path = explicit.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if explicit.is_some() || path.exists() {
            Self::from_file(&path)?
        } else {
            tracing::debug!("No config file found, using defaults");
            Self::default()
        };

        config.apply_env(|key| env::var(key).ok());
        config.validate()?;
        tracing::info!(
            redirect_uri = %config.redirect_uri,
            poll_interval_secs = config.supervisor.poll_interval_secs,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Override credentials with non-empty values from `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());
        if let Some(id) = value(CLIENT_ID_ENV) {
            self.client_id = id;
        }
        if let Some(secret) = value(CLIENT_SECRET_ENV) {
            self.client_secret = secret;
        }
        if let Some(uri) = value(REDIRECT_URI_ENV) {
            self.redirect_uri = uri;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("client_id", CLIENT_ID_ENV));
        }
        if self.client_id == PLACEHOLDER_CLIENT_ID {
            return Err(ConfigError::Placeholder("client_id"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ConfigError::Missing("client_secret", CLIENT_SECRET_ENV));
        }
        if self.client_secret == PLACEHOLDER_CLIENT_SECRET {
            return Err(ConfigError::Placeholder("client_secret"));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(ConfigError::Missing("redirect_uri", REDIRECT_URI_ENV));
        }

        let supervisor = &self.supervisor;
        if supervisor.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("supervisor.poll_interval_secs must be at least 1".into()));
        }
        if supervisor.batch_size == 0 || supervisor.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::Invalid(format!(
                "supervisor.batch_size must be between 1 and {}",
                MAX_BATCH_SIZE
            )));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.search.result_limit) {
            return Err(ConfigError::Invalid(format!(
                "search.result_limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.search.album_page_size) {
            return Err(ConfigError::Invalid(format!(
                "search.album_page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }

    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            poll_interval: Duration::from_secs(self.supervisor.poll_interval_secs),
            error_backoff: Duration::from_secs(self.supervisor.error_backoff_secs),
            max_consecutive_errors: self.supervisor.max_consecutive_errors,
            batch_size: self.supervisor.batch_size,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            search_limit: self.search.result_limit,
            album_page_size: self.search.album_page_size,
            supervisor: self.supervisor_settings(),
        }
    }
}
