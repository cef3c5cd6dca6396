//! config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! One TOML file configures the pipeline: where the remote version store
//! lives, which branch is the default target, and how persistent the
//! transient-failure retries are.
//!
//! # Locations
//!
//! Resolved in order:
//! 1. An explicit path passed to [`Config::load`]
//! 2. `$ATELIER_CONFIG` if set
//!
//! The store token may be supplied in the file or overridden with
//! `$ATELIER_TOKEN`; the environment wins so deployments can keep
//! secrets out of files.
//!
//! # Example
//!
//! ```no_run
//! use atelier::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("store: {}", config.store.base_url);
//! println!("default branch: {}", config.defaults.branch);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "ATELIER_CONFIG";

/// Environment variable overriding the store token.
pub const TOKEN_ENV: &str = "ATELIER_TOKEN";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file: pass a path or set {CONFIG_PATH_ENV}")]
    NoConfigFile,

    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },
}

/// Remote version store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// API base URL (e.g. `https://git.example.com/api/v1`).
    pub base_url: String,
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Bearer token; `$ATELIER_TOKEN` overrides.
    #[serde(default)]
    pub token: Option<String>,
}

/// Default targets for requests that omit them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Defaults {
    /// Branch used when a request names none.
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            branch: default_branch(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}

/// Retry pacing for transient store failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt of an idempotent call.
    #[serde(default = "default_max_transient_retries")]
    pub max_transient_retries: u32,
    /// Delay before the first retry, in milliseconds; doubles per attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_transient_retries: default_max_transient_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

fn default_max_transient_retries() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    200
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Remote version store settings.
    pub store: StoreConfig,
    /// Default targets.
    #[serde(default)]
    pub defaults: Defaults,
    /// Retry pacing.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration from an explicit path or `$ATELIER_CONFIG`.
    ///
    /// Applies the `$ATELIER_TOKEN` override after parsing.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NoConfigFile`] when neither source names a file
    /// - [`ConfigError::ReadError`] / [`ConfigError::ParseError`] for
    ///   unreadable or malformed files
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::var(CONFIG_PATH_ENV)
                .map(PathBuf::from)
                .map_err(|_| ConfigError::NoConfigFile)?,
        };

        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::ReadError {
            path: path.clone(),
            source,
        })?;
        let mut config: Config = toml::from_str(&raw).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                config.store.token = Some(token);
            }
        }
        Ok(config)
    }

    /// Build the retry policy the store adapter should use.
    pub fn retry_policy(&self) -> crate::store::RetryPolicy {
        crate::store::RetryPolicy {
            max_retries: self.retry.max_transient_retries,
            base_delay: std::time::Duration::from_millis(self.retry.backoff_base_ms),
        }
    }
}
