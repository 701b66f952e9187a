//! Configuration management for Shortpath.

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use shortpath_common::constants::{
    CHALLENGE_ID_ALPHABET, CHALLENGE_ID_LENGTH, CHALLENGE_TTL_SECS, DEFAULT_LISTEN_ADDR,
    DEFAULT_PUBLIC_HOST, DEFAULT_REDIS_URL, DEFAULT_URL_CHECK_TIMEOUT_MS, MAX_PATH_DEPTH,
    MAX_SAVED_ANSWERS, MAX_SEGMENT_LENGTH, RESERVED_PREFIXES,
};

use crate::links::PathRules;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Hostname this service is published under
    #[serde(default = "default_public_host")]
    pub public_host: String,

    /// Directory served under /static
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub links: LinkConfig,

    #[serde(default)]
    pub challenge: ChallengeConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, lost on restart
    #[default]
    Memory,
    Redis,
}

/// Node storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Redis connection URL, used by the redis backend only
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            redis_url: default_redis_url(),
        }
    }
}

/// Path limits and target checking
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    #[serde(default = "default_max_path_depth")]
    pub max_path_depth: usize,

    #[serde(default = "default_max_segment_length")]
    pub max_segment_length: usize,

    #[serde(default = "default_reserved_prefixes")]
    pub reserved_prefixes: Vec<String>,

    /// Liveness check timeout for submitted targets
    #[serde(default = "default_url_check_timeout")]
    pub url_check_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_path_depth: default_max_path_depth(),
            max_segment_length: default_max_segment_length(),
            reserved_prefixes: default_reserved_prefixes(),
            url_check_timeout_ms: default_url_check_timeout(),
        }
    }
}

/// Anti-bot challenge configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeConfig {
    #[serde(default = "default_challenge_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_max_saved_answers")]
    pub max_saved_answers: usize,

    #[serde(default = "default_id_length")]
    pub id_length: usize,

    #[serde(default = "default_alphabet")]
    pub alphabet: String,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_challenge_ttl(),
            max_saved_answers: default_max_saved_answers(),
            id_length: default_id_length(),
            alphabet: default_alphabet(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_public_host() -> String { DEFAULT_PUBLIC_HOST.to_string() }
fn default_static_dir() -> String { "static".to_string() }
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_max_path_depth() -> usize { MAX_PATH_DEPTH }
fn default_max_segment_length() -> usize { MAX_SEGMENT_LENGTH }
fn default_reserved_prefixes() -> Vec<String> { RESERVED_PREFIXES.iter().map(|p| p.to_string()).collect() }
fn default_url_check_timeout() -> u64 { DEFAULT_URL_CHECK_TIMEOUT_MS }
fn default_challenge_ttl() -> u64 { CHALLENGE_TTL_SECS }
fn default_max_saved_answers() -> usize { MAX_SAVED_ANSWERS }
fn default_id_length() -> usize { CHALLENGE_ID_LENGTH }
fn default_alphabet() -> String { CHALLENGE_ID_ALPHABET.to_string() }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            tracing::warn!(config_path, "Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(ref public_host) = args.public_host {
            config.public_host = public_host.clone();
        }
        if let Some(backend) = args.storage {
            config.storage.backend = backend;
        }
        if let Some(ref redis_url) = args.redis_url {
            config.storage.redis_url = redis_url.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the components cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(self.links.max_path_depth > 0, "links.max_path_depth must be positive");
        ensure!(self.links.max_segment_length > 0, "links.max_segment_length must be positive");
        ensure!(self.links.url_check_timeout_ms > 0, "links.url_check_timeout_ms must be positive");
        ensure!(!self.challenge.alphabet.is_empty(), "challenge.alphabet must not be empty");
        ensure!(self.challenge.id_length > 0, "challenge.id_length must be positive");
        ensure!(self.challenge.max_saved_answers > 0, "challenge.max_saved_answers must be positive");
        Ok(())
    }

    pub fn path_rules(&self) -> PathRules {
        PathRules {
            max_depth: self.links.max_path_depth,
            max_segment_length: self.links.max_segment_length,
            reserved_prefixes: self.links.reserved_prefixes.clone(),
        }
    }

    pub fn url_check_timeout(&self) -> Duration {
        Duration::from_millis(self.links.url_check_timeout_ms)
    }

    pub fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.challenge.ttl_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            public_host: default_public_host(),
            static_dir: default_static_dir(),
            storage: StorageConfig::default(),
            links: LinkConfig::default(),
            challenge: ChallengeConfig::default(),
        }
    }
}
