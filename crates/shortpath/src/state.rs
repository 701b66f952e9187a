//! Application state and shared resources.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::challenge::{ChallengeCache, ChallengeGenerator, OsEntropy};
use crate::config::AppConfig;
use crate::links::{PathRules, UrlChecker};
use crate::storage::{self, NodeStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Node storage backend
    pub store: Arc<dyn NodeStore>,

    pub path_rules: Arc<PathRules>,

    /// Liveness checker for submitted targets
    pub url_checker: Arc<UrlChecker>,

    /// Pending anti-bot challenges
    pub challenges: Arc<ChallengeCache>,
}

impl AppState {
    /// Create new application state, connecting the configured storage backend
    pub async fn new(config: AppConfig) -> Result<Self> {
        let store = storage::connect(&config.storage).await?;
        Self::with_store(config, store)
    }

    /// Build the state around an existing store
    pub fn with_store(config: AppConfig, store: Arc<dyn NodeStore>) -> Result<Self> {
        let url_checker = UrlChecker::new(&config.public_host, config.url_check_timeout())
            .context("Failed to build HTTP client for URL checks")?;

        let generator = ChallengeGenerator::new(
            Box::new(OsEntropy),
            &config.challenge.alphabet,
            config.challenge.id_length,
        );
        let challenges = ChallengeCache::new(
            generator,
            config.challenge_ttl(),
            config.challenge.max_saved_answers,
        );

        Ok(Self {
            path_rules: Arc::new(config.path_rules()),
            config: Arc::new(config),
            store,
            url_checker: Arc::new(url_checker),
            challenges: Arc::new(challenges),
        })
    }
}
