//! Runtime configuration
//!
//! All empirical constants of the matching and grouping pipelines live
//! here rather than being hard-coded at their use sites: confidence
//! thresholds, the genre boost, similarity cutoffs, consensus quorum and
//! cache TTL are tuning knobs, not invariants.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::services::matching_engine::MatchingConfig;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// TMDB API key; without it the bundled client refuses to search.
    pub tmdb_api_key: Option<String>,

    /// TTL for series-level search cache entries.
    pub search_cache_ttl: Duration,

    /// Cleaned-title similarity required to join a title cluster.
    pub title_similarity_threshold: f64,

    /// Quorum for the consensus grouping strategy.
    pub min_consensus: usize,

    /// Matching pipeline thresholds.
    pub matching: MatchingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            search_cache_ttl: Duration::from_secs(24 * 60 * 60),
            title_similarity_threshold: 0.75,
            min_consensus: 2,
            matching: MatchingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// calibrated defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let search_cache_ttl = match env::var("SEARCH_CACHE_TTL_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse().context("Invalid SEARCH_CACHE_TTL_SECS")?,
            ),
            Err(_) => defaults.search_cache_ttl,
        };

        let title_similarity_threshold = match env::var("TITLE_SIMILARITY_THRESHOLD") {
            Ok(raw) => raw.parse().context("Invalid TITLE_SIMILARITY_THRESHOLD")?,
            Err(_) => defaults.title_similarity_threshold,
        };

        let min_consensus = match env::var("MIN_CONSENSUS") {
            Ok(raw) => raw.parse().context("Invalid MIN_CONSENSUS")?,
            Err(_) => defaults.min_consensus,
        };

        let matching = MatchingConfig {
            high_confidence: env_f64("HIGH_CONFIDENCE_THRESHOLD", defaults.matching.high_confidence)?,
            medium_confidence: env_f64(
                "MEDIUM_CONFIDENCE_THRESHOLD",
                defaults.matching.medium_confidence,
            )?,
            low_confidence: env_f64("LOW_CONFIDENCE_THRESHOLD", defaults.matching.low_confidence)?,
            genre_boost: env_f64("GENRE_BOOST", defaults.matching.genre_boost)?,
        };
        matching
            .validate()
            .context("Invalid confidence threshold configuration")?;

        Ok(Self {
            tmdb_api_key: env::var("TMDB_API_KEY").ok(),
            search_cache_ttl,
            title_similarity_threshold,
            min_consensus,
            matching,
        })
    }
}

fn env_f64(name: &str, default: f64) -> Result<f64> {
    match env::var(name) {
        Ok(raw) => raw.parse().with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}
