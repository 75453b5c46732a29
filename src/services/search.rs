//! Cache-aside metadata search, keyed at series level
//!
//! Wraps an external metadata client so that every episode of one release
//! resolves through a single cached search entry: external call volume is
//! proportional to the number of distinct series, not the number of files.
//!
//! `search` never raises. Provider failures are logged, counted and
//! degraded to an empty candidate list.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cache::{CacheAdapter, CacheType, KeyValueStore};
use super::query::{Language, NormalizedQuery};
use super::text_utils;

/// TMDB genre id for Animation, used by the matching engine's genre boost.
pub const ANIMATION_GENRE_ID: i32 = 16;

/// Kind of catalog record a candidate refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Tv,
    Movie,
    #[serde(other)]
    Other,
}

/// One metadata record returned by the external catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataCandidate {
    pub id: i32,
    pub title: String,
    pub media_type: MediaType,
    /// `YYYY-MM-DD`, when the provider knows it.
    pub release_date: Option<String>,
    pub popularity: f64,
    pub genre_ids: Vec<i32>,
}

impl MetadataCandidate {
    /// Release year parsed from the release date prefix.
    pub fn year(&self) -> Option<i32> {
        self.release_date
            .as_ref()
            .and_then(|d| d.split('-').next().and_then(|y| y.parse().ok()))
    }

    pub fn is_animation(&self) -> bool {
        self.genre_ids.contains(&ANIMATION_GENRE_ID)
    }
}

/// External metadata catalog client. Failures are treated as zero
/// candidates by the search service.
#[async_trait]
pub trait MetadataSearchClient: Send + Sync {
    async fn search(&self, title: &str) -> anyhow::Result<Vec<MetadataCandidate>>;
}

/// Cached payload stored under one series key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSearchEntry {
    pub results: Vec<MetadataCandidate>,
    pub language: Language,
}

/// Best-effort observability counters. Concurrent increments may interleave;
/// these are never control data.
#[derive(Debug, Default)]
pub struct SearchStats {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    api_calls: AtomicU64,
    api_errors: AtomicU64,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub api_calls: u64,
    pub api_errors: u64,
}

impl SearchStats {
    pub fn snapshot(&self) -> SearchStatsSnapshot {
        SearchStatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            api_calls: self.api_calls.load(Ordering::Relaxed),
            api_errors: self.api_errors.load(Ordering::Relaxed),
        }
    }
}

/// Episode/season markers stripped when deriving a series-level key.
/// Order matters: the specific patterns run before the bare trailing number.
static SERIES_KEY_STRIP: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\bS\d{1,2}\s*E\d{1,3}\b").unwrap(),
        Regex::new(r"(?i)\b\d{1,2}x\d{2,3}\b").unwrap(),
        Regex::new(r"(?i)\bSeason\s*\d{1,2}\b").unwrap(),
        Regex::new(r"(?i)\bEpisode\s*\d{1,3}\b").unwrap(),
        Regex::new(r"\s*-\s*\d{1,3}\s*$").unwrap(),
    ]
});

/// Derive the series-level cache key for a title: strip episode/season
/// markers and bracketed tags, collapse separators, lowercase.
///
/// `series_key("Title S01E01") == series_key("Title S01E02") ==
/// series_key("Title")`.
pub fn series_key(title: &str) -> String {
    let mut stripped = text_utils::strip_bracketed(title);
    for pattern in SERIES_KEY_STRIP.iter() {
        stripped = pattern.replace_all(&stripped, " ").to_string();
    }
    text_utils::normalize_title(&stripped)
}

/// Cache-aside search front over the external catalog.
pub struct SearchService<C: MetadataSearchClient, S: KeyValueStore> {
    client: C,
    cache: CacheAdapter<S>,
    ttl: Duration,
    stats: SearchStats,
}

impl<C: MetadataSearchClient, S: KeyValueStore> SearchService<C, S> {
    pub fn new(client: C, cache: CacheAdapter<S>, ttl: Duration) -> Self {
        Self {
            client,
            cache,
            ttl,
            stats: SearchStats::default(),
        }
    }

    /// Search the catalog for a query, series-level cached.
    ///
    /// Returns an empty list on any failure. The cache write happens only
    /// after the provider call completes, so a cancelled search leaves the
    /// cache untouched rather than partially written.
    pub async fn search(&self, query: &NormalizedQuery) -> Vec<MetadataCandidate> {
        let key = series_key(&query.title);
        if key.is_empty() {
            return Vec::new();
        }

        if let Some(entry) =
            self.cache
                .get::<CachedSearchEntry>(&key, CacheType::Search, query.language)
        {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, count = entry.results.len(), "Series search cache hit");
            return entry.results;
        }
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        match self.client.search(&query.title).await {
            Ok(results) => {
                self.stats.api_calls.fetch_add(1, Ordering::Relaxed);
                let entry = CachedSearchEntry {
                    results,
                    language: query.language,
                };
                self.cache
                    .set(&key, &entry, CacheType::Search, query.language, Some(self.ttl));
                debug!(key = %key, count = entry.results.len(), "Series search stored in cache");
                entry.results
            }
            Err(e) => {
                self.stats.api_errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "Metadata search failed, returning no candidates");
                Vec::new()
            }
        }
    }

    pub fn stats(&self) -> SearchStatsSnapshot {
        self.stats.snapshot()
    }
}
