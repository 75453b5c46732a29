//! TMDB (The Movie Database) search client
//!
//! Default `MetadataSearchClient` implementation over the TMDB `/search/multi`
//! endpoint. Base URL: https://api.themoviedb.org/3
//!
//! Rate limiting: TMDB allows ~40 requests per 10 seconds. This client uses
//! rate limiting and retry logic to handle that gracefully; the search
//! service above it additionally keeps call volume at one request per
//! series.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::rate_limiter::{RateLimitConfig, RateLimitedClient, RetryConfig, retry_async};
use super::search::{MediaType, MetadataCandidate, MetadataSearchClient};

/// TMDB API client with rate limiting and retry logic.
pub struct TmdbClient {
    client: Arc<RateLimitedClient>,
    base_url: String,
    api_key: String,
    retry_config: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse {
    results: Vec<TmdbSearchResult>,
}

/// One `/search/multi` row. Movies carry `title`/`release_date`, TV carries
/// `name`/`first_air_date`.
#[derive(Debug, Deserialize)]
struct TmdbSearchResult {
    id: i32,
    media_type: Option<String>,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    popularity: Option<f64>,
    genre_ids: Option<Vec<i32>>,
}

impl TmdbSearchResult {
    fn into_candidate(self) -> Option<MetadataCandidate> {
        let media_type = match self.media_type.as_deref() {
            Some("tv") => MediaType::Tv,
            Some("movie") => MediaType::Movie,
            // People and unknown kinds are not matchable releases.
            _ => return None,
        };
        Some(MetadataCandidate {
            id: self.id,
            title: self.title.or(self.name).unwrap_or_default(),
            media_type,
            release_date: self.release_date.or(self.first_air_date).filter(|d| !d.is_empty()),
            popularity: self.popularity.unwrap_or(0.0),
            genre_ids: self.genre_ids.unwrap_or_default(),
        })
    }
}

impl TmdbClient {
    /// Create a new TMDB client with the given API key.
    pub fn new(api_key: String) -> Self {
        Self {
            // ~40 requests per 10 seconds, so ~4/sec with burst of 10
            client: Arc::new(RateLimitedClient::new(
                "tmdb",
                RateLimitConfig {
                    requests_per_second: 4,
                    burst_size: 10,
                },
            )),
            base_url: "https://api.themoviedb.org/3".to_string(),
            api_key,
            retry_config: RetryConfig {
                max_retries: 3,
                initial_interval: Duration::from_millis(500),
                max_interval: Duration::from_secs(10),
                multiplier: 2.0,
            },
        }
    }

    /// Check if the client has an API key configured.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Search TMDB across movies and TV shows.
    pub async fn search_multi(&self, query: &str) -> Result<Vec<MetadataCandidate>> {
        if !self.has_api_key() {
            anyhow::bail!("TMDB API key not configured");
        }

        debug!(query = %query, "Searching TMDB");

        let url = format!("{}/search/multi", self.base_url);
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let query_owned = query.to_string();
        let retry_config = self.retry_config.clone();

        let results = retry_async(
            || {
                let url = url.clone();
                let client = client.clone();
                let q = query_owned.clone();
                let key = api_key.clone();
                async move {
                    let query_params: Vec<(&str, String)> = vec![
                        ("api_key", key),
                        ("query", q),
                        ("include_adult", "false".to_string()),
                    ];

                    let response = client.get_with_query(&url, &query_params).await?;

                    if response.status().as_u16() == 429 {
                        warn!("TMDB rate limit hit, will retry");
                        anyhow::bail!("Rate limited (429)");
                    }

                    if response.status().as_u16() == 401 {
                        anyhow::bail!("TMDB API key is invalid");
                    }

                    if !response.status().is_success() {
                        anyhow::bail!("TMDB search failed with status: {}", response.status());
                    }

                    let parsed: TmdbSearchResponse = response
                        .json()
                        .await
                        .context("Failed to parse TMDB search results")?;

                    Ok(parsed.results)
                }
            },
            &retry_config,
            "tmdb_search_multi",
        )
        .await?;

        let candidates: Vec<MetadataCandidate> = results
            .into_iter()
            .filter_map(TmdbSearchResult::into_candidate)
            .collect();

        debug!(count = candidates.len(), "TMDB search returned candidates");
        Ok(candidates)
    }
}

#[async_trait]
impl MetadataSearchClient for TmdbClient {
    async fn search(&self, title: &str) -> Result<Vec<MetadataCandidate>> {
        self.search_multi(title).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_result_mapping() {
        let row = TmdbSearchResult {
            id: 1429,
            media_type: Some("tv".to_string()),
            title: None,
            name: Some("Attack on Titan".to_string()),
            release_date: None,
            first_air_date: Some("2013-04-07".to_string()),
            popularity: Some(85.2),
            genre_ids: Some(vec![16, 10759]),
        };
        let candidate = row.into_candidate().unwrap();
        assert_eq!(candidate.title, "Attack on Titan");
        assert_eq!(candidate.media_type, MediaType::Tv);
        assert_eq!(candidate.release_date.as_deref(), Some("2013-04-07"));
        assert!(candidate.is_animation());
    }

    #[test]
    fn test_person_rows_are_dropped() {
        let row = TmdbSearchResult {
            id: 500,
            media_type: Some("person".to_string()),
            title: None,
            name: Some("Some Actor".to_string()),
            release_date: None,
            first_air_date: None,
            popularity: Some(10.0),
            genre_ids: None,
        };
        assert!(row.into_candidate().is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_errors() {
        let client = TmdbClient::new(String::new());
        assert!(client.search_multi("anything").await.is_err());
    }
}
