//! Weighted confidence scoring for metadata candidates
//!
//! Computes a 0..1 confidence that one metadata candidate is the release a
//! parsed filename refers to.
//!
//! ## Scoring formula
//! ```text
//! total = title_weight × fuzzy_ratio
//!       + year_weight × year_proximity
//!       + media_type_weight × type_affinity
//!       + popularity_bonus            (pre-scaled 0..0.2)
//! ```
//!
//! Scoring is deterministic and performs no I/O. Malformed candidate data
//! degrades to neutral component scores; it never fails the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::query::NormalizedQuery;
use super::search::{MediaType, MetadataCandidate};
use super::text_utils;

/// Component weights. Must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerWeights {
    pub title: f64,
    pub year: f64,
    pub media_type: f64,
    pub popularity: f64,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            title: 0.5,
            year: 0.25,
            media_type: 0.15,
            popularity: 0.1,
        }
    }
}

impl ScorerWeights {
    fn validate(&self) -> Result<(), ScorerError> {
        let weights = [self.title, self.year, self.media_type, self.popularity];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0 || *w > 1.0) {
            return Err(ScorerError::WeightOutOfRange);
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ScorerError::WeightsDoNotSumToOne { sum });
        }
        Ok(())
    }
}

/// Construction-time contract violations. These are the only scorer errors
/// a caller ever sees; runtime data problems degrade to neutral scores.
#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("scorer weights must each lie in [0,1]")]
    WeightOutOfRange,
    #[error("scorer weights must sum to 1.0, got {sum}")]
    WeightsDoNotSumToOne { sum: f64 },
}

/// Which signal a `ScoreResult` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreComponent {
    Title,
    Year,
    MediaType,
    Popularity,
    /// Genre-boost adjustment attached by the matching engine.
    Genre,
    /// Partial-containment fallback attached by the matching engine.
    Partial,
}

impl ScoreComponent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreComponent::Title => "title",
            ScoreComponent::Year => "year",
            ScoreComponent::MediaType => "media_type",
            ScoreComponent::Popularity => "popularity",
            ScoreComponent::Genre => "genre",
            ScoreComponent::Partial => "partial",
        }
    }
}

/// One component's contribution to a confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    pub component: ScoreComponent,
    /// Component score, clamped to [0,1].
    pub score: f64,
    /// Nominal component weight, clamped to [0,1].
    pub weight: f64,
    pub reason: String,
}

impl ScoreResult {
    fn new(component: ScoreComponent, score: f64, weight: f64, reason: impl Into<String>) -> Self {
        Self {
            component,
            score: clamp_unit(score),
            weight: clamp_unit(weight),
            reason: reason.into(),
        }
    }

    /// Flat genre-boost adjustment recorded by the matching engine.
    pub fn genre_boost(bonus: f64, reason: impl Into<String>) -> Self {
        Self::new(ScoreComponent::Genre, bonus, 1.0, reason)
    }

    /// Partial-containment substitution recorded by the matching engine.
    pub fn partial_match(score: f64, weight: f64, reason: impl Into<String>) -> Self {
        Self::new(ScoreComponent::Partial, score, weight, reason)
    }
}

/// Full score with its per-component breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Weighted total, clamped to [0,1].
    pub total: f64,
    pub components: Vec<ScoreResult>,
}

impl ScoreBreakdown {
    /// Compact human-readable form for logs and evidence explanations.
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .components
            .iter()
            .map(|c| format!("{}:{:.0}%→{:.2}", c.component.as_str(), c.score * 100.0, c.score * c.weight))
            .collect();
        format!("total:{:.2} [{}]", self.total, parts.join(", "))
    }
}

/// Pure scoring function over a query and one candidate.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    weights: ScorerWeights,
}

impl ConfidenceScorer {
    /// Create a scorer with validated weights.
    pub fn new(weights: ScorerWeights) -> Result<Self, ScorerError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    /// Scorer with the standard weight set.
    pub fn with_defaults() -> Self {
        Self {
            weights: ScorerWeights::default(),
        }
    }

    /// Score one candidate against a query. Total is 0.0 iff either title
    /// is empty.
    pub fn score(&self, query: &NormalizedQuery, candidate: &MetadataCandidate) -> ScoreBreakdown {
        if query.title.trim().is_empty() || candidate.title.trim().is_empty() {
            return ScoreBreakdown {
                total: 0.0,
                components: vec![ScoreResult::new(
                    ScoreComponent::Title,
                    0.0,
                    self.weights.title,
                    "empty title on one side",
                )],
            };
        }

        let title = self.score_title(query, candidate);
        let year = self.score_year(query, candidate);
        let media_type = self.score_media_type(candidate);
        let popularity = self.score_popularity(candidate);

        // Popularity is pre-scaled into 0..0.2 and added directly; the
        // other components contribute score × weight.
        let total = title.score * title.weight
            + year.score * year.weight
            + media_type.score * media_type.weight
            + popularity.score;

        ScoreBreakdown {
            total: clamp_unit(total),
            components: vec![title, year, media_type, popularity],
        }
    }

    fn score_title(&self, query: &NormalizedQuery, candidate: &MetadataCandidate) -> ScoreResult {
        let ratio = text_utils::fuzzy_ratio(&query.title, &candidate.title);
        ScoreResult::new(
            ScoreComponent::Title,
            ratio / 100.0,
            self.weights.title,
            format!("fuzzy ratio {:.0}", ratio),
        )
    }

    fn score_year(&self, query: &NormalizedQuery, candidate: &MetadataCandidate) -> ScoreResult {
        let weight = self.weights.year;
        let candidate_year = match candidate.release_date.as_deref() {
            None => None,
            Some(date) => match parse_release_year(date) {
                Some(y) => Some(y),
                None => {
                    warn!(release_date = date, "Malformed candidate release date");
                    return ScoreResult::new(
                        ScoreComponent::Year,
                        0.5,
                        weight,
                        "malformed release date, neutral",
                    );
                }
            },
        };

        match (query.year, candidate_year) {
            (Some(qy), Some(cy)) => {
                let delta = (qy - cy).abs();
                let score = match delta {
                    0 => 1.0,
                    1 => 0.8,
                    2 => 0.6,
                    3..=5 => 0.4,
                    _ => 0.1,
                };
                ScoreResult::new(ScoreComponent::Year, score, weight, format!("Δ{} years", delta))
            }
            _ => ScoreResult::new(ScoreComponent::Year, 0.5, weight, "year missing, neutral"),
        }
    }

    fn score_media_type(&self, candidate: &MetadataCandidate) -> ScoreResult {
        let (score, reason) = match candidate.media_type {
            MediaType::Tv => (1.0, "tv"),
            MediaType::Movie => (0.7, "movie"),
            MediaType::Other => (0.5, "other media type, neutral"),
        };
        ScoreResult::new(ScoreComponent::MediaType, score, self.weights.media_type, reason)
    }

    fn score_popularity(&self, candidate: &MetadataCandidate) -> ScoreResult {
        let pop = candidate.popularity;
        let score = if !pop.is_finite() || pop <= 0.0 {
            0.0
        } else {
            pop.min(100.0) / 100.0 * 0.2
        };
        ScoreResult::new(
            ScoreComponent::Popularity,
            score,
            self.weights.popularity,
            format!("popularity {:.1}", pop),
        )
    }
}

fn clamp_unit(v: f64) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

/// Extract the year from a `YYYY-MM-DD` release date.
/// Returns `None` for anything that does not parse as a calendar date.
fn parse_release_year(date: &str) -> Option<i32> {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .map(|d| {
            use chrono::Datelike;
            d.year()
        })
}
