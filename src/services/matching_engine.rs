//! Metadata matching engine
//!
//! Resolves one parsed filename to the single best catalog candidate, or
//! reports that no acceptable match exists. The pipeline runs
//! NORMALIZE → SEARCH → SCORE → YEAR_FILTER → GENRE_BOOST →
//! PARTIAL_MATCH_FALLBACK → SELECT; every stage degrades locally, so the
//! public contract never raises for data problems. Only construction-time
//! misconfiguration is an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::cache::KeyValueStore;
use super::confidence_scorer::{ConfidenceScorer, ScoreBreakdown, ScoreComponent, ScoreResult};
use super::filename_parser::ParsedFileRecord;
use super::query::NormalizedQuery;
use super::search::{MediaType, MetadataCandidate, MetadataSearchClient, SearchService};
use super::text_utils;

/// Title score assumed when the partial-containment fallback fires. A
/// containment hit is a strong signal but never certainty.
const PARTIAL_TITLE_SCORE: f64 = 0.75;

/// Empirical thresholds for the match pipeline. All tunable; defaults are
/// the values the pipeline was calibrated with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Scores at or above this are trusted outright.
    pub high_confidence: f64,
    pub medium_confidence: f64,
    pub low_confidence: f64,
    /// Flat bonus for Animation-genre candidates when confidence is low.
    pub genre_boost: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            high_confidence: 0.8,
            medium_confidence: 0.6,
            low_confidence: 0.4,
            genre_boost: 0.1,
        }
    }
}

impl MatchingConfig {
    /// Validate threshold ordering and ranges.
    pub fn validate(&self) -> Result<(), MatchingError> {
        let ordered = self.high_confidence > self.medium_confidence
            && self.medium_confidence > self.low_confidence
            && self.low_confidence > 0.0
            && self.high_confidence <= 1.0;
        if !ordered {
            return Err(MatchingError::InvalidThresholds);
        }
        if !(0.0..=1.0).contains(&self.genre_boost) {
            return Err(MatchingError::InvalidGenreBoost(self.genre_boost));
        }
        Ok(())
    }

    /// Bucket a confidence score.
    pub fn level_for(&self, score: f64) -> ConfidenceLevel {
        if score >= self.high_confidence {
            ConfidenceLevel::High
        } else if score >= self.medium_confidence {
            ConfidenceLevel::Medium
        } else if score >= self.low_confidence {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }
}

/// Construction-time contract violations.
#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("confidence thresholds must satisfy 0 < low < medium < high <= 1")]
    InvalidThresholds,
    #[error("genre boost must lie in [0,1], got {0}")]
    InvalidGenreBoost(f64),
    #[error("match evidence requires at least one component score")]
    EmptyEvidence,
    #[error("match evidence requires a positive catalog id, got {0}")]
    InvalidCandidateId(i32),
}

/// Confidence bucket for a resolved match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    VeryLow,
}

/// Structured record of why a candidate was selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEvidence {
    pub total_score: f64,
    /// Never empty; validated at construction.
    pub component_scores: Vec<ScoreResult>,
    pub file_title: String,
    pub matched_title: String,
    pub tmdb_id: i32,
    pub media_type: MediaType,
}

impl MatchEvidence {
    pub fn new(
        total_score: f64,
        component_scores: Vec<ScoreResult>,
        file_title: String,
        matched_title: String,
        tmdb_id: i32,
        media_type: MediaType,
    ) -> Result<Self, MatchingError> {
        if component_scores.is_empty() {
            return Err(MatchingError::EmptyEvidence);
        }
        if tmdb_id <= 0 {
            return Err(MatchingError::InvalidCandidateId(tmdb_id));
        }
        Ok(Self {
            total_score: total_score.clamp(0.0, 1.0),
            component_scores,
            file_title,
            matched_title,
            tmdb_id,
            media_type,
        })
    }
}

/// A successfully resolved match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataMatch {
    pub candidate: MetadataCandidate,
    pub confidence: f64,
    pub level: ConfidenceLevel,
    pub evidence: MatchEvidence,
    /// True only when the partial-containment fallback produced the final
    /// score.
    pub used_partial_matching: bool,
}

/// Outcome of one match attempt. "No data" and "degraded fault" are kept
/// distinct so callers can tell an empty catalog from a broken stage, but
/// neither is a raised error: a bulk scan completes for every file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MatchOutcome {
    Found(Box<MetadataMatch>),
    NotFound,
    Failed { reason: String },
}

impl MatchOutcome {
    pub fn found(&self) -> Option<&MetadataMatch> {
        match self {
            MatchOutcome::Found(m) => Some(m),
            _ => None,
        }
    }
}

/// One candidate moving through the pipeline.
struct ScoredCandidate {
    candidate: MetadataCandidate,
    breakdown: ScoreBreakdown,
    score: f64,
    used_partial: bool,
}

/// Orchestrates search, scoring and fallback heuristics.
pub struct MatchingEngine<C: MetadataSearchClient, S: KeyValueStore> {
    search: SearchService<C, S>,
    scorer: ConfidenceScorer,
    config: MatchingConfig,
}

impl<C: MetadataSearchClient, S: KeyValueStore> MatchingEngine<C, S> {
    /// Create an engine. Fails only on misconfigured thresholds.
    pub fn new(
        search: SearchService<C, S>,
        scorer: ConfidenceScorer,
        config: MatchingConfig,
    ) -> Result<Self, MatchingError> {
        config.validate()?;
        Ok(Self {
            search,
            scorer,
            config,
        })
    }

    /// Access the underlying search service (stats, direct lookups).
    pub fn search_service(&self) -> &SearchService<C, S> {
        &self.search
    }

    /// Find the best catalog match for a parsed file record.
    pub async fn find_match(&self, record: &ParsedFileRecord) -> MatchOutcome {
        // NORMALIZE
        let Some(query) = NormalizedQuery::from_record(record) else {
            debug!(file = %record.file_path, "No usable title, skipping match");
            return MatchOutcome::NotFound;
        };

        // SEARCH
        let candidates = self.search.search(&query).await;
        if candidates.is_empty() {
            debug!(title = %query.title, "No candidates from catalog");
            return MatchOutcome::NotFound;
        }

        // SCORE
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .filter(|c| !c.title.trim().is_empty())
            .map(|candidate| {
                let breakdown = self.scorer.score(&query, &candidate);
                ScoredCandidate {
                    score: breakdown.total,
                    breakdown,
                    candidate,
                    used_partial: false,
                }
            })
            .collect();
        if scored.is_empty() {
            return MatchOutcome::NotFound;
        }

        // YEAR_FILTER: closer release years rank first, yearless candidates
        // after all year-matched ones, ties broken by title score. The
        // resulting order breaks score ties at selection.
        if let Some(query_year) = query.year {
            scored.sort_by(|a, b| {
                let rank = |sc: &ScoredCandidate| {
                    sc.candidate
                        .year()
                        .map(|y| (query_year - y).abs())
                        .unwrap_or(i32::MAX)
                };
                rank(a)
                    .cmp(&rank(b))
                    .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
            });
        }

        // GENRE_BOOST: animation releases dominate this corpus, so a weak
        // top score gets a second look through the genre lens.
        if self.top_score(&scored) < self.config.high_confidence {
            for sc in scored.iter_mut() {
                if sc.candidate.is_animation() {
                    sc.score = (sc.score + self.config.genre_boost).min(1.0);
                    sc.breakdown.components.push(ScoreResult::genre_boost(
                        self.config.genre_boost,
                        "animation genre bonus",
                    ));
                }
            }
        }

        // PARTIAL_MATCH_FALLBACK
        if self.top_score(&scored) < self.config.high_confidence {
            for sc in scored.iter_mut() {
                self.apply_partial_fallback(&query, sc);
            }
        }

        // SELECT: strictly-greater keeps the year-ranked order on ties.
        let mut remaining = scored.into_iter();
        let Some(mut best) = remaining.next() else {
            return MatchOutcome::NotFound;
        };
        for sc in remaining {
            if sc.score > best.score {
                best = sc;
            }
        }

        let evidence = match MatchEvidence::new(
            best.score,
            best.breakdown.components.clone(),
            query.title.clone(),
            best.candidate.title.clone(),
            best.candidate.id,
            best.candidate.media_type,
        ) {
            Ok(evidence) => evidence,
            Err(e) => {
                warn!(error = %e, "Failed to assemble match evidence");
                return MatchOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        debug!(
            file_title = %query.title,
            matched = %best.candidate.title,
            score = best.score,
            partial = best.used_partial,
            "Selected metadata match"
        );

        MatchOutcome::Found(Box::new(MetadataMatch {
            confidence: best.score,
            level: self.config.level_for(best.score),
            evidence,
            used_partial_matching: best.used_partial,
            candidate: best.candidate,
        }))
    }

    fn top_score(&self, scored: &[ScoredCandidate]) -> f64 {
        scored.iter().map(|sc| sc.score).fold(0.0, f64::max)
    }

    /// Recompute a candidate's score assuming a partial title hit; keep the
    /// recomputation only when it improves on the fuzzy score.
    fn apply_partial_fallback(&self, query: &NormalizedQuery, sc: &mut ScoredCandidate) {
        if !is_partial_title_match(&query.title, &sc.candidate.title) {
            return;
        }
        let Some(title_component) = sc
            .breakdown
            .components
            .iter()
            .find(|c| c.component == ScoreComponent::Title)
            .cloned()
        else {
            return;
        };

        let replaced = sc.score - title_component.score * title_component.weight
            + PARTIAL_TITLE_SCORE * title_component.weight;
        let replaced = replaced.clamp(0.0, 1.0);
        if replaced > sc.score {
            sc.score = replaced;
            sc.used_partial = true;
            sc.breakdown.components.push(ScoreResult::partial_match(
                PARTIAL_TITLE_SCORE,
                title_component.weight,
                "bidirectional title containment",
            ));
        }
    }
}

/// Bidirectional partial title match: one compacted title contains the
/// other, or one equals the other's word-initial acronym ("KNY" for
/// "Kimetsu no Yaiba").
fn is_partial_title_match(a: &str, b: &str) -> bool {
    let ca = compact(a);
    let cb = compact(b);
    if ca.is_empty() || cb.is_empty() {
        return false;
    }
    if ca.contains(&cb) || cb.contains(&ca) {
        return true;
    }
    ca == acronym(b) || cb == acronym(a)
}

fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn acronym(s: &str) -> String {
    text_utils::normalize_title(s)
        .split_whitespace()
        .filter_map(|w| w.chars().next())
        .collect()
}
