//! Matching and grouping services

pub mod cache;
pub mod confidence_scorer;
pub mod filename_parser;
pub mod grouping;
pub mod matching_engine;
pub mod query;
pub mod rate_limiter;
pub mod search;
pub mod text_utils;
pub mod title_quality;
pub mod tmdb;

pub use cache::{CacheAdapter, CacheType, InMemoryStore, KeyValueStore};
pub use confidence_scorer::{
    ConfidenceScorer, ScoreBreakdown, ScoreComponent, ScoreResult, ScorerError, ScorerWeights,
};
pub use filename_parser::{ParsedFileRecord, ScannedFile, parse_file};
pub use grouping::{
    FileGrouper, Group, GroupingEngine, GroupingError, GroupingEvidence, GroupingStrategy,
    Matcher, MatcherResult, WeightedMatcher,
};
pub use matching_engine::{
    ConfidenceLevel, MatchEvidence, MatchOutcome, MatchingConfig, MatchingEngine, MatchingError,
    MetadataMatch,
};
pub use query::{Language, NormalizedQuery};
pub use search::{
    CachedSearchEntry, MediaType, MetadataCandidate, MetadataSearchClient, SearchService,
    SearchStatsSnapshot, series_key,
};
pub use tmdb::TmdbClient;
