//! Integration tests for the matching and grouping pipelines
//!
//! These tests verify the complete flows:
//! - parsed file -> search -> score -> fallback -> best match
//! - scanned files -> matchers -> strategy -> deduped, named groups
//! - series-level caching across a bulk scan

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use curator::services::cache::{CacheAdapter, InMemoryStore};
use curator::services::confidence_scorer::ConfidenceScorer;
use curator::services::matching_engine::{MatchOutcome, MatchingConfig, MatchingEngine};
use curator::services::search::{
    ANIMATION_GENRE_ID, MediaType, MetadataCandidate, MetadataSearchClient, SearchService,
};
use curator::{FileGrouper, GroupingEngine, GroupingStrategy, ParsedFileRecord, ScannedFile};
use pretty_assertions::assert_eq;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Test Catalog
// ============================================================================

/// Stub catalog returning canned candidates per query substring.
struct FakeCatalog {
    calls: Arc<AtomicU32>,
    fail: bool,
}

impl FakeCatalog {
    fn new() -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            fail: true,
        }
    }
}

#[async_trait]
impl MetadataSearchClient for FakeCatalog {
    async fn search(&self, title: &str) -> anyhow::Result<Vec<MetadataCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("catalog unreachable");
        }

        let lower = title.to_lowercase();
        let mut results = Vec::new();
        if lower.contains("attack") || lower.contains("titan") {
            results.push(MetadataCandidate {
                id: 1429,
                title: "Attack on Titan".to_string(),
                media_type: MediaType::Tv,
                release_date: Some("2013-04-07".to_string()),
                popularity: 85.2,
                genre_ids: vec![ANIMATION_GENRE_ID, 10759],
            });
        }
        if lower.contains("kny") || lower.contains("kimetsu") {
            results.push(MetadataCandidate {
                id: 85937,
                title: "Kimetsu no Yaiba".to_string(),
                media_type: MediaType::Tv,
                release_date: Some("2019-04-06".to_string()),
                popularity: 60.0,
                genre_ids: vec![ANIMATION_GENRE_ID],
            });
        }
        Ok(results)
    }
}

fn engine_with(catalog: FakeCatalog) -> MatchingEngine<FakeCatalog, InMemoryStore> {
    let search = SearchService::new(
        catalog,
        CacheAdapter::new(InMemoryStore::new()),
        Duration::from_secs(3600),
    );
    MatchingEngine::new(
        search,
        ConfidenceScorer::with_defaults(),
        MatchingConfig::default(),
    )
    .expect("valid default configuration")
}

fn record(title: &str, year: Option<i32>) -> ParsedFileRecord {
    ParsedFileRecord {
        file_path: format!("{title}.mkv"),
        title: title.to_string(),
        year,
        ..Default::default()
    }
}

// ============================================================================
// Matching Pipeline Tests
// ============================================================================

mod matching_pipeline {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_high_confidence_match_end_to_end() {
        init_tracing();
        let engine = engine_with(FakeCatalog::new());
        let outcome = engine
            .find_match(&record("Attack on Titan", Some(2013)))
            .await;

        let m = outcome.found().expect("expected a match");
        assert_eq!(m.candidate.id, 1429);
        assert!(m.confidence > 0.9, "got {}", m.confidence);
        assert_eq!(m.evidence.matched_title, "Attack on Titan");
        assert!(!m.evidence.component_scores.is_empty());
    }

    #[tokio::test]
    async fn test_acronym_query_improves_via_partial_fallback() {
        let engine = engine_with(FakeCatalog::new());
        let outcome = engine.find_match(&record("KNY", None)).await;

        let m = outcome.found().expect("expected a match");
        assert_eq!(m.candidate.id, 85937);
        assert!(m.used_partial_matching);
    }

    #[tokio::test]
    async fn test_catalog_outage_degrades_to_not_found() {
        let engine = engine_with(FakeCatalog::failing());
        let outcome = engine.find_match(&record("Attack on Titan", None)).await;
        assert!(matches!(outcome, MatchOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_bulk_scan_completes_despite_individual_failures() {
        let engine = engine_with(FakeCatalog::new());
        let records = vec![
            record("Attack on Titan", Some(2013)),
            record("", None),
            record("Totally Unknown Show", None),
            record("KNY", None),
        ];

        let mut found = 0;
        for r in &records {
            // Every record yields an outcome; nothing panics or raises.
            match engine.find_match(r).await {
                MatchOutcome::Found(_) => found += 1,
                MatchOutcome::NotFound | MatchOutcome::Failed { .. } => {}
            }
        }
        assert_eq!(found, 2);
    }

    #[tokio::test]
    async fn test_episodes_of_one_series_share_a_catalog_call() {
        let catalog = FakeCatalog::new();
        let calls = catalog.calls.clone();
        let engine = engine_with(catalog);

        for episode in 1..=5 {
            let r = ParsedFileRecord {
                file_path: format!("Attack.on.Titan.S01E{episode:02}.mkv"),
                title: format!("Attack on Titan S01E{episode:02}"),
                season: Some(1),
                episode: Some(episode),
                ..Default::default()
            };
            engine.find_match(&r).await;
        }

        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "five episodes should resolve through one series-level search"
        );
        let stats = engine.search_service().stats();
        assert_eq!(stats.cache_hits, 4);
        assert_eq!(stats.cache_misses, 1);
    }
}

// ============================================================================
// Grouping Pipeline Tests
// ============================================================================

mod grouping_pipeline {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mixed_library_groups_cleanly() {
        init_tracing();
        let grouper = FileGrouper::with_defaults();
        let files = vec![
            ScannedFile::from_path("/tv/Attack.on.Titan.S01E01.1080p.WEB-DL.mkv"),
            ScannedFile::from_path("/tv/Attack.on.Titan.S01E02.1080p.WEB-DL.mkv"),
            ScannedFile::from_path("/tv/Attack on Titan S01E03 720p HDTV.mkv"),
            ScannedFile::from_path("/anime/[Subs] Mushishi - 01 [DEADBEEF01].mkv"),
            ScannedFile::from_path("/anime/[Subs] Mushishi - 02 [DEADBEEF01].mkv"),
        ];

        let groups = grouper.group_files(&files);
        assert_eq!(groups.len(), 2);
        for group in &groups {
            let evidence = group.evidence.as_ref().expect("evidence attached");
            assert!(!evidence.selected_matchers.is_empty());
            assert!((0.0..=1.0).contains(&evidence.confidence));
        }
        let total: usize = groups.iter().map(|g| g.files.len()).sum();
        assert_eq!(total, files.len());
    }

    #[test]
    fn test_transitive_merge_across_matchers() {
        // f1/f2 share a cleaned title; f2/f3 share a release hash. The
        // weighted merge must unite all three through f2.
        let grouper = FileGrouper::with_defaults();
        let files = vec![
            ScannedFile::from_path("Serial Experiments Lain S01E01 1080p.mkv"),
            ScannedFile::from_path("[Grp] Serial Experiments Lain - 02 [AB12CD34].mkv"),
            ScannedFile::from_path("[Grp] SEL - 03 [AB12CD34].mkv"),
        ];

        let groups = grouper.group_files(&files);
        assert_eq!(groups.len(), 1, "expected one transitive group");
        assert_eq!(groups[0].files.len(), 3);
    }

    #[test]
    fn test_consensus_strategy_is_conservative() {
        let engine = GroupingEngine::new(
            GroupingEngine::default_matchers(),
            GroupingStrategy::Consensus { min_consensus: 2 },
        )
        .expect("valid configuration");
        let grouper = FileGrouper::new(engine);

        let files = vec![
            // Hash, title and season/episode all agree on this pair.
            ScannedFile::from_path("[Grp] Stable Show - 01 [FEEDFACE1].mkv"),
            ScannedFile::from_path("[Grp] Stable Show - 02 [FEEDFACE1].mkv"),
        ];

        let groups = grouper.group_files(&files);
        assert_eq!(groups.len(), 1);
        let evidence = groups[0].evidence.as_ref().unwrap();
        assert!(evidence.selected_matchers.len() >= 2);
    }

    #[test]
    fn test_grouping_then_matching_round_trip() {
        // Group first, then match the group's representative title.
        let grouper = FileGrouper::with_defaults();
        let files = vec![
            ScannedFile::from_path("Attack.on.Titan.S01E01.1080p.mkv"),
            ScannedFile::from_path("Attack.on.Titan.S01E02.720p.mkv"),
        ];
        let groups = grouper.group_files(&files);
        assert_eq!(groups.len(), 1);

        let rt = tokio::runtime::Runtime::new().unwrap();
        let outcome = rt.block_on(async {
            let engine = engine_with(FakeCatalog::new());
            engine.find_match(&record(&groups[0].title, None)).await
        });
        let m = outcome.found().expect("group title should match catalog");
        assert_eq!(m.candidate.id, 1429);
    }
}
