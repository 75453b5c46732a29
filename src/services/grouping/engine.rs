//! Grouping engine and facade
//!
//! `GroupingEngine` runs every configured matcher over the input files and
//! hands the per-matcher partitions to the combination strategy.
//! `FileGrouper` is the external entry point: it composes the engine with
//! duplicate resolution and group name management.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::{debug, info};

use super::matchers::Matcher;
use super::names;
use super::strategy::{GroupingStrategy, MatcherResult};
use super::{Group, GroupingEvidence};
use crate::services::filename_parser::ScannedFile;

/// A matcher with its configured combination weight.
#[derive(Debug, Clone)]
pub struct WeightedMatcher {
    pub matcher: Matcher,
    /// Weight in (0,1], consumed by the combination strategy.
    pub weight: f64,
}

/// Construction-time contract violations for the grouping pipeline.
#[derive(Debug, Error)]
pub enum GroupingError {
    #[error("grouping engine requires at least one matcher")]
    NoMatchers,
    #[error("matcher '{matcher}' has weight {weight}; weights must lie in (0,1]")]
    InvalidWeight { matcher: String, weight: f64 },
    #[error("consensus strategy requires min_consensus >= 1")]
    InvalidMinConsensus,
}

/// Runs all matchers and delegates combination to the strategy.
#[derive(Debug)]
pub struct GroupingEngine {
    matchers: Vec<WeightedMatcher>,
    strategy: GroupingStrategy,
}

impl GroupingEngine {
    /// Create an engine. Misconfiguration (no matchers, out-of-range
    /// weight, zero consensus) fails here and nowhere later.
    pub fn new(
        matchers: Vec<WeightedMatcher>,
        strategy: GroupingStrategy,
    ) -> Result<Self, GroupingError> {
        if matchers.is_empty() {
            return Err(GroupingError::NoMatchers);
        }
        for wm in &matchers {
            if !wm.weight.is_finite() || wm.weight <= 0.0 || wm.weight > 1.0 {
                return Err(GroupingError::InvalidWeight {
                    matcher: wm.matcher.name().to_string(),
                    weight: wm.weight,
                });
            }
        }
        if let GroupingStrategy::Consensus { min_consensus } = &strategy {
            if *min_consensus == 0 {
                return Err(GroupingError::InvalidMinConsensus);
            }
        }
        Ok(Self { matchers, strategy })
    }

    /// The standard matcher set: release hashes are authoritative, textual
    /// similarity is strong, season/episode proximity backs them up.
    pub fn default_matchers() -> Vec<WeightedMatcher> {
        vec![
            WeightedMatcher {
                matcher: Matcher::HashSimilarity,
                weight: 1.0,
            },
            WeightedMatcher {
                matcher: Matcher::title_similarity(),
                weight: 0.8,
            },
            WeightedMatcher {
                matcher: Matcher::SeasonEpisode,
                weight: 0.6,
            },
        ]
    }

    /// Engine wired from runtime configuration: the configured title
    /// similarity threshold and consensus quorum replace the built-in
    /// defaults.
    pub fn from_config(
        config: &crate::config::Config,
        strategy: GroupingStrategy,
    ) -> Result<Self, GroupingError> {
        let strategy = match strategy {
            GroupingStrategy::Consensus { .. } => GroupingStrategy::Consensus {
                min_consensus: config.min_consensus,
            },
            other => other,
        };
        let matchers = vec![
            WeightedMatcher {
                matcher: Matcher::HashSimilarity,
                weight: 1.0,
            },
            WeightedMatcher {
                matcher: Matcher::TitleSimilarity {
                    threshold: config.title_similarity_threshold,
                },
                weight: 0.8,
            },
            WeightedMatcher {
                matcher: Matcher::SeasonEpisode,
                weight: 0.6,
            },
        ];
        Self::new(matchers, strategy)
    }

    /// Run all matchers, combine, and make the resulting titles unique.
    pub fn group(&self, files: &[ScannedFile]) -> Vec<Group> {
        let results: Vec<MatcherResult> = self
            .matchers
            .iter()
            .map(|wm| {
                let groups = wm.matcher.run(files);
                debug!(
                    matcher = wm.matcher.name(),
                    groups = groups.len(),
                    "Matcher produced groups"
                );
                MatcherResult {
                    matcher: wm.matcher.name().to_string(),
                    weight: wm.weight,
                    groups,
                }
            })
            .collect();

        let combined = self.strategy.combine(&results);

        // Distinct groups may share a representative title; suffix them so
        // names are unique within this run.
        let mut taken: BTreeMap<String, Vec<ScannedFile>> = BTreeMap::new();
        combined
            .into_iter()
            .map(|group| {
                let name = names::ensure_unique_group_name(&group.title, &taken);
                taken.insert(name.clone(), Vec::new());
                Group {
                    title: name,
                    files: group.files,
                    evidence: group.evidence,
                }
            })
            .collect()
    }
}

/// Facade composing grouping, duplicate resolution and name management.
pub struct FileGrouper {
    engine: GroupingEngine,
}

impl FileGrouper {
    pub fn new(engine: GroupingEngine) -> Self {
        Self { engine }
    }

    /// Grouper with the standard matcher set and weighted-merge combination.
    pub fn with_defaults() -> Self {
        let engine =
            GroupingEngine::new(GroupingEngine::default_matchers(), GroupingStrategy::default())
                .expect("default grouping configuration is valid");
        Self::new(engine)
    }

    /// Cluster scanned files into uniquely named release groups.
    ///
    /// Same-episode duplicates inside a group collapse to the best copy,
    /// and "(N)"-suffixed name variants fold back into their base name.
    pub fn group_files(&self, files: &[ScannedFile]) -> Vec<Group> {
        let combined = self.engine.group(files);

        let collapsed: Vec<Group> = combined.iter().map(collapse_duplicates).collect();

        // Fold suffixed variants of one base name together, keeping the
        // strongest evidence for each base.
        let mut name_map: BTreeMap<String, Vec<ScannedFile>> = BTreeMap::new();
        let mut evidence_by_base: HashMap<String, GroupingEvidence> = HashMap::new();
        for group in collapsed {
            let base = names::base_group_name(&group.title);
            if let Some(evidence) = group.evidence {
                match evidence_by_base.get(&base) {
                    Some(existing) if existing.confidence >= evidence.confidence => {}
                    _ => {
                        evidence_by_base.insert(base.clone(), evidence);
                    }
                }
            }
            name_map.entry(group.title).or_default().extend(group.files);
        }
        let merged = names::merge_similar_group_names(name_map);

        let mut groups: Vec<Group> = merged
            .into_iter()
            .map(|(name, files)| {
                // Re-dedupe by path: a file can arrive through several
                // folded variants.
                let mut by_path: BTreeMap<String, ScannedFile> = BTreeMap::new();
                for file in files {
                    by_path.entry(file.path.clone()).or_insert(file);
                }
                let evidence = evidence_by_base.remove(&name);
                Group {
                    title: name,
                    files: by_path.into_values().collect(),
                    evidence,
                }
            })
            .collect();

        groups.sort_by(|a, b| {
            let ca = a.evidence.as_ref().map(|e| e.confidence).unwrap_or(0.0);
            let cb = b.evidence.as_ref().map(|e| e.confidence).unwrap_or(0.0);
            cb.partial_cmp(&ca)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.title.cmp(&b.title))
        });

        info!(
            files = files.len(),
            groups = groups.len(),
            "Grouped scanned files"
        );
        groups
    }
}

/// Collapse same-episode duplicates to the best copy. Builds a fresh
/// `Group`; the input group is left untouched.
fn collapse_duplicates(group: &Group) -> Group {
    let mut kept: Vec<ScannedFile> = Vec::new();
    let mut episode_sets: BTreeMap<(u32, u32), Vec<ScannedFile>> = BTreeMap::new();

    for file in &group.files {
        match file.parsed.episode {
            Some(episode) => {
                // Files without a season sort under a sentinel so specials
                // and absolute-numbered episodes still collapse.
                let season = file.parsed.season.unwrap_or(u32::MAX);
                episode_sets
                    .entry((season, episode))
                    .or_default()
                    .push(file.clone());
            }
            None => kept.push(file.clone()),
        }
    }

    for set in episode_sets.into_values() {
        if let Some(best) = names::resolve_duplicates(&set) {
            kept.push(best.clone());
        }
    }

    kept.sort_by(|a, b| a.path.cmp(&b.path));
    Group {
        title: group.title.clone(),
        files: kept,
        evidence: group.evidence.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn file(name: &str) -> ScannedFile {
        ScannedFile::from_path(name)
    }

    #[test]
    fn test_engine_rejects_empty_matcher_set() {
        let err = GroupingEngine::new(vec![], GroupingStrategy::default());
        assert_matches!(err, Err(GroupingError::NoMatchers));
    }

    #[test]
    fn test_engine_rejects_bad_weight() {
        let err = GroupingEngine::new(
            vec![WeightedMatcher {
                matcher: Matcher::HashSimilarity,
                weight: 0.0,
            }],
            GroupingStrategy::default(),
        );
        assert_matches!(err, Err(GroupingError::InvalidWeight { .. }));

        let err = GroupingEngine::new(
            vec![WeightedMatcher {
                matcher: Matcher::HashSimilarity,
                weight: 1.5,
            }],
            GroupingStrategy::default(),
        );
        assert_matches!(err, Err(GroupingError::InvalidWeight { .. }));
    }

    #[test]
    fn test_from_config_applies_tuning() {
        let config = crate::config::Config {
            min_consensus: 3,
            title_similarity_threshold: 0.9,
            ..Default::default()
        };
        let engine = GroupingEngine::from_config(
            &config,
            GroupingStrategy::Consensus { min_consensus: 2 },
        )
        .unwrap();
        assert_eq!(engine.strategy, GroupingStrategy::Consensus { min_consensus: 3 });
        assert!(engine.matchers.iter().any(|wm| matches!(
            wm.matcher,
            Matcher::TitleSimilarity { threshold } if (threshold - 0.9).abs() < 1e-9
        )));
    }

    #[test]
    fn test_engine_rejects_zero_consensus() {
        let err = GroupingEngine::new(
            GroupingEngine::default_matchers(),
            GroupingStrategy::Consensus { min_consensus: 0 },
        );
        assert_matches!(err, Err(GroupingError::InvalidMinConsensus));
    }

    #[test]
    fn test_group_files_clusters_one_series() {
        let grouper = FileGrouper::with_defaults();
        let files = vec![
            file("Attack.on.Titan.S01E01.1080p.WEB-DL.mkv"),
            file("Attack.on.Titan.S01E02.1080p.WEB-DL.mkv"),
            file("Attack on Titan S01E03 720p HDTV.mkv"),
        ];
        let groups = grouper.group_files(&files);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].files.len(), 3);
        assert!(groups[0].evidence.is_some());
    }

    #[test]
    fn test_group_files_separates_unrelated_series() {
        let grouper = FileGrouper::with_defaults();
        let files = vec![
            file("Attack.on.Titan.S01E01.mkv"),
            file("Mushishi.S01E01.mkv"),
        ];
        let groups = grouper.group_files(&files);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_group_files_collapses_same_episode_duplicates() {
        let grouper = FileGrouper::with_defaults();
        let files = vec![
            file("Show.S01E01.720p.HDTV.mkv"),
            file("Show.S01E01.1080p.BluRay.mkv"),
            file("Show.S01E02.1080p.BluRay.mkv"),
        ];
        let groups = grouper.group_files(&files);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].files.len(), 2);
        assert!(
            groups[0]
                .files
                .iter()
                .any(|f| f.path.contains("S01E01.1080p")),
            "the 1080p BluRay copy should survive"
        );
    }

    #[test]
    fn test_group_names_unique() {
        let grouper = FileGrouper::with_defaults();
        let files = vec![
            file("Alpha.S01E01.mkv"),
            file("Beta.S01E01.mkv"),
            file("Gamma.S01E01.mkv"),
        ];
        let groups = grouper.group_files(&files);
        let mut names: Vec<&str> = groups.iter().map(|g| g.title.as_str()).collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), before);
    }

    #[test]
    fn test_groups_sorted_by_confidence() {
        let grouper = FileGrouper::with_defaults();
        let files = vec![
            // Hash + title + season agree on these two.
            file("[Subs] Solid Show - 01 [DEADBEEF01].mkv"),
            file("[Subs] Solid Show - 02 [DEADBEEF01].mkv"),
            // Lone unstructured file forms a weak group.
            file("vague clip recording.mkv"),
        ];
        let groups = grouper.group_files(&files);
        assert!(groups.len() >= 2);
        let confidences: Vec<f64> = groups
            .iter()
            .map(|g| g.evidence.as_ref().map(|e| e.confidence).unwrap_or(0.0))
            .collect();
        let mut sorted = confidences.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(confidences, sorted);
    }

    #[test]
    fn test_collapse_duplicates_builds_new_group() {
        let original = Group::new(
            "Show",
            vec![
                file("Show.S01E01.720p.HDTV.mkv"),
                file("Show.S01E01.1080p.BluRay.mkv"),
            ],
        );
        let collapsed = collapse_duplicates(&original);
        assert_eq!(collapsed.files.len(), 1);
        // Original group is untouched.
        assert_eq!(original.files.len(), 2);
    }
}
