//! Combination strategies for matcher outputs
//!
//! A strategy folds the per-matcher partitions into one final partition.
//! Like the matchers, strategies form a closed set of tagged variants.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::{Group, GroupingEvidence};
use crate::services::filename_parser::ScannedFile;
use crate::services::title_quality;

/// One matcher's full output for a run.
#[derive(Debug, Clone)]
pub struct MatcherResult {
    /// Matcher name, used in evidence.
    pub matcher: String,
    /// Configured weight in (0,1].
    pub weight: f64,
    pub groups: Vec<Group>,
}

/// How matcher outputs are combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroupingStrategy {
    /// The single highest-weighted matcher's partition, verbatim.
    BestMatcher,
    /// Transitive merge of every pairwise co-grouping, via union-find.
    WeightedMerge,
    /// Only file-sets that recur across at least `min_consensus` matchers.
    Consensus { min_consensus: usize },
}

impl Default for GroupingStrategy {
    fn default() -> Self {
        GroupingStrategy::WeightedMerge
    }
}

impl GroupingStrategy {
    /// Combine matcher outputs into the final partition.
    pub fn combine(&self, results: &[MatcherResult]) -> Vec<Group> {
        match self {
            GroupingStrategy::BestMatcher => combine_best_matcher(results),
            GroupingStrategy::WeightedMerge => combine_weighted_merge(results),
            GroupingStrategy::Consensus { min_consensus } => {
                combine_consensus(results, *min_consensus)
            }
        }
    }
}

fn combine_best_matcher(results: &[MatcherResult]) -> Vec<Group> {
    let Some(best) = results
        .iter()
        .max_by(|a, b| a.weight.partial_cmp(&b.weight).unwrap_or(std::cmp::Ordering::Equal))
    else {
        return Vec::new();
    };

    best.groups
        .iter()
        .map(|group| {
            let evidence = GroupingEvidence {
                match_scores: BTreeMap::from([(best.matcher.clone(), best.weight)]),
                selected_matchers: vec![best.matcher.clone()],
                explanation: format!(
                    "best matcher '{}' (weight {:.2}) taken verbatim",
                    best.matcher, best.weight
                ),
                confidence: best.weight.clamp(0.0, 1.0),
            };
            Group::with_evidence(group.title.clone(), group.files.clone(), evidence)
        })
        .collect()
}

/// Union-find over file indices. Replaces repeated fixed-point rescans of
/// the file→group index with near-linear merging.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

fn combine_weighted_merge(results: &[MatcherResult]) -> Vec<Group> {
    // Index every distinct file seen in any matcher output.
    let mut index_of: HashMap<String, usize> = HashMap::new();
    let mut files: Vec<ScannedFile> = Vec::new();
    for result in results {
        for group in &result.groups {
            for file in &group.files {
                index_of.entry(file.path.clone()).or_insert_with(|| {
                    files.push(file.clone());
                    files.len() - 1
                });
            }
        }
    }

    // Two files sharing a group in any matcher end up in one component;
    // membership is transitive through intermediate files.
    let mut uf = UnionFind::new(files.len());
    for result in results {
        for group in &result.groups {
            let mut members = group.files.iter().map(|f| index_of[&f.path]);
            if let Some(first) = members.next() {
                for other in members {
                    uf.union(first, other);
                }
            }
        }
    }

    // Per component: contributing groups, matcher weights, title votes.
    struct Component {
        file_indices: BTreeSet<usize>,
        matcher_weights: BTreeMap<String, f64>,
        title_weights: BTreeMap<String, f64>,
    }

    let mut components: BTreeMap<usize, Component> = BTreeMap::new();
    for i in 0..files.len() {
        let root = uf.find(i);
        components
            .entry(root)
            .or_insert_with(|| Component {
                file_indices: BTreeSet::new(),
                matcher_weights: BTreeMap::new(),
                title_weights: BTreeMap::new(),
            })
            .file_indices
            .insert(i);
    }
    for result in results {
        for group in &result.groups {
            let Some(first) = group.files.first() else {
                continue;
            };
            let root = uf.find(index_of[&first.path]);
            if let Some(component) = components.get_mut(&root) {
                component
                    .matcher_weights
                    .entry(result.matcher.clone())
                    .or_insert(result.weight);
                *component.title_weights.entry(group.title.clone()).or_insert(0.0) +=
                    result.weight;
            }
        }
    }

    let mut merged: Vec<Group> = components
        .into_values()
        .map(|component| {
            // Representative title: highest cumulative matcher weight,
            // quality score breaking exact ties.
            let title = component
                .title_weights
                .iter()
                .fold(None::<(&String, f64)>, |best, (title, weight)| match best {
                    None => Some((title, *weight)),
                    Some((best_title, best_weight)) => {
                        if *weight > best_weight {
                            Some((title, *weight))
                        } else if (*weight - best_weight).abs() < f64::EPSILON
                            && title_quality::select_better_title(best_title, title)
                                == title.as_str()
                        {
                            Some((title, *weight))
                        } else {
                            Some((best_title, best_weight))
                        }
                    }
                })
                .map(|(title, _)| title.clone())
                .unwrap_or_else(|| "Unknown".to_string());

            let weights: Vec<f64> = component.matcher_weights.values().copied().collect();
            let confidence = if weights.is_empty() {
                0.0
            } else {
                (weights.iter().sum::<f64>() / weights.len() as f64).clamp(0.0, 1.0)
            };
            let selected: Vec<String> = component.matcher_weights.keys().cloned().collect();
            let evidence = GroupingEvidence {
                explanation: format!(
                    "merged component of {} file(s) from {}",
                    component.file_indices.len(),
                    selected.join(", ")
                ),
                match_scores: component.matcher_weights,
                selected_matchers: selected,
                confidence,
            };

            let members: Vec<ScannedFile> = component
                .file_indices
                .iter()
                .map(|&i| files[i].clone())
                .collect();
            Group::with_evidence(title, members, evidence)
        })
        .collect();

    merged.sort_by(|a, b| {
        let ca = a.evidence.as_ref().map(|e| e.confidence).unwrap_or(0.0);
        let cb = b.evidence.as_ref().map(|e| e.confidence).unwrap_or(0.0);
        cb.partial_cmp(&ca)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.title.cmp(&b.title))
    });
    merged
}

fn combine_consensus(results: &[MatcherResult], min_consensus: usize) -> Vec<Group> {
    let total_matchers = results.len();
    if total_matchers == 0 {
        return Vec::new();
    }
    let min_consensus = min_consensus.max(1);

    // Exact recurring file-sets, keyed by their sorted member paths.
    struct SetEntry {
        files: Vec<ScannedFile>,
        titles: Vec<String>,
        matcher_weights: BTreeMap<String, f64>,
    }

    let mut sets: BTreeMap<Vec<String>, SetEntry> = BTreeMap::new();
    for result in results {
        for group in &result.groups {
            if group.files.is_empty() {
                continue;
            }
            let mut key: Vec<String> = group.files.iter().map(|f| f.path.clone()).collect();
            key.sort();
            key.dedup();
            let entry = sets.entry(key).or_insert_with(|| SetEntry {
                files: group.files.clone(),
                titles: Vec::new(),
                matcher_weights: BTreeMap::new(),
            });
            entry.titles.push(group.title.clone());
            entry
                .matcher_weights
                .entry(result.matcher.clone())
                .or_insert(result.weight);
        }
    }

    let mut groups: Vec<Group> = sets
        .into_values()
        .filter(|entry| entry.matcher_weights.len() >= min_consensus)
        .map(|entry| {
            let contributing = entry.matcher_weights.len();
            let weight_sum: f64 = entry.matcher_weights.values().sum();
            let confidence =
                (weight_sum * contributing as f64 / total_matchers as f64).clamp(0.0, 1.0);

            let title = entry
                .titles
                .iter()
                .fold(None::<&str>, |best, t| match best {
                    None => Some(t),
                    Some(current) => Some(title_quality::select_better_title(current, t)),
                })
                .unwrap_or("Unknown")
                .to_string();

            let selected: Vec<String> = entry.matcher_weights.keys().cloned().collect();
            let evidence = GroupingEvidence {
                explanation: format!(
                    "{}/{} matchers agree on this exact file set",
                    contributing, total_matchers
                ),
                match_scores: entry.matcher_weights,
                selected_matchers: selected,
                confidence,
            };
            Group::with_evidence(title, entry.files, evidence)
        })
        .collect();

    groups.sort_by(|a, b| {
        let ca = a.evidence.as_ref().map(|e| e.confidence).unwrap_or(0.0);
        let cb = b.evidence.as_ref().map(|e| e.confidence).unwrap_or(0.0);
        cb.partial_cmp(&ca)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.title.cmp(&b.title))
    });
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::filename_parser::ScannedFile;

    fn file(name: &str) -> ScannedFile {
        ScannedFile::from_path(name)
    }

    fn result(matcher: &str, weight: f64, groups: Vec<Group>) -> MatcherResult {
        MatcherResult {
            matcher: matcher.to_string(),
            weight,
            groups,
        }
    }

    #[test]
    fn test_best_matcher_takes_highest_weight_verbatim() {
        let f1 = file("a.mkv");
        let f2 = file("b.mkv");
        let results = vec![
            result("weak", 0.4, vec![Group::new("Weak View", vec![f1.clone(), f2.clone()])]),
            result(
                "strong",
                0.9,
                vec![
                    Group::new("Strong A", vec![f1.clone()]),
                    Group::new("Strong B", vec![f2.clone()]),
                ],
            ),
        ];

        let combined = GroupingStrategy::BestMatcher.combine(&results);
        assert_eq!(combined.len(), 2);
        for group in &combined {
            let evidence = group.evidence.as_ref().unwrap();
            assert_eq!(evidence.selected_matchers, vec!["strong".to_string()]);
            assert_eq!(evidence.match_scores.len(), 1);
        }
    }

    #[test]
    fn test_weighted_merge_is_transitive() {
        let f1 = file("f1.mkv");
        let f2 = file("f2.mkv");
        let f3 = file("f3.mkv");
        // Matcher A groups {f1,f2}, matcher B groups {f2,f3}: one component.
        let results = vec![
            result("a", 0.8, vec![Group::new("T", vec![f1.clone(), f2.clone()])]),
            result("b", 0.6, vec![Group::new("T", vec![f2.clone(), f3.clone()])]),
        ];

        let combined = GroupingStrategy::WeightedMerge.combine(&results);
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].files.len(), 3);
        let evidence = combined[0].evidence.as_ref().unwrap();
        assert_eq!(evidence.selected_matchers.len(), 2);
        assert!((evidence.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_merge_title_by_cumulative_weight() {
        let f1 = file("f1.mkv");
        let f2 = file("f2.mkv");
        let results = vec![
            result("a", 0.5, vec![Group::new("Title Alpha", vec![f1.clone(), f2.clone()])]),
            result("b", 0.3, vec![Group::new("Title Beta", vec![f1.clone(), f2.clone()])]),
            result("c", 0.3, vec![Group::new("Title Beta", vec![f1.clone(), f2.clone()])]),
        ];

        let combined = GroupingStrategy::WeightedMerge.combine(&results);
        assert_eq!(combined.len(), 1);
        // Beta accumulates 0.6 across two matchers, Alpha only 0.5.
        assert_eq!(combined[0].title, "Title Beta");
    }

    #[test]
    fn test_weighted_merge_sorted_by_confidence() {
        let f1 = file("f1.mkv");
        let f2 = file("f2.mkv");
        let results = vec![
            result("strong", 0.9, vec![Group::new("A", vec![f1.clone()])]),
            result("weak", 0.2, vec![Group::new("B", vec![f2.clone()])]),
        ];
        let combined = GroupingStrategy::WeightedMerge.combine(&results);
        assert_eq!(combined.len(), 2);
        let c0 = combined[0].evidence.as_ref().unwrap().confidence;
        let c1 = combined[1].evidence.as_ref().unwrap().confidence;
        assert!(c0 >= c1);
    }

    #[test]
    fn test_consensus_excludes_single_matcher_sets() {
        let f1 = file("f1.mkv");
        let f2 = file("f2.mkv");
        let results = vec![
            result("a", 0.8, vec![Group::new("T", vec![f1.clone(), f2.clone()])]),
            result("b", 0.6, vec![]),
            result("c", 0.4, vec![]),
        ];

        let combined = GroupingStrategy::Consensus { min_consensus: 2 }.combine(&results);
        assert!(combined.is_empty());
    }

    #[test]
    fn test_consensus_includes_unanimous_sets() {
        let f1 = file("f1.mkv");
        let f2 = file("f2.mkv");
        let set = vec![f1.clone(), f2.clone()];
        let results = vec![
            result("a", 0.8, vec![Group::new("T", set.clone())]),
            result("b", 0.6, vec![Group::new("T", set.clone())]),
            result("c", 0.4, vec![Group::new("T", set.clone())]),
        ];

        let combined = GroupingStrategy::Consensus { min_consensus: 2 }.combine(&results);
        assert_eq!(combined.len(), 1);
        let evidence = combined[0].evidence.as_ref().unwrap();
        // (0.8 + 0.6 + 0.4) × (3/3) = 1.8, clamped to 1.0.
        assert_eq!(evidence.confidence, 1.0);
        assert_eq!(evidence.selected_matchers.len(), 3);
    }

    #[test]
    fn test_consensus_partial_agreement_confidence() {
        let f1 = file("f1.mkv");
        let set = vec![f1.clone()];
        let results = vec![
            result("a", 0.6, vec![Group::new("T", set.clone())]),
            result("b", 0.3, vec![Group::new("T", set.clone())]),
            result("c", 0.4, vec![]),
        ];

        let combined = GroupingStrategy::Consensus { min_consensus: 2 }.combine(&results);
        assert_eq!(combined.len(), 1);
        let evidence = combined[0].evidence.as_ref().unwrap();
        // (0.6 + 0.3) × (2/3) = 0.6.
        assert!((evidence.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_empty_results_combine_to_empty() {
        for strategy in [
            GroupingStrategy::BestMatcher,
            GroupingStrategy::WeightedMerge,
            GroupingStrategy::Consensus { min_consensus: 2 },
        ] {
            assert!(strategy.combine(&[]).is_empty());
        }
    }
}
