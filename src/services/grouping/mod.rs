//! Multi-signal file grouping
//!
//! Clusters scanned files into title-level release groups. Three
//! independent matchers each produce a candidate partition; a combination
//! strategy folds them into one final partition with explainable evidence
//! attached to every group.

pub mod engine;
pub mod matchers;
pub mod names;
pub mod strategy;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::filename_parser::ScannedFile;

pub use engine::{FileGrouper, GroupingEngine, GroupingError, WeightedMatcher};
pub use matchers::Matcher;
pub use strategy::{GroupingStrategy, MatcherResult};

/// One cluster of related files.
///
/// Groups are assembled during a run and frozen once returned; duplicate
/// resolution constructs a replacement `Group` rather than mutating the
/// file list of one already handed out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub title: String,
    pub files: Vec<ScannedFile>,
    pub evidence: Option<GroupingEvidence>,
}

impl Group {
    pub fn new(title: impl Into<String>, files: Vec<ScannedFile>) -> Self {
        Self {
            title: title.into(),
            files,
            evidence: None,
        }
    }

    pub fn with_evidence(
        title: impl Into<String>,
        files: Vec<ScannedFile>,
        evidence: GroupingEvidence,
    ) -> Self {
        Self {
            title: title.into(),
            files,
            evidence: Some(evidence),
        }
    }
}

/// Why a group exists: which matchers contributed and how strongly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingEvidence {
    /// Matcher name → its configured weight, for every contributor.
    pub match_scores: BTreeMap<String, f64>,
    /// Matchers whose partitions backed this group.
    pub selected_matchers: Vec<String>,
    pub explanation: String,
    /// Combined confidence in [0,1].
    pub confidence: f64,
}
