//! Curator - metadata matching and multi-signal grouping for media libraries
//!
//! Reconciles locally scanned media files with an external metadata catalog
//! and clusters related files into coherent release groups.
//!
//! Two subsystems do the heavy lifting:
//! - the [`services::matching_engine::MatchingEngine`] scores catalog
//!   candidates against a parsed filename and resolves the single best
//!   match under uncertainty, and
//! - the [`services::grouping::FileGrouper`] clusters scanned files into
//!   title-level groups from independent signals (textual similarity,
//!   shared release hashes, season/episode proximity), combined under a
//!   pluggable strategy with explainable evidence on every decision.
//!
//! Matching is asynchronous only at the external catalog call; everything
//! else is synchronous and CPU-bound. Component failures degrade (no
//! candidates, cache miss, neutral score) rather than propagate; only
//! construction-time misconfiguration returns errors.

pub mod config;
pub mod services;

pub use config::Config;
pub use services::{
    ConfidenceLevel, ConfidenceScorer, FileGrouper, Group, GroupingEngine, GroupingStrategy,
    MatchOutcome, MatchingEngine, Matcher, MetadataCandidate, ParsedFileRecord, ScannedFile,
    SearchService,
};
