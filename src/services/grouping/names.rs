//! Duplicate resolution and group name management
//!
//! Post-processing for the grouping pipeline: collapse duplicate files for
//! the same episode to the best copy, and keep group names unique while
//! folding "(N)"-suffixed variants of one base name back together.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::services::filename_parser::ScannedFile;

static NUMERIC_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*?)\s*\((\d+)\)$").unwrap());

/// Pick the single file to keep from a set of duplicates.
///
/// Ranking: resolution, then source, then parser confidence, then the
/// lexicographically smallest path so the result is deterministic. Always
/// returns one of the inputs; `None` only for an empty slice.
pub fn resolve_duplicates(files: &[ScannedFile]) -> Option<&ScannedFile> {
    let best = files.iter().max_by(|a, b| {
        duplicate_score(a)
            .partial_cmp(&duplicate_score(b))
            .unwrap_or(std::cmp::Ordering::Equal)
            // Reverse path order so max_by keeps the smaller path on ties.
            .then_with(|| b.path.cmp(&a.path))
    })?;

    if files.len() > 1 {
        debug!(
            keeping = %best.path,
            duplicates = files.len() - 1,
            "Resolved duplicate set"
        );
    }
    Some(best)
}

fn duplicate_score(file: &ScannedFile) -> f64 {
    let resolution = match file.parsed.quality.as_deref() {
        Some("2160p") => 4000.0,
        Some("1080p") => 3000.0,
        Some("720p") => 2000.0,
        Some("480p") => 1000.0,
        _ => 0.0,
    };
    let source = match file.parsed.source.as_deref() {
        Some("BluRay") => 300.0,
        Some("WEB-DL") => 250.0,
        Some("WEBRip") => 200.0,
        Some("HDTV") => 100.0,
        _ => 0.0,
    };
    resolution + source + file.parsed.confidence * 100.0
}

/// Return `name`, or `name (N)` with the smallest N that is not yet a key
/// in `existing`. Never returns a name already present.
pub fn ensure_unique_group_name(
    name: &str,
    existing: &BTreeMap<String, Vec<ScannedFile>>,
) -> String {
    if !existing.contains_key(name) {
        return name.to_string();
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("{} ({})", name, n);
        if !existing.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Strip a trailing " (N)" suffix.
pub fn base_group_name(name: &str) -> String {
    NUMERIC_SUFFIX_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Merge groups whose names share a base once numeric suffixes are
/// stripped. Single O(n) pass over a base-name map, not pairwise
/// comparison. Uniqueness is re-applied through the map itself: same-base
/// entries merge instead of colliding.
pub fn merge_similar_group_names(
    groups: BTreeMap<String, Vec<ScannedFile>>,
) -> BTreeMap<String, Vec<ScannedFile>> {
    let mut merged: BTreeMap<String, Vec<ScannedFile>> = BTreeMap::new();
    for (name, files) in groups {
        let base = base_group_name(&name);
        merged.entry(base).or_default().extend(files);
    }
    merged
}
