//! Grouping matchers
//!
//! Each matcher clusters files by one independent signal. They are modeled
//! as a closed set of tagged variants rather than open trait objects, so
//! combination logic can be tested exhaustively. Within one matcher call a
//! file lands in at most one group.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::Group;
use crate::services::filename_parser::ScannedFile;
use crate::services::text_utils;
use crate::services::title_quality;

/// Default cleaned-title similarity required to join a title cluster.
pub const DEFAULT_TITLE_THRESHOLD: f64 = 0.75;

/// Ordered cleaning passes applied to a file name before title comparison.
/// Order matters: bracketed tags go first so release-group names never leak
/// into the similarity comparison.
static CLEANING_PASSES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // File extension
        Regex::new(r"(?i)\.(mkv|mp4|avi|mov|wmv|ts|m2ts|webm|flv|srt|ass)$").unwrap(),
        // Bracketed release tags: [SubGroup], (2013), {x265}
        Regex::new(r"\[[^\]]*\]|\([^)]*\)|\{[^}]*\}").unwrap(),
        // Resolution / source / codec tokens
        Regex::new(r"(?i)\b(2160p|1080p|720p|480p|4K|UHD|BluRay|BDRip|WEB-?DL|WEBRip|HDTV|DVDRip|x264|x265|h\.?264|h\.?265|HEVC|AV1|AAC|FLAC|DTS|REMUX|REPACK|PROPER)\b").unwrap(),
        // Season/episode markers
        Regex::new(r"(?i)\bS\d{1,2}\s*E\d{1,3}\b").unwrap(),
        Regex::new(r"(?i)\b\d{1,2}x\d{2,3}\b").unwrap(),
        Regex::new(r"(?i)\bSeason\s*\d{1,2}\b").unwrap(),
        Regex::new(r"(?i)\bEpisode\s*\d{1,3}\b").unwrap(),
        Regex::new(r"\s*-\s*\d{1,3}\s*$").unwrap(),
        // Release group suffix: "-GROUP" at end
        Regex::new(r"-[A-Za-z0-9]+$").unwrap(),
    ]
});

/// A clustering signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Cleaned-filename textual similarity above a threshold.
    TitleSimilarity { threshold: f64 },
    /// Identical embedded release hashes; authoritative when present.
    HashSimilarity,
    /// Shared (title, season) regardless of quality or codec variance.
    SeasonEpisode,
}

impl Matcher {
    pub fn title_similarity() -> Self {
        Matcher::TitleSimilarity {
            threshold: DEFAULT_TITLE_THRESHOLD,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Matcher::TitleSimilarity { .. } => "title_similarity",
            Matcher::HashSimilarity => "hash_similarity",
            Matcher::SeasonEpisode => "season_episode",
        }
    }

    /// Cluster the files by this matcher's signal.
    pub fn run(&self, files: &[ScannedFile]) -> Vec<Group> {
        match self {
            Matcher::TitleSimilarity { threshold } => run_title_similarity(files, *threshold),
            Matcher::HashSimilarity => run_hash_similarity(files),
            Matcher::SeasonEpisode => run_season_episode(files),
        }
    }
}

/// Clean a file name for title comparison, falling back to the
/// parser-extracted title when cleaning leaves nothing.
pub fn clean_for_comparison(file: &ScannedFile) -> String {
    let mut cleaned = file.file_name.clone();
    for pass in CLEANING_PASSES.iter() {
        cleaned = pass.replace_all(&cleaned, " ").to_string();
    }
    let cleaned = cleaned
        .replace(['.', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if cleaned.is_empty() {
        file.parsed.title.clone()
    } else {
        cleaned
    }
}

struct TitleCluster {
    representative: String,
    files: Vec<ScannedFile>,
}

fn run_title_similarity(files: &[ScannedFile], threshold: f64) -> Vec<Group> {
    let mut clusters: Vec<TitleCluster> = Vec::new();

    for file in files {
        let cleaned = clean_for_comparison(file);
        if cleaned.is_empty() {
            continue;
        }

        let joined = clusters.iter_mut().find(|cluster| {
            text_utils::title_similarity(&cluster.representative, &cleaned) >= threshold
        });
        match joined {
            Some(cluster) => {
                // Quality scoring keeps the better spelling as the
                // representative.
                cluster.representative =
                    title_quality::select_better_title(&cluster.representative, &cleaned)
                        .to_string();
                cluster.files.push(file.clone());
            }
            None => clusters.push(TitleCluster {
                representative: cleaned,
                files: vec![file.clone()],
            }),
        }
    }

    clusters
        .into_iter()
        .map(|cluster| Group::new(cluster.representative, cluster.files))
        .collect()
}

fn run_hash_similarity(files: &[ScannedFile]) -> Vec<Group> {
    let mut by_hash: BTreeMap<String, Vec<ScannedFile>> = BTreeMap::new();
    for file in files {
        if let Some(hash) = &file.parsed.release_hash {
            by_hash.entry(hash.clone()).or_default().push(file.clone());
        }
    }

    by_hash
        .into_values()
        .map(|members| {
            let title = representative_title(&members);
            Group::new(title, members)
        })
        .collect()
}

fn run_season_episode(files: &[ScannedFile]) -> Vec<Group> {
    let mut by_key: BTreeMap<(String, Option<u32>), Vec<ScannedFile>> = BTreeMap::new();
    for file in files {
        let title = text_utils::normalize_title(&file.parsed.title);
        if title.is_empty() {
            continue;
        }
        by_key
            .entry((title, file.parsed.season))
            .or_default()
            .push(file.clone());
    }

    by_key
        .into_values()
        .map(|members| {
            let title = representative_title(&members);
            Group::new(title, members)
        })
        .collect()
}

/// Best parsed title across a member set, by title quality.
fn representative_title(members: &[ScannedFile]) -> String {
    members
        .iter()
        .map(|f| f.parsed.title.as_str())
        .filter(|t| !t.is_empty())
        .fold(None::<&str>, |best, t| match best {
            None => Some(t),
            Some(current) => Some(title_quality::select_better_title(current, t)),
        })
        .unwrap_or("Unknown")
        .to_string()
}
