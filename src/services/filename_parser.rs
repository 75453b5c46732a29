//! Filename parser for scene-style release names
//!
//! Parses filenames like:
//! - "Chicago Fire S14E08 1080p WEB h264-ETHEL"
//! - "The.Expanse.2x03.720p.WEB-DL.mkv"
//! - "[SubGroup] Attack on Titan - 05 [1080p][ABCD1234].mkv"
//!
//! Parsing is best-effort: fields that cannot be extracted stay `None` and
//! the record's `confidence` reflects how much structure was recognized.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::text_utils;

/// Parsed information extracted from one scanned filename.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedFileRecord {
    /// Full path (or bare filename) the record was parsed from.
    pub file_path: String,
    /// Cleaned title, empty when nothing usable was recognized.
    pub title: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub year: Option<i32>,
    /// Resolution token, e.g. "1080p".
    pub quality: Option<String>,
    /// Source token, e.g. "BluRay", "WEB-DL".
    pub source: Option<String>,
    /// Embedded release hash (>= 8 hex chars in brackets), if any.
    pub release_hash: Option<String>,
    /// Parser confidence in [0,1]: how much structure was recognized.
    pub confidence: f64,
}

/// A scanned media file handed to the grouping engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedFile {
    /// Full path as reported by the scanner.
    pub path: String,
    /// File name component, without directories.
    pub file_name: String,
    /// Best-effort parse of the file name.
    pub parsed: ParsedFileRecord,
}

impl ScannedFile {
    /// Parse a scanned path into a `ScannedFile`.
    pub fn from_path(path: &str) -> Self {
        let file_name = path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(path)
            .to_string();
        let mut parsed = parse_file(&file_name);
        parsed.file_path = path.to_string();
        Self {
            path: path.to_string(),
            file_name,
            parsed,
        }
    }
}

static EXTENSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(mkv|mp4|avi|mov|wmv|ts|m2ts|webm|flv|srt|ass)$").unwrap());

static SXXEXX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(.+?)\s*[Ss](\d{1,2})[Ee](\d{1,3})").unwrap());
static NXNN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(.+?)\s*(\d{1,2})x(\d{2})").unwrap());
static VERBOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(.+?)\s*Season\s*(\d{1,2}).*?Episode\s*(\d{1,3})").unwrap());
static EPISODE_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(.+?)\s*Episode\s*(\d{1,3})").unwrap());
/// Anime layout: "[Group] Title - 05" with optional trailing tags.
static ANIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[[^\]]+\]\s*(.+?)\s*-\s*(\d{1,3})(?:\s|\[|\(|$)").unwrap());
/// Bare trailing episode: "Title - 05".
static TRAILING_EP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s+-\s+(\d{1,3})$").unwrap());

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());
static RESOLUTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(2160p|1080p|720p|480p|4K|UHD)\b").unwrap());
static RELEASE_HASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([0-9A-Fa-f]{8,})\]").unwrap());

/// Tokens removed when cleaning a title for display/matching.
static TITLE_NOISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(2160p|1080p|720p|480p|4K|UHD|BluRay|BDRip|WEB-?DL|WEBRip|HDTV|DVDRip|BRRip|HDRip|x264|x265|h\.?264|h\.?265|HEVC|AV1|AAC|FLAC|DTS|DDP?[0-9. ]*|Atmos|REMUX|REPACK|PROPER)\b",
    )
    .unwrap()
});
static TRAILING_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[\(\[]?(19\d{2}|20\d{2})[\)\]]?\s*$").unwrap());

/// Parse a filename into a `ParsedFileRecord`.
///
/// Tries patterns in order of specificity: `S01E05`, `1x05`,
/// `Season 1 Episode 5`, the bracketed anime layout, `Episode 5`, then a
/// bare trailing `- 05`. Falls back to a cleaned title with no
/// season/episode info.
pub fn parse_file(filename: &str) -> ParsedFileRecord {
    let mut record = ParsedFileRecord {
        file_path: filename.to_string(),
        ..Default::default()
    };

    let without_ext = EXTENSION_RE.replace(filename, "").to_string();

    // Release hash and quality come from the raw name, before separators
    // are collapsed.
    record.release_hash = RELEASE_HASH_RE
        .captures(&without_ext)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase());
    if let Some(caps) = RESOLUTION_RE.captures(&without_ext) {
        let res = caps.get(1).map(|m| m.as_str().to_uppercase()).unwrap_or_default();
        record.quality = Some(match res.as_str() {
            "4K" | "UHD" => "2160p".to_string(),
            _ => res.to_lowercase(),
        });
    }
    record.source = parse_source(&without_ext);

    // The anime layout is matched on the raw name because the leading
    // bracket group is structural there.
    let mut structured = true;
    if let Some(caps) = ANIME_RE.captures(&without_ext) {
        record.title = clean_title(caps.get(1).map(|m| m.as_str()).unwrap_or_default());
        record.episode = caps.get(2).and_then(|m| m.as_str().parse().ok());
    } else {
        let cleaned = without_ext.replace(['.', '_'], " ");
        if let Some(caps) = SXXEXX_RE.captures(&cleaned) {
            record.title = clean_title(caps.get(1).map(|m| m.as_str()).unwrap_or_default());
            record.season = caps.get(2).and_then(|m| m.as_str().parse().ok());
            record.episode = caps.get(3).and_then(|m| m.as_str().parse().ok());
        } else if let Some(caps) = NXNN_RE.captures(&cleaned) {
            record.title = clean_title(caps.get(1).map(|m| m.as_str()).unwrap_or_default());
            record.season = caps.get(2).and_then(|m| m.as_str().parse().ok());
            record.episode = caps.get(3).and_then(|m| m.as_str().parse().ok());
        } else if let Some(caps) = VERBOSE_RE.captures(&cleaned) {
            record.title = clean_title(caps.get(1).map(|m| m.as_str()).unwrap_or_default());
            record.season = caps.get(2).and_then(|m| m.as_str().parse().ok());
            record.episode = caps.get(3).and_then(|m| m.as_str().parse().ok());
        } else if let Some(caps) = EPISODE_WORD_RE.captures(&cleaned) {
            record.title = clean_title(caps.get(1).map(|m| m.as_str()).unwrap_or_default());
            record.episode = caps.get(2).and_then(|m| m.as_str().parse().ok());
        } else if let Some(caps) = TRAILING_EP_RE.captures(cleaned.trim()) {
            record.title = clean_title(caps.get(1).map(|m| m.as_str()).unwrap_or_default());
            record.episode = caps.get(2).and_then(|m| m.as_str().parse().ok());
        } else {
            structured = false;
            record.title = clean_title(&cleaned);
        }
    }

    // Year is extracted from the raw name so "(2013)" still counts after
    // title cleaning removed it.
    record.year = YEAR_RE
        .captures(&without_ext)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());

    record.confidence = parse_confidence(&record, structured);

    debug!(
        filename = filename,
        title = %record.title,
        season = ?record.season,
        episode = ?record.episode,
        year = ?record.year,
        confidence = record.confidence,
        "Parsed filename"
    );

    record
}

/// Clean a raw title capture: strip noise tokens, bracketed tags, trailing
/// year markers and separator runs.
pub fn clean_title(raw: &str) -> String {
    let no_brackets = text_utils::strip_bracketed(raw);
    let no_noise = TITLE_NOISE_RE.replace_all(&no_brackets, " ");
    let no_year = TRAILING_YEAR_RE.replace(no_noise.trim(), "");
    no_year
        .replace(['.', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == '-' || c.is_whitespace())
        .to_string()
}

fn parse_source(name: &str) -> Option<String> {
    let upper = name.to_uppercase();
    if upper.contains("BLURAY") || upper.contains("BLU-RAY") || upper.contains("BDRIP") {
        Some("BluRay".to_string())
    } else if upper.contains("WEB-DL") || upper.contains("WEBDL") {
        Some("WEB-DL".to_string())
    } else if upper.contains("WEBRIP") {
        Some("WEBRip".to_string())
    } else if upper.contains("HDTV") {
        Some("HDTV".to_string())
    } else if upper.contains("DVDRIP") {
        Some("DVDRip".to_string())
    } else {
        None
    }
}

/// Confidence heuristic: structured season/episode parses rank highest,
/// title+year next, bare titles lowest.
fn parse_confidence(record: &ParsedFileRecord, structured: bool) -> f64 {
    if record.title.is_empty() {
        return 0.1;
    }
    let base: f64 = if structured && record.season.is_some() && record.episode.is_some() {
        0.9
    } else if structured {
        0.8
    } else if record.year.is_some() {
        0.7
    } else {
        0.5
    };
    let quality_bonus = if record.quality.is_some() { 0.05 } else { 0.0 };
    (base + quality_bonus).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sxxexx() {
        let record = parse_file("Chicago Fire S14E08 1080p WEB h264-ETHEL.mkv");
        assert_eq!(record.title, "Chicago Fire");
        assert_eq!(record.season, Some(14));
        assert_eq!(record.episode, Some(8));
        assert_eq!(record.quality.as_deref(), Some("1080p"));
        assert!(record.confidence >= 0.9);
    }

    #[test]
    fn test_parse_dotted_nxnn() {
        let record = parse_file("The.Expanse.2x03.720p.WEB-DL.mkv");
        assert_eq!(record.title, "The Expanse");
        assert_eq!(record.season, Some(2));
        assert_eq!(record.episode, Some(3));
        assert_eq!(record.source.as_deref(), Some("WEB-DL"));
    }

    #[test]
    fn test_parse_anime_layout() {
        let record = parse_file("[SubGroup] Attack on Titan - 05 [1080p][ABCD1234].mkv");
        assert_eq!(record.title, "Attack on Titan");
        assert_eq!(record.season, None);
        assert_eq!(record.episode, Some(5));
        assert_eq!(record.quality.as_deref(), Some("1080p"));
        assert_eq!(record.release_hash.as_deref(), Some("ABCD1234"));
    }

    #[test]
    fn test_parse_movie_with_year() {
        let record = parse_file("The Matrix (1999) 1080p BluRay.mkv");
        assert_eq!(record.title, "The Matrix");
        assert_eq!(record.year, Some(1999));
        assert_eq!(record.source.as_deref(), Some("BluRay"));
        assert_eq!(record.season, None);
    }

    #[test]
    fn test_parse_unstructured() {
        let record = parse_file("random clip.mkv");
        assert_eq!(record.title, "random clip");
        assert_eq!(record.episode, None);
        assert!(record.confidence < 0.7);
    }

    #[test]
    fn test_release_hash_requires_hex() {
        let record = parse_file("[SubGroup] Show - 01 [NOTAHASH].mkv");
        assert_eq!(record.release_hash, None);

        let record = parse_file("[SubGroup] Show - 01 [DEADBEEF01].mkv");
        assert_eq!(record.release_hash.as_deref(), Some("DEADBEEF01"));
    }

    #[test]
    fn test_scanned_file_from_path() {
        let file = ScannedFile::from_path("/media/tv/Show.S01E02.mkv");
        assert_eq!(file.file_name, "Show.S01E02.mkv");
        assert_eq!(file.parsed.title, "Show");
        assert_eq!(file.parsed.file_path, "/media/tv/Show.S01E02.mkv");
    }
}
