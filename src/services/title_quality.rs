//! Title quality scoring
//!
//! Ranks alternative spellings of the same release title so matchers and
//! duplicate resolution can pick a representative name. Scores are relative
//! only; there is no meaningful absolute scale.

use once_cell::sync::Lazy;
use regex::Regex;

/// Length window considered a "good" human title.
const GOOD_LENGTH_MIN: usize = 3;
const GOOD_LENGTH_MAX: usize = 60;
const LENGTH_BONUS: i32 = 10;
const LENGTH_PENALTY: i32 = 5;

/// Penalty applied once per technical-pattern hit.
const TECHNICAL_PENALTY: i32 = 8;

/// Special characters above this count smell like an unclean release name.
const SPECIAL_CHAR_THRESHOLD: usize = 3;
const SPECIAL_CHAR_PENALTY: i32 = 6;

const TITLE_CASE_BONUS: i32 = 5;
const NATIVE_SCRIPT_BONUS: i32 = 8;

/// Score gap below which two titles are considered equivalent.
const SIGNIFICANCE_THRESHOLD: i32 = 10;

/// A shorter title is only preferred when it keeps at least this fraction
/// of the longer one's length.
const MIN_LENGTH_RATIO: f64 = 0.5;

static TECHNICAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\b(2160p|1080p|720p|480p|4K|UHD)\b").unwrap(),
        Regex::new(r"(?i)\b(x264|x265|h\.?264|h\.?265|HEVC|AV1|XviD)\b").unwrap(),
        Regex::new(r"(?i)\b(BluRay|WEB-?DL|WEBRip|HDTV|DVDRip|REMUX)\b").unwrap(),
        Regex::new(r"\[[^\]]+\]").unwrap(),
    ]
});

/// Score a candidate title. Higher is better; only comparisons between
/// scores of the same run are meaningful.
pub fn title_quality_score(title: &str) -> i32 {
    let mut score = 0i32;
    let len = title.chars().count();

    if (GOOD_LENGTH_MIN..=GOOD_LENGTH_MAX).contains(&len) {
        score += LENGTH_BONUS;
    } else {
        score -= LENGTH_PENALTY;
    }

    for pattern in TECHNICAL_PATTERNS.iter() {
        score -= TECHNICAL_PENALTY * pattern.find_iter(title).count() as i32;
    }

    let special_chars = title
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace() && *c != '\'' && *c != ':')
        .count();
    if special_chars > SPECIAL_CHAR_THRESHOLD {
        score -= SPECIAL_CHAR_PENALTY;
    }

    if is_title_case(title) {
        score += TITLE_CASE_BONUS;
    }

    if has_native_script(title) {
        score += NATIVE_SCRIPT_BONUS;
    }

    score
}

/// Pick the better of two titles.
///
/// A score gap of at least the significance threshold wins outright.
/// Otherwise the shorter title is preferred, unless it is less than half
/// the length of the longer one. Ties keep the first argument.
pub fn select_better_title<'a>(a: &'a str, b: &'a str) -> &'a str {
    let score_a = title_quality_score(a);
    let score_b = title_quality_score(b);

    if (score_a - score_b).abs() >= SIGNIFICANCE_THRESHOLD {
        return if score_a >= score_b { a } else { b };
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == len_b {
        return a;
    }
    let (shorter, longer, shorter_len, longer_len) = if len_a < len_b {
        (a, b, len_a, len_b)
    } else {
        (b, a, len_b, len_a)
    };
    if longer_len > 0 && (shorter_len as f64 / longer_len as f64) >= MIN_LENGTH_RATIO {
        shorter
    } else {
        longer
    }
}

/// True when every alphabetic word starts uppercase.
fn is_title_case(title: &str) -> bool {
    let mut saw_word = false;
    for word in title.split_whitespace() {
        if let Some(first) = word.chars().find(|c| c.is_alphabetic()) {
            saw_word = true;
            if !first.is_uppercase() {
                return false;
            }
        }
    }
    saw_word
}

/// True when the title carries Han or Kana characters.
fn has_native_script(title: &str) -> bool {
    title.chars().any(|c| {
        let cp = c as u32;
        // CJK Unified Ideographs, Hiragana, Katakana
        (0x4E00..=0x9FFF).contains(&cp)
            || (0x3040..=0x309F).contains(&cp)
            || (0x30A0..=0x30FF).contains(&cp)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_title_beats_technical_noise() {
        let clean = "Attack on Titan";
        let noisy = "Attack on Titan 1080p x265 [Group]";
        assert!(title_quality_score(clean) > title_quality_score(noisy));
        assert_eq!(select_better_title(clean, noisy), clean);
    }

    #[test]
    fn test_title_case_bonus() {
        assert!(title_quality_score("Attack on Titan") > title_quality_score("attack on titan"));
    }

    #[test]
    fn test_native_script_bonus() {
        assert!(title_quality_score("進撃の巨人") > title_quality_score("x"));
    }

    #[test]
    fn test_close_scores_prefer_shorter() {
        // Same quality profile, one slightly longer.
        assert_eq!(
            select_better_title("Attack on Titan", "Attack on Titan Final"),
            "Attack on Titan"
        );
    }

    #[test]
    fn test_shorter_not_below_length_ratio() {
        // "AoT" is far below half the length of the full title.
        assert_eq!(select_better_title("AoT", "Attack on Titan"), "Attack on Titan");
    }

    #[test]
    fn test_tie_keeps_first_argument() {
        // Equal length, equal score profile.
        assert_eq!(select_better_title("Attack on Titan", "Shingeki Kyojin"), "Attack on Titan");
    }
}
