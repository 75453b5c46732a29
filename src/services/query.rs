//! Normalized search queries
//!
//! Converts a parsed filename record into the canonical title/year/language
//! tuple the scorer and search service operate on. Queries are ephemeral
//! and recomputed per match attempt.

use serde::{Deserialize, Serialize};

use super::filename_parser::ParsedFileRecord;
use super::text_utils;

/// Detected query language, derived from the title's script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ja,
    Ko,
    En,
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Ja => "ja",
            Language::Ko => "ko",
            Language::En => "en",
            Language::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical query tuple built from a parsed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuery {
    pub title: String,
    pub year: Option<i32>,
    pub language: Language,
}

impl NormalizedQuery {
    /// Build a query from a parsed record. Returns `None` when no usable
    /// title survives normalization.
    pub fn from_record(record: &ParsedFileRecord) -> Option<Self> {
        let title = text_utils::normalize_punctuation(record.title.trim());
        if title.is_empty() {
            return None;
        }
        let language = detect_language(&title);
        Some(Self {
            title,
            year: record.year,
            language,
        })
    }
}

/// Detect the dominant script of a title.
/// Kana or Han ⇒ Japanese, Hangul ⇒ Korean, ASCII letters ⇒ English.
pub fn detect_language(title: &str) -> Language {
    let mut saw_ascii = false;
    for c in title.chars() {
        let cp = c as u32;
        if (0x3040..=0x309F).contains(&cp)
            || (0x30A0..=0x30FF).contains(&cp)
            || (0x4E00..=0x9FFF).contains(&cp)
        {
            return Language::Ja;
        }
        if (0xAC00..=0xD7AF).contains(&cp) || (0x1100..=0x11FF).contains(&cp) {
            return Language::Ko;
        }
        if c.is_ascii_alphabetic() {
            saw_ascii = true;
        }
    }
    if saw_ascii { Language::En } else { Language::Unknown }
}
