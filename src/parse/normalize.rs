//! Field normalization and event keying
//!
//! Raw extracted text becomes the canonical event field set here: whitespace
//! cleanup, date and buy-in parsing, game-type detection, and the two hashes
//! that drive diffing — the stable key (identity across runs) and the content
//! hash (change detection).

use chrono::{Datelike, NaiveDate};
use sha2::{Digest, Sha256};

/// Parse confidence for an extracted event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confidence {
    /// Every field came from a directly labeled value
    High,

    /// At least one field was inferred by a fallback heuristic
    Low,
}

impl Confidence {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Collapses runs of whitespace and trims
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form of a name for keying: lowercase, collapsed whitespace
pub fn canonical(text: &str) -> String {
    normalize_whitespace(text).to_lowercase()
}

/// Parses a single date from the formats seen across schedule pages
///
/// Month/day strings without a year get `reference_year`.
pub fn parse_event_date(text: &str, reference_year: i32) -> Option<NaiveDate> {
    let cleaned = normalize_whitespace(text);
    let trimmed = cleaned.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    if trimmed.is_empty() {
        return None;
    }

    for format in ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%B %d, %Y", "%b %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    // Year-less forms: "6/3", "Jun 3", "June 3"
    for format in ["%m/%d", "%B %d", "%b %d"] {
        let with_year = format!("{} {}", trimmed, reference_year);
        let format_with_year = format!("{} %Y", format);
        if let Ok(date) = NaiveDate::parse_from_str(&with_year, &format_with_year) {
            return Some(date);
        }
    }

    None
}

/// Parses a date range like "Jan 5 - Jan 16, 2026" or a single date
///
/// Returns (start, end); end is None for single dates. An end date without a
/// month ("Jan 5-16") reuses the start's month and year.
pub fn parse_date_range(text: &str, reference_year: i32) -> Option<(NaiveDate, Option<NaiveDate>)> {
    let cleaned = normalize_whitespace(text);

    for separator in [" - ", " – ", " to ", "–", "-"] {
        if let Some((left, right)) = cleaned.split_once(separator) {
            let right = right.trim();

            // The year often appears only on the right side
            let end = parse_event_date(right, reference_year);
            let start = parse_event_date(left, end.map(|d| d.year()).unwrap_or(reference_year));

            if let (Some(start), Some(end)) = (start, end) {
                if end >= start {
                    return Some((start, Some(end)));
                }
            }

            // "Jan 5-16": bare day number on the right
            if let (Some(start), Ok(day)) = (start, right.trim_end_matches(',').parse::<u32>()) {
                if let Some(end) = NaiveDate::from_ymd_opt(start.year(), start.month(), day) {
                    if end >= start {
                        return Some((start, Some(end)));
                    }
                }
            }
        }
    }

    parse_event_date(&cleaned, reference_year).map(|start| (start, None))
}

/// Extracts a dollar amount like "$1,100" or "550" from free text
pub fn parse_buy_in(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' || bytes[i].is_ascii_digit() {
            let start = if bytes[i] == b'$' { i + 1 } else { i };
            let mut end = start;
            while end < bytes.len()
                && (bytes[end].is_ascii_digit() || bytes[end] == b',' || bytes[end] == b'.')
            {
                end += 1;
            }
            if end > start {
                let digits: String = text[start..end].chars().filter(|c| *c != ',').collect();
                if let Ok(value) = digits.trim_end_matches('.').parse::<f64>() {
                    return Some(value);
                }
            }
            i = end.max(i + 1);
        } else {
            i += 1;
        }
    }
    None
}

/// Detects the game type from text
///
/// Returns the canonical label and whether it was inferred (no recognizable
/// label found, defaulted to hold'em).
pub fn detect_game_type(text: &str) -> (String, bool) {
    let lower = text.to_lowercase();

    let labeled = [
        ("pot limit omaha", "Pot Limit Omaha"),
        ("plo", "Pot Limit Omaha"),
        ("omaha", "Pot Limit Omaha"),
        ("h.o.r.s.e", "HORSE"),
        ("horse", "HORSE"),
        ("mixed", "Mixed Games"),
        ("stud", "Seven Card Stud"),
        ("razz", "Razz"),
        ("no limit hold", "No Limit Hold'em"),
        ("nlh", "No Limit Hold'em"),
        ("limit hold", "Limit Hold'em"),
    ];

    for (needle, label) in labeled {
        if lower.contains(needle) {
            return (label.to_string(), false);
        }
    }

    ("No Limit Hold'em".to_string(), true)
}

/// Deterministic identity of an event across runs
///
/// Hash of (source id, canonical name, canonical venue, start date) — stable
/// under incidental text changes elsewhere in the row.
pub fn stable_key(source_id: &str, name: &str, venue: &str, start_date: NaiveDate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(canonical(name).as_bytes());
    hasher.update([0x1f]);
    hasher.update(canonical(venue).as_bytes());
    hasher.update([0x1f]);
    hasher.update(start_date.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash over every displayed field value; changes when any attribute changes
pub fn content_hash(fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}
