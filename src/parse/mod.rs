//! Parser / normalizer module
//!
//! Turns raw fetched content into ordered canonical event candidates. Each
//! source carries a parse rule (its markup shape); the rules extract raw
//! field texts and this module normalizes them, drops candidates missing
//! required fields, and distinguishes a legitimately empty schedule from
//! structural drift.

mod normalize;
mod rules;

pub use normalize::{
    canonical, content_hash, detect_game_type, normalize_whitespace, parse_buy_in,
    parse_date_range, parse_event_date, stable_key, Confidence,
};
pub use rules::RawCandidate;

use crate::registry::{ParseRule, Source};
use chrono::NaiveDate;
use thiserror::Error;

/// Parse-level failure for a whole document
///
/// Individual bad candidates are dropped and counted, never errors.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// The markup no longer matches the rule's expected shape
    #[error("structural drift: {0}")]
    StructuralDrift(String),

    /// The payload was unreadable as the expected format
    #[error("malformed content: {0}")]
    Malformed(String),
}

/// One extracted event in canonical form
#[derive(Debug, Clone, PartialEq)]
pub struct EventCandidate {
    /// Identity across runs: hash of (source, name, venue, start date)
    pub stable_key: String,

    /// Hash of all displayed field values
    pub content_hash: String,

    pub name: String,
    pub venue: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub buy_in: Option<f64>,
    pub game_type: String,
    pub confidence: Confidence,

    /// Opaque snapshot of the extracted element, kept for audit
    pub raw_payload: String,
}

/// Result of parsing one document
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    /// Candidates in document order
    pub events: Vec<EventCandidate>,

    /// Candidates dropped for missing required fields
    pub dropped: u32,
}

/// Parses raw content into event candidates using the source's rule
///
/// `reference_year` anchors year-less dates ("Jun 3") and is taken from the
/// fetch timestamp by the caller.
pub fn parse(
    source: &Source,
    raw_content: &str,
    reference_year: i32,
) -> Result<ParseOutcome, ParseError> {
    let raw_candidates = match source.parse_rule {
        ParseRule::HtmlTable => rules::extract_table_rows(raw_content)?,
        ParseRule::HtmlCards => rules::extract_cards(raw_content)?,
        ParseRule::EmbeddedJson => rules::extract_embedded_json(raw_content)?,
    };

    let mut events = Vec::new();
    let mut dropped = 0u32;

    for raw in &raw_candidates {
        match normalize_candidate(&source.id, &source.display_name, raw, reference_year) {
            Some(candidate) => events.push(candidate),
            None => {
                dropped += 1;
                tracing::debug!(
                    source_id = %source.id,
                    raw = %raw.raw_text.chars().take(120).collect::<String>(),
                    "dropped candidate missing required fields"
                );
            }
        }
    }

    Ok(ParseOutcome { events, dropped })
}

/// Whether a zero-event parse may be accepted as a legitimately empty
/// schedule rather than structural drift
///
/// Requires the previous successful parse to have also found zero events and
/// the raw content size to sit within the configured bounds of the last
/// successful fetch. A source with no successful history has no baseline to
/// drift from, so empty is accepted.
pub fn empty_parse_is_plausible(
    source: &Source,
    content_bytes: u64,
    min_ratio: f64,
    max_ratio: f64,
) -> bool {
    match (source.last_event_count, source.last_content_bytes) {
        (Some(0), Some(last_bytes)) => {
            let ratio = content_bytes as f64 / last_bytes.max(1) as f64;
            ratio >= min_ratio && ratio <= max_ratio
        }
        (None, _) => true,
        _ => false,
    }
}

/// Builds a canonical candidate from raw field texts
///
/// Returns None when `name` or a parseable start date is missing; those are
/// the required fields. A missing venue falls back to the source's display
/// name and flags low confidence, as does a game type read from free text
/// instead of a labeled field.
fn normalize_candidate(
    source_id: &str,
    default_venue: &str,
    raw: &RawCandidate,
    reference_year: i32,
) -> Option<EventCandidate> {
    let name = raw
        .name
        .as_deref()
        .map(normalize_whitespace)
        .filter(|n| !n.is_empty())?;

    let (start_date, end_date) = raw
        .dates
        .as_deref()
        .and_then(|text| parse_date_range(text, reference_year))?;

    let mut fallback_used = false;

    let venue = match raw.venue.as_deref().map(normalize_whitespace) {
        Some(venue) if !venue.is_empty() => venue,
        _ => {
            fallback_used = true;
            default_venue.to_string()
        }
    };

    let buy_in = raw.buy_in.as_deref().and_then(parse_buy_in);

    let game_type = match raw.game_type.as_deref() {
        Some(label) => {
            let (game_type, inferred) = detect_game_type(label);
            fallback_used |= inferred;
            game_type
        }
        None => {
            fallback_used = true;
            let haystack = format!("{} {}", name, raw.raw_text);
            detect_game_type(&haystack).0
        }
    };

    let confidence = if fallback_used {
        Confidence::Low
    } else {
        Confidence::High
    };

    let buy_in_text = buy_in.map(|b| b.to_string()).unwrap_or_default();
    let end_text = end_date.map(|d| d.to_string()).unwrap_or_default();

    Some(EventCandidate {
        stable_key: stable_key(source_id, &name, &venue, start_date),
        content_hash: content_hash(&[
            &name,
            &venue,
            &start_date.to_string(),
            &end_text,
            &buy_in_text,
            &game_type,
        ]),
        name,
        venue,
        start_date,
        end_date,
        buy_in,
        game_type,
        confidence,
        raw_payload: raw.raw_text.clone(),
    })
}
