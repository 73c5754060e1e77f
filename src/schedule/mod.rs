//! Scheduler for selecting due sources
//!
//! Pure selection logic: given the registry's current rows, a clock reading,
//! and a mode, produce the ordered list of sources this run should process.
//! Staleness ordering puts the longest-unchecked sources first so they are
//! serviced before a time budget runs out.

use crate::registry::Source;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

/// How a run selects its sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Enabled sources whose refresh interval has elapsed
    Normal,

    /// All enabled sources regardless of due-ness
    Forced,

    /// Exactly one source, bypassing enabled and due checks
    Single(String),
}

impl RunMode {
    pub fn label(&self) -> String {
        match self {
            Self::Normal => "normal".to_string(),
            Self::Forced => "forced".to_string(),
            Self::Single(id) => format!("single:{}", id),
        }
    }
}

/// Selects and orders the sources to process
///
/// Ordering: ascending `last_checked_at` with never-checked sources first,
/// then by id. Sources selected by `Single` skip both checks — that mode is
/// the operator override.
pub fn select_due(
    sources: &[Source],
    now: DateTime<Utc>,
    mode: &RunMode,
    jitter_pct: u8,
) -> Vec<Source> {
    let mut selected: Vec<Source> = match mode {
        RunMode::Normal => sources
            .iter()
            .filter(|source| source.enabled && is_due(source, now, jitter_pct))
            .cloned()
            .collect(),
        RunMode::Forced => sources
            .iter()
            .filter(|source| source.enabled)
            .cloned()
            .collect(),
        RunMode::Single(id) => sources
            .iter()
            .filter(|source| &source.id == id)
            .cloned()
            .collect(),
    };

    selected.sort_by(|a, b| {
        match (a.last_checked_at, b.last_checked_at) {
            (None, None) => a.id.cmp(&b.id),
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(ta), Some(tb)) => ta.cmp(&tb).then_with(|| a.id.cmp(&b.id)),
        }
    });

    selected
}

/// Whether a source's refresh interval has elapsed
///
/// The interval is skewed by a bounded jitter so sources sharing an interval
/// do not all come due in the same instant. The skew is derived from the
/// source id and its last-checked timestamp, so it is stable within a cycle
/// but re-rolls once the source is checked again.
pub fn is_due(source: &Source, now: DateTime<Utc>, jitter_pct: u8) -> bool {
    let last_checked = match source.last_checked_at {
        None => return true,
        Some(last_checked) => last_checked,
    };

    let skew = jitter_skew(&source.id, last_checked, jitter_pct);
    let effective_secs = source.refresh_interval_secs as f64 * (1.0 + skew);
    let elapsed = now - last_checked;

    elapsed >= Duration::seconds(effective_secs as i64)
}

/// Deterministic skew in [-pct, +pct] percent, as a fraction
fn jitter_skew(source_id: &str, last_checked: DateTime<Utc>, jitter_pct: u8) -> f64 {
    if jitter_pct == 0 {
        return 0.0;
    }

    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update(last_checked.timestamp().to_le_bytes());
    let digest = hasher.finalize();

    let unit = u16::from_le_bytes([digest[0], digest[1]]) as f64 / f64::from(u16::MAX);
    (unit * 2.0 - 1.0) * f64::from(jitter_pct) / 100.0
}
