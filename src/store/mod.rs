//! Store module for durable catalog state
//!
//! This module owns the two durable resources of the engine — the source
//! registry and the event catalog — plus the append-only change log and the
//! per-run history. All mutation goes through the [`Store`] trait; the apply
//! step commits one source's full diff and registry bookkeeping as a single
//! transaction.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{CommitSummary, Store, StoreError, StoreResult};

use crate::parse::Confidence;
use chrono::{DateTime, NaiveDate, Utc};

/// A stored event row
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: i64,
    pub source_id: String,
    pub stable_key: String,
    pub content_hash: String,
    pub name: String,
    pub venue: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub buy_in: Option<f64>,
    pub game_type: String,
    pub confidence: Confidence,
    pub raw_payload: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,

    /// Set when the event disappeared from its source's schedule; rows are
    /// retired, never deleted
    pub removed_at: Option<DateTime<Utc>>,
}

/// Kind of change recorded in the change log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Added,
    Updated,
    Removed,
}

impl ChangeType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Removed => "removed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "added" => Some(Self::Added),
            "updated" => Some(Self::Updated),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

/// One immutable audit record, appended only by the apply step
#[derive(Debug, Clone)]
pub struct ChangeLogRecord {
    pub id: i64,
    pub source_id: String,
    pub event_key: String,
    pub change_type: ChangeType,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub detected_at: DateTime<Utc>,
}

/// Summary row for one completed engine run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mode: String,
    pub sources_ok: u32,
    pub sources_failed: u32,
    pub sources_skipped: u32,
    pub events_added: u32,
    pub events_updated: u32,
    pub events_removed: u32,
}
