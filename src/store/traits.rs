//! Store trait and error types

use crate::diff::DiffResult;
use crate::registry::{AttemptOutcome, Source, SourceFilter};
use crate::store::{ChangeLogRecord, EventRecord, RunRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Counts committed by one apply step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub added: u32,
    pub updated: u32,
    pub removed: u32,
}

/// Trait for catalog storage backends
///
/// Implementations must make [`Store::apply_diff`] atomic: either the full
/// diff plus the registry bookkeeping lands, or nothing does.
pub trait Store {
    // ===== Source Registry =====

    /// Upserts seeded source definitions
    ///
    /// Definition fields (name, URL, strategy, cadence, enabled flag) are
    /// updated in place; scheduling bookkeeping of existing rows survives.
    fn seed_sources(&mut self, sources: &[Source]) -> StoreResult<()>;

    /// Lists sources matching the filter, ordered by id
    fn list_sources(&self, filter: &SourceFilter) -> StoreResult<Vec<Source>>;

    /// Gets a single source by id
    fn get_source(&self, id: &str) -> StoreResult<Option<Source>>;

    /// Records the outcome of one sync attempt — the sole registry mutator
    ///
    /// Returns the updated row so callers can report status transitions.
    fn record_attempt(
        &mut self,
        source_id: &str,
        outcome: &AttemptOutcome,
        failure_threshold: u32,
        now: DateTime<Utc>,
    ) -> StoreResult<Source>;

    // ===== Events =====

    /// All live (non-removed) events for a source, ordered by stable key
    fn live_events(&self, source_id: &str) -> StoreResult<Vec<EventRecord>>;

    /// Commits one source's diff atomically
    ///
    /// Upserts added and updated events, retires removed keys, appends one
    /// change-log entry per change, and folds in the success bookkeeping
    /// (fingerprint, event count, content size) — all in one transaction.
    fn apply_diff(
        &mut self,
        source_id: &str,
        diff: &DiffResult,
        fingerprint: &str,
        content_bytes: u64,
        failure_threshold: u32,
        now: DateTime<Utc>,
    ) -> StoreResult<CommitSummary>;

    // ===== Audit =====

    /// Change-log entries for a source, oldest first
    fn change_log(&self, source_id: &str) -> StoreResult<Vec<ChangeLogRecord>>;

    /// Appends a completed run's summary row
    fn record_run(&mut self, run: &RunRecord) -> StoreResult<i64>;

    /// Most recent run summaries, newest first
    fn recent_runs(&self, limit: u32) -> StoreResult<Vec<RunRecord>>;
}
