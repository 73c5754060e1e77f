//! SQLite store implementation

use crate::diff::DiffResult;
use crate::parse::{Confidence, EventCandidate};
use crate::registry::{
    AttemptOutcome, FetchStrategy, ParseRule, RateLimitClass, Source, SourceCategory,
    SourceFilter, SourceStatus,
};
use crate::store::schema::initialize_schema;
use crate::store::traits::{CommitSummary, Store, StoreError, StoreResult};
use crate::store::{ChangeLogRecord, ChangeType, EventRecord, RunRecord};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend for the catalog
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the catalog database at `path`
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

const SOURCE_COLUMNS: &str = "id, display_name, category, origin_url, fetch_strategy, parse_rule,
    refresh_interval_secs, rate_limit_class, enabled, last_checked_at, last_success_at,
    last_fingerprint, consecutive_failures, status, last_event_count, last_content_bytes";

const EVENT_COLUMNS: &str = "id, source_id, stable_key, content_hash, name, venue, start_date,
    end_date, buy_in, game_type, confidence, raw_payload, first_seen_at, last_seen_at, removed_at";

fn conversion_error(err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_timestamp(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(conversion_error)
}

fn parse_day(value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(conversion_error)
}

fn source_from_row(row: &Row) -> rusqlite::Result<Source> {
    let last_checked_at: Option<String> = row.get(9)?;
    let last_success_at: Option<String> = row.get(10)?;

    Ok(Source {
        id: row.get(0)?,
        display_name: row.get(1)?,
        category: SourceCategory::from_db_string(&row.get::<_, String>(2)?)
            .unwrap_or(SourceCategory::Aggregator),
        origin_url: row.get(3)?,
        fetch_strategy: FetchStrategy::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(FetchStrategy::Http),
        parse_rule: ParseRule::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(ParseRule::HtmlTable),
        refresh_interval_secs: row.get::<_, i64>(6)? as u64,
        rate_limit_class: RateLimitClass::from_db_string(&row.get::<_, String>(7)?)
            .unwrap_or(RateLimitClass::Default),
        enabled: row.get(8)?,
        last_checked_at: last_checked_at.as_deref().map(parse_timestamp).transpose()?,
        last_success_at: last_success_at.as_deref().map(parse_timestamp).transpose()?,
        last_fingerprint: row.get(11)?,
        consecutive_failures: row.get(12)?,
        status: SourceStatus::from_db_string(&row.get::<_, String>(13)?)
            .unwrap_or(SourceStatus::Healthy),
        last_event_count: row.get(14)?,
        last_content_bytes: row.get::<_, Option<i64>>(15)?.map(|v| v as u64),
    })
}

fn event_from_row(row: &Row) -> rusqlite::Result<EventRecord> {
    let end_date: Option<String> = row.get(7)?;
    let removed_at: Option<String> = row.get(14)?;

    Ok(EventRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        stable_key: row.get(2)?,
        content_hash: row.get(3)?,
        name: row.get(4)?,
        venue: row.get(5)?,
        start_date: parse_day(&row.get::<_, String>(6)?)?,
        end_date: end_date.as_deref().map(parse_day).transpose()?,
        buy_in: row.get(8)?,
        game_type: row.get(9)?,
        confidence: Confidence::from_db_string(&row.get::<_, String>(10)?)
            .unwrap_or(Confidence::Low),
        raw_payload: row.get(11)?,
        first_seen_at: parse_timestamp(&row.get::<_, String>(12)?)?,
        last_seen_at: parse_timestamp(&row.get::<_, String>(13)?)?,
        removed_at: removed_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn get_source_on(conn: &Connection, id: &str) -> StoreResult<Option<Source>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM sources WHERE id = ?1",
        SOURCE_COLUMNS
    ))?;
    Ok(stmt.query_row(params![id], source_from_row).optional()?)
}

fn write_bookkeeping(conn: &Connection, source: &Source) -> StoreResult<()> {
    conn.execute(
        "UPDATE sources SET last_checked_at = ?2, last_success_at = ?3, last_fingerprint = ?4,
         consecutive_failures = ?5, status = ?6, last_event_count = ?7, last_content_bytes = ?8
         WHERE id = ?1",
        params![
            source.id,
            source.last_checked_at.map(|t| t.to_rfc3339()),
            source.last_success_at.map(|t| t.to_rfc3339()),
            source.last_fingerprint,
            source.consecutive_failures,
            source.status.to_db_string(),
            source.last_event_count,
            source.last_content_bytes.map(|v| v as i64),
        ],
    )?;
    Ok(())
}

fn upsert_event(
    conn: &Connection,
    source_id: &str,
    candidate: &EventCandidate,
    now: DateTime<Utc>,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO events (source_id, stable_key, content_hash, name, venue, start_date,
             end_date, buy_in, game_type, confidence, raw_payload, first_seen_at, last_seen_at,
             removed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12, NULL)
         ON CONFLICT(source_id, stable_key) DO UPDATE SET
             content_hash = excluded.content_hash,
             name = excluded.name,
             venue = excluded.venue,
             start_date = excluded.start_date,
             end_date = excluded.end_date,
             buy_in = excluded.buy_in,
             game_type = excluded.game_type,
             confidence = excluded.confidence,
             raw_payload = excluded.raw_payload,
             last_seen_at = excluded.last_seen_at,
             removed_at = NULL",
        params![
            source_id,
            candidate.stable_key,
            candidate.content_hash,
            candidate.name,
            candidate.venue,
            candidate.start_date.to_string(),
            candidate.end_date.map(|d| d.to_string()),
            candidate.buy_in,
            candidate.game_type,
            candidate.confidence.to_db_string(),
            candidate.raw_payload,
            now.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn append_change(
    conn: &Connection,
    source_id: &str,
    event_key: &str,
    change_type: ChangeType,
    before: Option<&serde_json::Value>,
    after: Option<&serde_json::Value>,
    now: DateTime<Utc>,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO change_log (source_id, event_key, change_type, before_json, after_json,
             detected_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            source_id,
            event_key,
            change_type.to_db_string(),
            before.map(|v| v.to_string()),
            after.map(|v| v.to_string()),
            now.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn stored_snapshot(conn: &Connection, source_id: &str, key: &str) -> StoreResult<Option<serde_json::Value>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM events WHERE source_id = ?1 AND stable_key = ?2",
        EVENT_COLUMNS
    ))?;
    let record = stmt
        .query_row(params![source_id, key], event_from_row)
        .optional()?;
    Ok(record.map(|r| record_snapshot(&r)))
}

fn candidate_snapshot(candidate: &EventCandidate) -> serde_json::Value {
    serde_json::json!({
        "name": candidate.name,
        "venue": candidate.venue,
        "start_date": candidate.start_date.to_string(),
        "end_date": candidate.end_date.map(|d| d.to_string()),
        "buy_in": candidate.buy_in,
        "game_type": candidate.game_type,
        "confidence": candidate.confidence.to_db_string(),
        "content_hash": candidate.content_hash,
    })
}

fn record_snapshot(record: &EventRecord) -> serde_json::Value {
    serde_json::json!({
        "name": record.name,
        "venue": record.venue,
        "start_date": record.start_date.to_string(),
        "end_date": record.end_date.map(|d| d.to_string()),
        "buy_in": record.buy_in,
        "game_type": record.game_type,
        "confidence": record.confidence.to_db_string(),
        "content_hash": record.content_hash,
    })
}

impl Store for SqliteStore {
    // ===== Source Registry =====

    fn seed_sources(&mut self, sources: &[Source]) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        for source in sources {
            tx.execute(
                "INSERT INTO sources (id, display_name, category, origin_url, fetch_strategy,
                     parse_rule, refresh_interval_secs, rate_limit_class, enabled, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                     display_name = excluded.display_name,
                     category = excluded.category,
                     origin_url = excluded.origin_url,
                     fetch_strategy = excluded.fetch_strategy,
                     parse_rule = excluded.parse_rule,
                     refresh_interval_secs = excluded.refresh_interval_secs,
                     rate_limit_class = excluded.rate_limit_class,
                     enabled = excluded.enabled,
                     status = CASE
                         WHEN excluded.enabled = 0 THEN 'disabled'
                         WHEN sources.status = 'disabled' THEN 'healthy'
                         ELSE sources.status
                     END",
                params![
                    source.id,
                    source.display_name,
                    source.category.to_db_string(),
                    source.origin_url,
                    source.fetch_strategy.to_db_string(),
                    source.parse_rule.to_db_string(),
                    source.refresh_interval_secs as i64,
                    source.rate_limit_class.to_db_string(),
                    source.enabled,
                    source.status.to_db_string(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn list_sources(&self, filter: &SourceFilter) -> StoreResult<Vec<Source>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM sources ORDER BY id",
            SOURCE_COLUMNS
        ))?;
        let rows = stmt.query_map([], source_from_row)?;

        let mut sources = Vec::new();
        for row in rows {
            let source = row?;
            if filter.matches(&source) {
                sources.push(source);
            }
        }
        Ok(sources)
    }

    fn get_source(&self, id: &str) -> StoreResult<Option<Source>> {
        get_source_on(&self.conn, id)
    }

    fn record_attempt(
        &mut self,
        source_id: &str,
        outcome: &AttemptOutcome,
        failure_threshold: u32,
        now: DateTime<Utc>,
    ) -> StoreResult<Source> {
        let tx = self.conn.transaction()?;
        let mut source = get_source_on(&tx, source_id)?
            .ok_or_else(|| StoreError::SourceNotFound(source_id.to_string()))?;

        source.apply_outcome(outcome, failure_threshold, now);
        write_bookkeeping(&tx, &source)?;
        tx.commit()?;

        Ok(source)
    }

    // ===== Events =====

    fn live_events(&self, source_id: &str) -> StoreResult<Vec<EventRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM events WHERE source_id = ?1 AND removed_at IS NULL ORDER BY stable_key",
            EVENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![source_id], event_from_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    fn apply_diff(
        &mut self,
        source_id: &str,
        diff: &DiffResult,
        fingerprint: &str,
        content_bytes: u64,
        failure_threshold: u32,
        now: DateTime<Utc>,
    ) -> StoreResult<CommitSummary> {
        let tx = self.conn.transaction()?;
        let mut source = get_source_on(&tx, source_id)?
            .ok_or_else(|| StoreError::SourceNotFound(source_id.to_string()))?;

        let mut summary = CommitSummary::default();

        for candidate in &diff.added {
            upsert_event(&tx, source_id, candidate, now)?;
            append_change(
                &tx,
                source_id,
                &candidate.stable_key,
                ChangeType::Added,
                None,
                Some(&candidate_snapshot(candidate)),
                now,
            )?;
            summary.added += 1;
        }

        for candidate in &diff.updated {
            let before = stored_snapshot(&tx, source_id, &candidate.stable_key)?;
            upsert_event(&tx, source_id, candidate, now)?;
            append_change(
                &tx,
                source_id,
                &candidate.stable_key,
                ChangeType::Updated,
                before.as_ref(),
                Some(&candidate_snapshot(candidate)),
                now,
            )?;
            summary.updated += 1;
        }

        for key in &diff.removed {
            let before = stored_snapshot(&tx, source_id, key)?;
            tx.execute(
                "UPDATE events SET removed_at = ?3
                 WHERE source_id = ?1 AND stable_key = ?2 AND removed_at IS NULL",
                params![source_id, key, now.to_rfc3339()],
            )?;
            append_change(
                &tx,
                source_id,
                key,
                ChangeType::Removed,
                before.as_ref(),
                None,
                now,
            )?;
            summary.removed += 1;
        }

        let live_count: u32 = tx.query_row(
            "SELECT COUNT(*) FROM events WHERE source_id = ?1 AND removed_at IS NULL",
            params![source_id],
            |row| row.get(0),
        )?;

        source.apply_outcome(
            &AttemptOutcome::Success {
                fingerprint: fingerprint.to_string(),
                event_count: live_count,
                content_bytes,
            },
            failure_threshold,
            now,
        );
        write_bookkeeping(&tx, &source)?;

        tx.commit()?;
        Ok(summary)
    }

    // ===== Audit =====

    fn change_log(&self, source_id: &str) -> StoreResult<Vec<ChangeLogRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_id, event_key, change_type, before_json, after_json, detected_at
             FROM change_log WHERE source_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![source_id], |row| {
            let before: Option<String> = row.get(4)?;
            let after: Option<String> = row.get(5)?;
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                before,
                after,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, source_id, event_key, change_type, before, after, detected_at) = row?;
            entries.push(ChangeLogRecord {
                id,
                source_id,
                event_key,
                change_type: ChangeType::from_db_string(&change_type)
                    .unwrap_or(ChangeType::Updated),
                before: before.as_deref().map(serde_json::from_str).transpose()?,
                after: after.as_deref().map(serde_json::from_str).transpose()?,
                detected_at: parse_timestamp(&detected_at)?,
            });
        }
        Ok(entries)
    }

    fn record_run(&mut self, run: &RunRecord) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO sync_runs (started_at, finished_at, mode, sources_ok, sources_failed,
                 sources_skipped, events_added, events_updated, events_removed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run.started_at.to_rfc3339(),
                run.finished_at.to_rfc3339(),
                run.mode,
                run.sources_ok,
                run.sources_failed,
                run.sources_skipped,
                run.events_added,
                run.events_updated,
                run.events_removed,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn recent_runs(&self, limit: u32) -> StoreResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, mode, sources_ok, sources_failed,
                 sources_skipped, events_added, events_updated, events_removed
             FROM sync_runs ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, u32>(5)?,
                row.get::<_, u32>(6)?,
                row.get::<_, u32>(7)?,
                row.get::<_, u32>(8)?,
                row.get::<_, u32>(9)?,
            ))
        })?;

        let mut runs = Vec::new();
        for row in rows {
            let (id, started_at, finished_at, mode, ok, failed, skipped, added, updated, removed) =
                row?;
            runs.push(RunRecord {
                id,
                started_at: parse_timestamp(&started_at)?,
                finished_at: parse_timestamp(&finished_at)?,
                mode,
                sources_ok: ok,
                sources_failed: failed,
                sources_skipped: skipped,
                events_added: added,
                events_updated: updated,
                events_removed: removed,
            });
        }
        Ok(runs)
    }
}
