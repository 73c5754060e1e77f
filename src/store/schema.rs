//! Database schema definitions
//!
//! All SQL schema for the catalog database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Source registry: one row per external origin
CREATE TABLE IF NOT EXISTS sources (
    id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    category TEXT NOT NULL,
    origin_url TEXT NOT NULL,
    fetch_strategy TEXT NOT NULL,
    parse_rule TEXT NOT NULL,
    refresh_interval_secs INTEGER NOT NULL,
    rate_limit_class TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    last_checked_at TEXT,
    last_success_at TEXT,
    last_fingerprint TEXT,
    consecutive_failures INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'healthy',
    last_event_count INTEGER,
    last_content_bytes INTEGER
);

-- Event catalog: rows are retired via removed_at, never deleted
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT NOT NULL REFERENCES sources(id),
    stable_key TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    name TEXT NOT NULL,
    venue TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT,
    buy_in REAL,
    game_type TEXT NOT NULL,
    confidence TEXT NOT NULL,
    raw_payload TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    removed_at TEXT,
    UNIQUE(source_id, stable_key)
);

CREATE INDEX IF NOT EXISTS idx_events_source ON events(source_id);
CREATE INDEX IF NOT EXISTS idx_events_live ON events(source_id, removed_at);

-- Append-only audit trail of catalog changes
CREATE TABLE IF NOT EXISTS change_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT NOT NULL REFERENCES sources(id),
    event_key TEXT NOT NULL,
    change_type TEXT NOT NULL,
    before_json TEXT,
    after_json TEXT,
    detected_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_change_log_source ON change_log(source_id);

-- One row per completed engine run
CREATE TABLE IF NOT EXISTS sync_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    mode TEXT NOT NULL,
    sources_ok INTEGER NOT NULL,
    sources_failed INTEGER NOT NULL,
    sources_skipped INTEGER NOT NULL,
    events_added INTEGER NOT NULL,
    events_updated INTEGER NOT NULL,
    events_removed INTEGER NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["sources", "events", "change_log", "sync_runs"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_live_event_uniqueness() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO sources (id, display_name, category, origin_url, fetch_strategy,
             parse_rule, refresh_interval_secs, rate_limit_class)
             VALUES ('s1', 'S1', 'venue', 'https://x.test/', 'http', 'html_table', 3600, 'default')",
            [],
        )
        .unwrap();

        let insert = "INSERT INTO events (source_id, stable_key, content_hash, name, venue,
             start_date, game_type, confidence, raw_payload, first_seen_at, last_seen_at)
             VALUES ('s1', 'k1', 'h1', 'E', 'V', '2026-06-03', 'NLH', 'high', '', 'now', 'now')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
