use std::path::Path;
use std::time::{Duration, Instant};

use tourney_sync::config::{
    Config, EngineConfig, FetcherConfig, RateLimitConfig, RenderConfig, SourceEntry,
    StorageConfig,
};
use tourney_sync::engine::{Engine, RunParams, SourceOutcome};
use tourney_sync::registry::{
    FetchStrategy, ParseRule, RateLimitClass, SourceCategory, SourceFilter, SourceStatus,
};
use tourney_sync::schedule::RunMode;
use tourney_sync::store::{SqliteStore, Store};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TABLE_HTML: &str = r#"<html><body>
    <table><tbody>
      <tr><td>2026-06-03</td><td>Deepstack Opener</td><td>$600</td></tr>
      <tr><td>2026-06-05</td><td>Summer Main Event</td><td>$1,100</td></tr>
    </tbody></table>
    </body></html>"#;

const TABLE_HTML_CHANGED: &str = r#"<html><body>
    <table><tbody>
      <tr><td>2026-06-03</td><td>Deepstack Opener</td><td>$800</td></tr>
      <tr><td>2026-06-07</td><td>Closer Bounty</td><td>$400</td></tr>
    </tbody></table>
    </body></html>"#;

/// Builds a fast-running config: no jitter, one-second host spacing, no
/// retries (retry behavior is covered by unit tests)
fn test_config(db_path: &str, sources: Vec<SourceEntry>) -> Config {
    Config {
        engine: EngineConfig {
            jitter_pct: 0,
            deadline_secs: 60,
            ..EngineConfig::default()
        },
        fetcher: FetcherConfig {
            timeout_secs: 5,
            connect_timeout_secs: 2,
            retry_max_attempts: 0,
            retry_base_secs: 1,
            retry_cap_secs: 1,
            ..FetcherConfig::default()
        },
        rate_limit: RateLimitConfig {
            default_secs: 1,
            gentle_secs: 1,
            strict_secs: 1,
        },
        render: None,
        storage: StorageConfig {
            database_path: db_path.to_string(),
        },
        sources,
    }
}

fn source_entry(id: &str, origin_url: &str) -> SourceEntry {
    SourceEntry {
        id: id.to_string(),
        display_name: format!("Source {}", id),
        category: SourceCategory::Venue,
        origin_url: origin_url.to_string(),
        fetch_strategy: FetchStrategy::Http,
        parse_rule: ParseRule::HtmlTable,
        refresh_interval_hours: 72,
        rate_limit_class: RateLimitClass::Default,
        enabled: true,
    }
}

fn db_path(dir: &tempfile::TempDir) -> String {
    dir.path().join("catalog.db").to_string_lossy().to_string()
}

fn open_store(path_str: &str) -> SqliteStore {
    SqliteStore::new(Path::new(path_str)).expect("Failed to open catalog")
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_sync_and_idempotence() {
    let server = MockServer::start().await;
    mount_page(&server, "/schedule", TABLE_HTML).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);
    let config = test_config(
        &db,
        vec![source_entry("wynn", &format!("{}/schedule", server.uri()))],
    );

    let engine = Engine::new(config).expect("Failed to create engine");

    // First run populates the catalog
    let report = engine.run(RunParams::default()).await.expect("Run failed");
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.totals.sources_ok, 1);
    assert_eq!(report.totals.events_added, 2);

    let store = open_store(&db);
    let live = store.live_events("wynn").unwrap();
    assert_eq!(live.len(), 2);
    let fingerprint_after_first = store
        .get_source("wynn")
        .unwrap()
        .unwrap()
        .last_fingerprint
        .expect("fingerprint recorded");
    let changes_after_first = store.change_log("wynn").unwrap().len();
    drop(store);

    // Second run over unchanged content is a no-op
    let report = engine
        .run(RunParams {
            mode: RunMode::Forced,
            ..Default::default()
        })
        .await
        .expect("Second run failed");
    assert_eq!(report.totals.events_added, 0);
    assert_eq!(report.totals.events_updated, 0);
    assert_eq!(report.totals.events_removed, 0);

    let store = open_store(&db);
    let source = store.get_source("wynn").unwrap().unwrap();
    assert_eq!(source.last_fingerprint.as_deref(), Some(fingerprint_after_first.as_str()));
    assert_eq!(store.change_log("wynn").unwrap().len(), changes_after_first);
}

#[tokio::test]
async fn test_changed_content_produces_minimal_diff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/schedule"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TABLE_HTML))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/schedule", TABLE_HTML_CHANGED).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);
    let config = test_config(
        &db,
        vec![source_entry("aria", &format!("{}/schedule", server.uri()))],
    );
    let engine = Engine::new(config).expect("Failed to create engine");

    engine.run(RunParams::default()).await.expect("First run failed");
    let report = engine
        .run(RunParams {
            mode: RunMode::Forced,
            ..Default::default()
        })
        .await
        .expect("Second run failed");

    // Opener's buy-in changed, Main Event vanished, Closer appeared
    assert_eq!(report.totals.events_updated, 1);
    assert_eq!(report.totals.events_removed, 1);
    assert_eq!(report.totals.events_added, 1);

    let store = open_store(&db);
    let live = store.live_events("aria").unwrap();
    assert_eq!(live.len(), 2);

    // The removed event is retired, not deleted
    let log = store.change_log("aria").unwrap();
    let removed: Vec<_> = log
        .iter()
        .filter(|entry| entry.change_type == tourney_sync::store::ChangeType::Removed)
        .collect();
    assert_eq!(removed.len(), 1);
    assert!(removed[0].before.is_some());
}

#[tokio::test]
async fn test_dry_run_has_no_side_effects() {
    let server = MockServer::start().await;
    mount_page(&server, "/schedule", TABLE_HTML).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);
    let config = test_config(
        &db,
        vec![source_entry("wsop", &format!("{}/schedule", server.uri()))],
    );
    let engine = Engine::new(config).expect("Failed to create engine");

    let report = engine
        .run(RunParams {
            dry_run: true,
            ..Default::default()
        })
        .await
        .expect("Dry run failed");

    // The preview sees the pending changes
    assert_eq!(report.totals.events_added, 2);
    assert!(report.dry_run);

    // But nothing was written anywhere
    let store = open_store(&db);
    let source = store.get_source("wsop").unwrap().unwrap();
    assert!(source.last_checked_at.is_none());
    assert!(source.last_fingerprint.is_none());
    assert!(store.live_events("wsop").unwrap().is_empty());
    assert!(store.change_log("wsop").unwrap().is_empty());
    assert!(store.recent_runs(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_failure_isolation_across_sources() {
    let server = MockServer::start().await;
    mount_page(&server, "/one", TABLE_HTML).await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_page(&server, "/three", TABLE_HTML).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);
    let config = test_config(
        &db,
        vec![
            source_entry("s1", &format!("{}/one", server.uri())),
            source_entry("s2", &format!("{}/two", server.uri())),
            source_entry("s3", &format!("{}/three", server.uri())),
        ],
    );
    let engine = Engine::new(config).expect("Failed to create engine");

    let report = engine.run(RunParams::default()).await.expect("Run failed");
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.totals.sources_ok, 2);
    assert_eq!(report.totals.sources_failed, 1);

    let failed: Vec<_> = report
        .results
        .iter()
        .filter(|result| result.outcome.is_failure())
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].source_id, "s2");

    let store = open_store(&db);
    assert_eq!(store.live_events("s1").unwrap().len(), 2);
    assert_eq!(store.live_events("s3").unwrap().len(), 2);
    let source = store.get_source("s2").unwrap().unwrap();
    assert_eq!(source.consecutive_failures, 1);
    assert_eq!(source.status, SourceStatus::Healthy);
}

#[tokio::test]
async fn test_degraded_threshold_and_recovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/schedule"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_page(&server, "/schedule", TABLE_HTML).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);
    let config = test_config(
        &db,
        vec![source_entry("mspt", &format!("{}/schedule", server.uri()))],
    );
    let engine = Engine::new(config).expect("Failed to create engine");
    let forced = || RunParams {
        mode: RunMode::Forced,
        ..Default::default()
    };

    // Two failures: still healthy
    for _ in 0..2 {
        let report = engine.run(forced()).await.expect("Run failed");
        assert!(report.newly_degraded.is_empty());
    }
    {
        let store = open_store(&db);
        let source = store.get_source("mspt").unwrap().unwrap();
        assert_eq!(source.consecutive_failures, 2);
        assert_eq!(source.status, SourceStatus::Healthy);
    }

    // Third failure crosses the threshold
    let report = engine.run(forced()).await.expect("Run failed");
    assert_eq!(report.newly_degraded, vec!["mspt".to_string()]);
    assert_eq!(report.exit_code(), 1);
    {
        let store = open_store(&db);
        let source = store.get_source("mspt").unwrap().unwrap();
        assert_eq!(source.status, SourceStatus::Degraded);
    }

    // One success restores health
    let report = engine.run(forced()).await.expect("Run failed");
    assert_eq!(report.totals.sources_ok, 1);
    assert!(report.newly_degraded.is_empty());
    let store = open_store(&db);
    let source = store.get_source("mspt").unwrap().unwrap();
    assert_eq!(source.status, SourceStatus::Healthy);
    assert_eq!(source.consecutive_failures, 0);
}

#[tokio::test]
async fn test_structural_drift_retains_events() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/schedule"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TABLE_HTML))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    // The page was redesigned: no table any more
    mount_page(
        &server,
        "/schedule",
        "<html><body><div class=\"hero\">All new site!</div></body></html>",
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);
    let config = test_config(
        &db,
        vec![source_entry("venetian", &format!("{}/schedule", server.uri()))],
    );
    let engine = Engine::new(config).expect("Failed to create engine");

    engine.run(RunParams::default()).await.expect("First run failed");
    let report = engine
        .run(RunParams {
            mode: RunMode::Forced,
            ..Default::default()
        })
        .await
        .expect("Second run failed");

    assert_eq!(report.totals.sources_failed, 1);
    let result = &report.results[0];
    match &result.outcome {
        SourceOutcome::Failed { reason } => assert!(
            reason.contains("structural drift"),
            "unexpected reason: {}",
            reason
        ),
        other => panic!("expected failure, got {:?}", other),
    }

    // No spurious removals: the previously stored events are untouched
    let store = open_store(&db);
    assert_eq!(store.live_events("venetian").unwrap().len(), 2);
    let source = store.get_source("venetian").unwrap().unwrap();
    assert_eq!(source.consecutive_failures, 1);
}

#[tokio::test]
async fn test_same_host_fetches_are_spaced() {
    let server = MockServer::start().await;
    mount_page(&server, "/one", TABLE_HTML).await;
    mount_page(&server, "/two", TABLE_HTML).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);
    let mut config = test_config(
        &db,
        vec![
            source_entry("s1", &format!("{}/one", server.uri())),
            source_entry("s2", &format!("{}/two", server.uri())),
        ],
    );
    config.rate_limit.default_secs = 2;

    let engine = Engine::new(config).expect("Failed to create engine");

    let started = Instant::now();
    let report = engine.run(RunParams::default()).await.expect("Run failed");
    let elapsed = started.elapsed();

    assert_eq!(report.totals.sources_ok, 2);
    // Both sources share a host: the second fetch start must wait out the
    // two-second spacing even with both workers running concurrently
    assert!(
        elapsed >= Duration::from_millis(1800),
        "run finished in {:?}, spacing was not enforced",
        elapsed
    );
}

#[tokio::test]
async fn test_single_mode_overrides_disabled() {
    let server = MockServer::start().await;
    mount_page(&server, "/schedule", TABLE_HTML).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);
    let mut entry = source_entry("offline", &format!("{}/schedule", server.uri()));
    entry.enabled = false;
    let config = test_config(&db, vec![entry]);
    let engine = Engine::new(config).expect("Failed to create engine");

    // Normal run ignores the disabled source entirely
    let report = engine.run(RunParams::default()).await.expect("Run failed");
    assert_eq!(report.totals.sources_ok, 0);

    // Operator override processes it anyway
    let report = engine
        .run(RunParams {
            mode: RunMode::Single("offline".to_string()),
            ..Default::default()
        })
        .await
        .expect("Single run failed");
    assert_eq!(report.totals.sources_ok, 1);
    assert_eq!(report.totals.events_added, 2);
}

#[tokio::test]
async fn test_single_mode_unknown_source_is_invocation_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);
    let config = test_config(&db, vec![]);
    let engine = Engine::new(config).expect("Failed to create engine");

    let result = engine
        .run(RunParams {
            mode: RunMode::Single("ghost".to_string()),
            ..Default::default()
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_rendered_source_via_render_service() {
    let server = MockServer::start().await;
    // The render service returns the rendered card markup for any URL
    Mock::given(method("POST"))
        .and(path("/content"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
            <div class="event-card">
              <h3>WPT Championship at the Wynn Las Vegas</h3>
              <span class="venue">Wynn Las Vegas</span>
              <span class="dates">2026-12-08</span>
              <span class="buy-in">$10,400</span>
              <span class="game">No Limit Hold'em</span>
            </div>
            </body></html>"#,
        ))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);
    let mut entry = source_entry("wpt", "https://www.wpt.com/schedule/");
    entry.fetch_strategy = FetchStrategy::Rendered;
    entry.parse_rule = ParseRule::HtmlCards;
    let mut config = test_config(&db, vec![entry]);
    config.render = Some(RenderConfig {
        endpoint: server.uri(),
        token: None,
        wait_for_selector: Some(".event-card".to_string()),
    });

    let engine = Engine::new(config).expect("Failed to create engine");
    let report = engine.run(RunParams::default()).await.expect("Run failed");

    assert_eq!(report.totals.sources_ok, 1);
    assert_eq!(report.totals.events_added, 1);

    let store = open_store(&db);
    let live = store.live_events("wpt").unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].venue, "Wynn Las Vegas");
    assert_eq!(live[0].buy_in, Some(10_400.0));
}

#[tokio::test]
async fn test_not_due_sources_are_reported_skipped() {
    let server = MockServer::start().await;
    mount_page(&server, "/schedule", TABLE_HTML).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);
    let config = test_config(
        &db,
        vec![source_entry("rgps", &format!("{}/schedule", server.uri()))],
    );
    let engine = Engine::new(config).expect("Failed to create engine");

    // First normal run processes the never-checked source
    engine.run(RunParams::default()).await.expect("Run failed");

    // Immediately after, it is not due; normal mode skips it
    let report = engine.run(RunParams::default()).await.expect("Run failed");
    assert_eq!(report.totals.sources_ok, 0);
    assert_eq!(report.totals.sources_skipped, 1);
    assert!(matches!(
        report.results[0].outcome,
        SourceOutcome::SkippedNotDue
    ));
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_category_filter_limits_scope() {
    let server = MockServer::start().await;
    mount_page(&server, "/venue", TABLE_HTML).await;
    mount_page(&server, "/tour", TABLE_HTML).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);
    let venue = source_entry("local-room", &format!("{}/venue", server.uri()));
    let mut tour = source_entry("big-tour", &format!("{}/tour", server.uri()));
    tour.category = SourceCategory::Tour;
    let config = test_config(&db, vec![venue, tour]);
    let engine = Engine::new(config).expect("Failed to create engine");

    let report = engine
        .run(RunParams {
            category: Some(SourceCategory::Tour),
            ..Default::default()
        })
        .await
        .expect("Run failed");

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].source_id, "big-tour");

    let store = open_store(&db);
    assert!(store.live_events("local-room").unwrap().is_empty());
    assert_eq!(store.live_events("big-tour").unwrap().len(), 2);

    // Registry listing agrees with the filter
    let tours = store
        .list_sources(&SourceFilter {
            category: Some(SourceCategory::Tour),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(tours.len(), 1);
}

#[tokio::test]
async fn test_run_history_is_recorded() {
    let server = MockServer::start().await;
    mount_page(&server, "/schedule", TABLE_HTML).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);
    let config = test_config(
        &db,
        vec![source_entry("wynn", &format!("{}/schedule", server.uri()))],
    );
    let engine = Engine::new(config).expect("Failed to create engine");

    engine.run(RunParams::default()).await.expect("Run failed");
    engine
        .run(RunParams {
            mode: RunMode::Forced,
            ..Default::default()
        })
        .await
        .expect("Run failed");

    let store = open_store(&db);
    let runs = store.recent_runs(10).unwrap();
    assert_eq!(runs.len(), 2);
    // Newest first
    assert_eq!(runs[0].mode, "forced");
    assert_eq!(runs[1].mode, "normal");
    assert_eq!(runs[1].events_added, 2);
}
