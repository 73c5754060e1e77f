//! Engine coordinator - run orchestration
//!
//! Drives one sync run end to end: seed the registry from config, select the
//! due sources, fan the per-source pipeline (fetch → parse → diff → apply)
//! out over a bounded worker pool, and fold the outcomes into a report.
//!
//! Failure isolation is per source: a worker's failure touches only its own
//! source's registry bookkeeping. The store handle and the fetcher's host
//! gate are the only shared state, and neither is held across a fetch.

use crate::config::{Config, EngineConfig};
use crate::diff::{candidate_fingerprint, diff, StoredEvent};
use crate::engine::reporter::{summarize, RunReport, SourceOutcome, SourceResult};
use crate::fetch::Fetcher;
use crate::parse::{empty_parse_is_plausible, parse, ParseError};
use crate::registry::{AttemptOutcome, FetchStrategy, Source, SourceCategory, SourceFilter, SourceStatus};
use crate::schedule::{select_due, RunMode};
use crate::store::{SqliteStore, Store};
use crate::SyncError;
use chrono::{Datelike, Utc};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Parameters for one engine run
#[derive(Debug, Clone)]
pub struct RunParams {
    pub mode: RunMode,

    /// Select and diff but write nothing: no registry bookkeeping, no event
    /// upserts, no run history
    pub dry_run: bool,

    /// Restrict the run to one catalog category
    pub category: Option<SourceCategory>,

    /// Override the configured worker concurrency for both strategies
    pub concurrency: Option<usize>,

    /// Override the configured run deadline
    pub deadline_secs: Option<u64>,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            mode: RunMode::Normal,
            dry_run: false,
            category: None,
            concurrency: None,
            deadline_secs: None,
        }
    }
}

/// The synchronization engine
///
/// Holds the store handle and fetcher for its lifetime; each call to
/// [`Engine::run`] is one complete sync run.
pub struct Engine {
    config: Arc<Config>,
    store: Arc<Mutex<SqliteStore>>,
    fetcher: Arc<Fetcher>,
}

impl Engine {
    /// Opens the store, seeds the registry from config, and builds clients
    pub fn new(config: Config) -> crate::Result<Self> {
        let mut store = SqliteStore::new(Path::new(&config.storage.database_path))?;

        let seeds: Vec<Source> = config.sources.iter().map(|entry| entry.to_source()).collect();
        if !seeds.is_empty() {
            store.seed_sources(&seeds)?;
            tracing::info!("Seeded registry with {} source definitions", seeds.len());
        }

        let fetcher = Fetcher::new(&config)?;

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(Mutex::new(store)),
            fetcher: Arc::new(fetcher),
        })
    }

    /// Lists registry rows for status reporting
    pub fn list_sources(&self, filter: &SourceFilter) -> crate::Result<Vec<Source>> {
        Ok(self.store.lock().unwrap().list_sources(filter)?)
    }

    /// Most recent run summaries, newest first
    pub fn recent_runs(&self, limit: u32) -> crate::Result<Vec<crate::store::RunRecord>> {
        Ok(self.store.lock().unwrap().recent_runs(limit)?)
    }

    /// Executes one sync run and returns its report
    pub async fn run(&self, params: RunParams) -> crate::Result<RunReport> {
        let started_at = Utc::now();
        let deadline_secs = params
            .deadline_secs
            .unwrap_or(self.config.engine.deadline_secs);
        let deadline = Instant::now() + Duration::from_secs(deadline_secs);

        let filter = SourceFilter {
            category: params.category,
            id: match &params.mode {
                RunMode::Single(id) => Some(id.clone()),
                _ => None,
            },
            enabled_only: false,
        };

        let in_scope = self.store.lock().unwrap().list_sources(&filter)?;

        if let RunMode::Single(id) = &params.mode {
            if in_scope.is_empty() {
                return Err(SyncError::UnknownSource(id.clone()));
            }
        }

        let selected = select_due(
            &in_scope,
            started_at,
            &params.mode,
            self.config.engine.jitter_pct,
        );
        let selected_ids: HashSet<String> =
            selected.iter().map(|source| source.id.clone()).collect();

        tracing::info!(
            mode = %params.mode.label(),
            dry_run = params.dry_run,
            selected = selected.len(),
            in_scope = in_scope.len(),
            "starting sync run"
        );

        let mut results: Vec<SourceResult> = in_scope
            .iter()
            .filter(|source| !selected_ids.contains(&source.id))
            .map(|source| SourceResult {
                source_id: source.id.clone(),
                outcome: SourceOutcome::SkippedNotDue,
                newly_degraded: false,
            })
            .collect();

        let concurrency = |configured: usize| params.concurrency.unwrap_or(configured).max(1);
        let http_semaphore = Arc::new(Semaphore::new(concurrency(
            self.config.engine.http_concurrency,
        )));
        let rendered_semaphore = Arc::new(Semaphore::new(concurrency(
            self.config.engine.rendered_concurrency,
        )));

        let mut workers = JoinSet::new();
        for source in selected {
            let semaphore = match source.fetch_strategy {
                FetchStrategy::Http => http_semaphore.clone(),
                FetchStrategy::Rendered => rendered_semaphore.clone(),
            };
            let store = self.store.clone();
            let fetcher = self.fetcher.clone();
            let engine_config = self.config.engine.clone();
            let dry_run = params.dry_run;

            workers.spawn(async move {
                let source_id = source.id.clone();

                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return SourceResult {
                            source_id,
                            outcome: SourceOutcome::Failed {
                                reason: "worker pool closed".to_string(),
                            },
                            newly_degraded: false,
                        }
                    }
                };

                // Sources whose turn never comes before the deadline
                if Instant::now() >= deadline {
                    return SourceResult {
                        source_id,
                        outcome: SourceOutcome::SkippedDeadline,
                        newly_degraded: false,
                    };
                }

                let pipeline =
                    process_source(store, fetcher, engine_config, source, dry_run, deadline);
                match tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), pipeline)
                    .await
                {
                    Ok(result) => result,
                    // In-flight work aborted at the deadline; nothing was
                    // committed for this source, committed sources stand
                    Err(_) => SourceResult {
                        source_id,
                        outcome: SourceOutcome::Failed {
                            reason: "deadline exceeded".to_string(),
                        },
                        newly_degraded: false,
                    },
                }
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(join_error) => {
                    tracing::error!("worker panicked: {}", join_error);
                }
            }
        }

        let report = summarize(
            params.mode.label(),
            params.dry_run,
            started_at,
            Utc::now(),
            results,
        );

        if !params.dry_run {
            self.store
                .lock()
                .unwrap()
                .record_run(&report.to_run_record())?;
        }

        tracing::info!(
            ok = report.totals.sources_ok,
            failed = report.totals.sources_failed,
            skipped = report.totals.sources_skipped,
            added = report.totals.events_added,
            updated = report.totals.events_updated,
            removed = report.totals.events_removed,
            "sync run finished"
        );

        Ok(report)
    }
}

/// Runs the fetch → parse → diff → apply pipeline for one source
///
/// Every failure path is terminal for this source only; on failure the
/// registry's attempt bookkeeping is the sole write, and in dry-run mode not
/// even that.
async fn process_source(
    store: Arc<Mutex<SqliteStore>>,
    fetcher: Arc<Fetcher>,
    engine_config: EngineConfig,
    source: Source,
    dry_run: bool,
    deadline: Instant,
) -> SourceResult {
    let source_id = source.id.clone();

    let fetched = match fetcher.fetch(&source, Some(deadline)).await {
        Ok(fetched) => fetched,
        Err(error) => {
            tracing::warn!(source_id = %source_id, "fetch failed: {}", error);
            return record_failure(&store, &engine_config, &source, dry_run, error.to_string());
        }
    };
    let content_bytes = fetched.content_bytes();

    let outcome = match parse(&source, &fetched.body, fetched.fetched_at.year()) {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::warn!(source_id = %source_id, "parse failed: {}", error);
            return record_failure(&store, &engine_config, &source, dry_run, error.to_string());
        }
    };

    // Zero events where events used to be is drift, not an empty schedule;
    // previously stored events stay untouched either way
    if outcome.events.is_empty()
        && !empty_parse_is_plausible(
            &source,
            content_bytes,
            engine_config.drift_min_ratio,
            engine_config.drift_max_ratio,
        )
    {
        let error = ParseError::StructuralDrift(format!(
            "zero events parsed, previous run found {}",
            source.last_event_count.unwrap_or(0)
        ));
        tracing::warn!(source_id = %source_id, "{}", error);
        return record_failure(&store, &engine_config, &source, dry_run, error.to_string());
    }

    let fingerprint = candidate_fingerprint(&outcome.events);

    // Cheap short-circuit: nothing changed at all since the last success
    if source.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
        let unchanged = outcome.events.len() as u32;
        if !dry_run {
            let result = store.lock().unwrap().record_attempt(
                &source_id,
                &AttemptOutcome::Success {
                    fingerprint,
                    event_count: unchanged,
                    content_bytes,
                },
                engine_config.failure_threshold,
                Utc::now(),
            );
            if let Err(error) = result {
                return record_failure(&store, &engine_config, &source, dry_run, error.to_string());
            }
        }
        return SourceResult {
            source_id,
            outcome: SourceOutcome::Ok {
                added: 0,
                updated: 0,
                removed: 0,
                unchanged,
                dropped: outcome.dropped,
            },
            newly_degraded: false,
        };
    }

    let previous = {
        let guard = store.lock().unwrap();
        guard.live_events(&source_id)
    };
    let previous: Vec<StoredEvent> = match previous {
        Ok(events) => events
            .into_iter()
            .map(|event| StoredEvent {
                stable_key: event.stable_key,
                content_hash: event.content_hash,
            })
            .collect(),
        Err(error) => {
            return record_failure(&store, &engine_config, &source, dry_run, error.to_string())
        }
    };

    let result = diff(&previous, &outcome.events);
    let unchanged = result.unchanged.len() as u32;

    if dry_run {
        return SourceResult {
            source_id,
            outcome: SourceOutcome::Ok {
                added: result.added.len() as u32,
                updated: result.updated.len() as u32,
                removed: result.removed.len() as u32,
                unchanged,
                dropped: outcome.dropped,
            },
            newly_degraded: false,
        };
    }

    let applied = store.lock().unwrap().apply_diff(
        &source_id,
        &result,
        &fingerprint,
        content_bytes,
        engine_config.failure_threshold,
        Utc::now(),
    );

    match applied {
        Ok(summary) => SourceResult {
            source_id,
            outcome: SourceOutcome::Ok {
                added: summary.added,
                updated: summary.updated,
                removed: summary.removed,
                unchanged,
                dropped: outcome.dropped,
            },
            newly_degraded: false,
        },
        Err(error) => {
            tracing::warn!(source_id = %source_id, "apply failed: {}", error);
            record_failure(&store, &engine_config, &source, dry_run, error.to_string())
        }
    }
}

/// Records a failed attempt against the registry and builds the result row
///
/// Dry runs skip the bookkeeping write entirely. The newly-degraded flag is
/// true only when this attempt crossed the threshold.
fn record_failure(
    store: &Arc<Mutex<SqliteStore>>,
    engine_config: &EngineConfig,
    source: &Source,
    dry_run: bool,
    reason: String,
) -> SourceResult {
    let mut newly_degraded = false;

    if !dry_run {
        let recorded = store.lock().unwrap().record_attempt(
            &source.id,
            &AttemptOutcome::Failure {
                reason: reason.clone(),
            },
            engine_config.failure_threshold,
            Utc::now(),
        );
        match recorded {
            Ok(updated) => {
                newly_degraded = source.status != SourceStatus::Degraded
                    && updated.status == SourceStatus::Degraded;
            }
            Err(error) => {
                tracing::error!(source_id = %source.id, "failed to record attempt: {}", error);
            }
        }
    }

    SourceResult {
        source_id: source.id.clone(),
        outcome: SourceOutcome::Failed { reason },
        newly_degraded,
    }
}
