//! Run reporting
//!
//! Aggregates per-source results into a structured report. `summarize` is a
//! pure function of the run's accumulated results; rendering (text or JSON)
//! and the exit code are derived from the report, never from engine state.

use crate::store::RunRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one source within a run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SourceOutcome {
    Ok {
        added: u32,
        updated: u32,
        removed: u32,
        unchanged: u32,
        dropped: u32,
    },
    Failed {
        reason: String,
    },
    SkippedNotDue,
    SkippedDeadline,
}

impl SourceOutcome {
    pub fn label(&self) -> String {
        match self {
            Self::Ok { .. } => "ok".to_string(),
            Self::Failed { reason } => format!("failed:{}", reason),
            Self::SkippedNotDue => "skipped:not-due".to_string(),
            Self::SkippedDeadline => "skipped:deadline".to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// One source's line in the report
#[derive(Debug, Clone, Serialize)]
pub struct SourceResult {
    pub source_id: String,
    pub outcome: SourceOutcome,

    /// The source crossed the failure threshold during this run
    pub newly_degraded: bool,
}

/// Aggregate counters across the run
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunTotals {
    pub sources_ok: u32,
    pub sources_failed: u32,
    pub sources_skipped: u32,
    pub events_added: u32,
    pub events_updated: u32,
    pub events_removed: u32,
    pub candidates_dropped: u32,
}

/// Structured report for one engine run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<SourceResult>,
    pub totals: RunTotals,
    pub newly_degraded: Vec<String>,
}

impl RunReport {
    /// Exit code for a CLI invocation: 0 clean, 1 failures or new degradation
    pub fn exit_code(&self) -> i32 {
        if self.totals.sources_failed > 0 || !self.newly_degraded.is_empty() {
            1
        } else {
            0
        }
    }

    /// Row for the run history table
    pub fn to_run_record(&self) -> RunRecord {
        RunRecord {
            id: 0,
            started_at: self.started_at,
            finished_at: self.finished_at,
            mode: self.mode.clone(),
            sources_ok: self.totals.sources_ok,
            sources_failed: self.totals.sources_failed,
            sources_skipped: self.totals.sources_skipped,
            events_added: self.totals.events_added,
            events_updated: self.totals.events_updated,
            events_removed: self.totals.events_removed,
        }
    }
}

/// Builds the report from accumulated per-source results
pub fn summarize(
    mode: String,
    dry_run: bool,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    mut results: Vec<SourceResult>,
) -> RunReport {
    results.sort_by(|a, b| a.source_id.cmp(&b.source_id));

    let mut totals = RunTotals::default();
    let mut newly_degraded = Vec::new();

    for result in &results {
        match &result.outcome {
            SourceOutcome::Ok {
                added,
                updated,
                removed,
                dropped,
                ..
            } => {
                totals.sources_ok += 1;
                totals.events_added += added;
                totals.events_updated += updated;
                totals.events_removed += removed;
                totals.candidates_dropped += dropped;
            }
            SourceOutcome::Failed { .. } => totals.sources_failed += 1,
            SourceOutcome::SkippedNotDue | SourceOutcome::SkippedDeadline => {
                totals.sources_skipped += 1
            }
        }
        if result.newly_degraded {
            newly_degraded.push(result.source_id.clone());
        }
    }

    RunReport {
        mode,
        dry_run,
        started_at,
        finished_at,
        results,
        totals,
        newly_degraded,
    }
}

/// Prints the report to stdout in a formatted manner
pub fn print_report(report: &RunReport) {
    println!("=== Sync Run Report ===\n");

    println!(
        "Mode: {}{}",
        report.mode,
        if report.dry_run { " (dry run)" } else { "" }
    );
    println!(
        "Duration: {:.1}s",
        (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
    );
    println!();

    println!("Sources:");
    for result in &report.results {
        println!("  {:24} {}", result.source_id, result.outcome.label());
    }
    println!();

    println!("Totals:");
    println!("  ok: {}", report.totals.sources_ok);
    println!("  failed: {}", report.totals.sources_failed);
    println!("  skipped: {}", report.totals.sources_skipped);
    println!(
        "  events: +{} ~{} -{}",
        report.totals.events_added, report.totals.events_updated, report.totals.events_removed
    );
    if report.totals.candidates_dropped > 0 {
        println!("  dropped candidates: {}", report.totals.candidates_dropped);
    }

    if !report.newly_degraded.is_empty() {
        println!();
        println!("Newly degraded ({}):", report.newly_degraded.len());
        for source_id in &report.newly_degraded {
            println!("  - {}", source_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(source_id: &str, added: u32) -> SourceResult {
        SourceResult {
            source_id: source_id.to_string(),
            outcome: SourceOutcome::Ok {
                added,
                updated: 0,
                removed: 0,
                unchanged: 0,
                dropped: 0,
            },
            newly_degraded: false,
        }
    }

    fn failed(source_id: &str, newly_degraded: bool) -> SourceResult {
        SourceResult {
            source_id: source_id.to_string(),
            outcome: SourceOutcome::Failed {
                reason: "timeout".to_string(),
            },
            newly_degraded,
        }
    }

    fn build(results: Vec<SourceResult>) -> RunReport {
        let now = Utc::now();
        summarize("normal".to_string(), false, now, now, results)
    }

    #[test]
    fn test_totals_and_ordering() {
        let report = build(vec![ok("wsop", 3), failed("wpt", false), ok("aria", 2)]);

        assert_eq!(report.totals.sources_ok, 2);
        assert_eq!(report.totals.sources_failed, 1);
        assert_eq!(report.totals.events_added, 5);
        assert_eq!(
            report
                .results
                .iter()
                .map(|r| r.source_id.as_str())
                .collect::<Vec<_>>(),
            vec!["aria", "wpt", "wsop"]
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(build(vec![ok("wsop", 0)]).exit_code(), 0);

        let skipped = SourceResult {
            source_id: "wpt".to_string(),
            outcome: SourceOutcome::SkippedNotDue,
            newly_degraded: false,
        };
        assert_eq!(build(vec![ok("wsop", 0), skipped]).exit_code(), 0);

        assert_eq!(build(vec![failed("wpt", false)]).exit_code(), 1);

        // A success elsewhere does not mask new degradation
        let mut degraded_ok = ok("wsop", 1);
        degraded_ok.newly_degraded = true;
        assert_eq!(build(vec![degraded_ok]).exit_code(), 1);
    }

    #[test]
    fn test_newly_degraded_collected() {
        let report = build(vec![failed("wpt", true), failed("mspt", true)]);
        assert_eq!(report.newly_degraded, vec!["mspt", "wpt"]);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(
            SourceOutcome::Ok {
                added: 1,
                updated: 0,
                removed: 0,
                unchanged: 0,
                dropped: 0
            }
            .label(),
            "ok"
        );
        assert_eq!(
            SourceOutcome::Failed {
                reason: "HTTP status 500".to_string()
            }
            .label(),
            "failed:HTTP status 500"
        );
        assert_eq!(SourceOutcome::SkippedNotDue.label(), "skipped:not-due");
        assert_eq!(SourceOutcome::SkippedDeadline.label(), "skipped:deadline");
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = build(vec![ok("wsop", 1), failed("wpt", true)]);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["mode"], "normal");
        assert_eq!(json["totals"]["sources_failed"], 1);
        assert_eq!(json["results"][0]["outcome"]["kind"], "failed");
    }
}
