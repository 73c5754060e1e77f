//! Tourney-Sync main entry point
//!
//! Command-line interface for the tournament schedule synchronization engine.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tourney_sync::config::load_config;
use tourney_sync::engine::{print_report, Engine, RunParams};
use tourney_sync::registry::{SourceCategory, SourceFilter};
use tourney_sync::schedule::RunMode;
use tracing_subscriber::EnvFilter;

/// Tourney-Sync: keep the tournament catalog in sync with its sources
///
/// Each invocation performs one sync run: select due sources, fetch and
/// parse their schedules under rate limits, diff against the stored catalog,
/// and commit the changes per source.
#[derive(Parser, Debug)]
#[command(name = "tourney-sync")]
#[command(version)]
#[command(about = "Tournament schedule synchronization engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Process all enabled sources regardless of due-ness
    #[arg(long, conflicts_with = "source")]
    forced: bool,

    /// Process exactly one source, bypassing enabled/due checks
    #[arg(long, value_name = "SOURCE_ID")]
    source: Option<String>,

    /// Restrict the run to one category (tour, venue, aggregator)
    #[arg(long, value_name = "CATEGORY")]
    category: Option<String>,

    /// Preview the run without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Override worker concurrency for this run
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Override the run deadline in seconds
    #[arg(long, value_name = "SECS")]
    deadline_secs: Option<u64>,

    /// Print a registry status report and exit without syncing
    #[arg(long, conflicts_with_all = ["forced", "source", "dry_run"])]
    report: bool,

    /// Emit the run report as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let code = run_cli(cli).await;
    std::process::exit(code);
}

/// Runs the CLI and maps every path to the documented exit codes:
/// 0 clean, 1 source failures or new degradation, 2 invocation-level error
async fn run_cli(cli: Cli) -> i32 {
    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("Failed to load configuration: {}", error);
            return 2;
        }
    };

    let category = match cli.category.as_deref().map(parse_category).transpose() {
        Ok(category) => category,
        Err(error) => {
            tracing::error!("{}", error);
            return 2;
        }
    };

    let engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(error) => {
            tracing::error!("Failed to initialize engine: {}", error);
            return 2;
        }
    };

    if cli.report {
        return match handle_report(&engine, category) {
            Ok(()) => 0,
            Err(error) => {
                tracing::error!("Failed to generate report: {:#}", error);
                2
            }
        };
    }

    let mode = if let Some(source_id) = cli.source {
        RunMode::Single(source_id)
    } else if cli.forced {
        RunMode::Forced
    } else {
        RunMode::Normal
    };

    let params = RunParams {
        mode,
        dry_run: cli.dry_run,
        category,
        concurrency: cli.concurrency,
        deadline_secs: cli.deadline_secs,
    };

    match engine.run(params).await {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(error) => {
                        tracing::error!("Failed to serialize report: {}", error);
                        return 2;
                    }
                }
            } else {
                print_report(&report);
            }
            report.exit_code()
        }
        Err(error) => {
            tracing::error!("Sync run failed: {}", error);
            2
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tourney_sync=info,warn"),
            1 => EnvFilter::new("tourney_sync=debug,info"),
            2 => EnvFilter::new("tourney_sync=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn parse_category(value: &str) -> anyhow::Result<SourceCategory> {
    SourceCategory::from_db_string(value)
        .with_context(|| format!("unknown category '{}', expected tour, venue, or aggregator", value))
}

/// Handles --report: per-source health, cadence, and last-check summary
fn handle_report(engine: &Engine, category: Option<SourceCategory>) -> anyhow::Result<()> {
    let sources = engine
        .list_sources(&SourceFilter {
            category,
            ..Default::default()
        })
        .context("listing sources")?;

    println!("=== Source Registry Status ===\n");
    println!("Total sources: {}\n", sources.len());

    for source in &sources {
        let cadence_hours = source.refresh_interval_secs / 3600;
        let last_checked = source
            .last_checked_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());

        println!(
            "  {:24} {:10} {:9} every {:>3}h  last checked {}",
            source.id,
            source.category.to_db_string(),
            source.status.to_db_string(),
            cadence_hours,
            last_checked
        );
        if source.consecutive_failures > 0 {
            println!(
                "  {:24} {} consecutive failure(s)",
                "", source.consecutive_failures
            );
        }
    }

    let runs = engine.recent_runs(5).context("listing runs")?;
    if !runs.is_empty() {
        println!("\nRecent runs:");
        for run in &runs {
            println!(
                "  {}  {:8} ok {} / failed {} / skipped {}  (+{} ~{} -{})",
                run.started_at.to_rfc3339(),
                run.mode,
                run.sources_ok,
                run.sources_failed,
                run.sources_skipped,
                run.events_added,
                run.events_updated,
                run.events_removed
            );
        }
    }

    Ok(())
}
