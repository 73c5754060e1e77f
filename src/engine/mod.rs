//! Engine module: run orchestration and reporting
//!
//! The coordinator drives one sync run over a bounded worker pool; the
//! reporter folds the per-source results into the structured run report
//! handed to the caller.

mod coordinator;
mod reporter;

pub use coordinator::{Engine, RunParams};
pub use reporter::{
    print_report, summarize, RunReport, RunTotals, SourceOutcome, SourceResult,
};
