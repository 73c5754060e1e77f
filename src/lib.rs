//! Tourney-Sync: a tournament schedule synchronization engine
//!
//! This crate keeps a canonical catalog of live poker-tournament events in
//! sync with heterogeneous external sources (tour sites, venue pages,
//! aggregators). Each run selects the sources that are due, fetches them
//! under per-host rate limits, normalizes the extracted events, diffs them
//! against the last known state, and commits the changes atomically per
//! source.

pub mod config;
pub mod diff;
pub mod engine;
pub mod fetch;
pub mod parse;
pub mod registry;
pub mod schedule;
pub mod store;

use thiserror::Error;

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] store::StoreError),

    #[error("Fetch error for source {source_id}: {source}")]
    Fetch {
        source_id: String,
        #[source]
        source: fetch::FetchError,
    },

    #[error("Parse error for source {source_id}: {source}")]
    Parse {
        source_id: String,
        #[source]
        source: parse::ParseError,
    },

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Run deadline exceeded")]
    DeadlineExceeded,

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use engine::{Engine, RunParams, RunReport};
pub use registry::{Source, SourceStatus};
pub use schedule::RunMode;
