//! Configuration module for Tourney-Sync
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, including the seeded source catalog (`[[source]]` blocks).
//!
//! # Example
//!
//! ```no_run
//! use tourney_sync::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Failure threshold: {}", config.engine.failure_threshold);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, EngineConfig, FetcherConfig, RateLimitConfig, RenderConfig, SourceEntry,
    StorageConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
