//! Fetcher module for retrieving raw source content
//!
//! This module contains the retrieval half of the pipeline:
//! - Strategy dispatch: plain HTTP GET vs headless-rendered retrieval
//! - Per-host rate gating shared across workers
//! - Retry with exponential backoff for transient failures
//! - Typed failure classification
//!
//! Fetching has no side effects beyond the network call itself; all state
//! changes happen downstream of the parser and differ.

mod http;
mod rate_limit;
mod rendered;
mod retry;

pub use http::{build_http_client, fetch_page};
pub use rate_limit::{HostGate, HostPermit};
pub use rendered::RenderClient;
pub use retry::{RetryPolicy, Transition};

use crate::config::{Config, RateLimitConfig};
use crate::registry::{FetchStrategy, Source};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Typed failure for a single fetch attempt
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP status {status}")]
    Http { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("render error: {0}")]
    Render(String),
}

impl FetchError {
    /// Whether the failure is worth retrying within the same run
    ///
    /// Timeouts, network errors, 5xx, and 429 are transient; other 4xx and
    /// render failures are terminal for this cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Http { status } => *status == 429 || (500..=599).contains(status),
            Self::Render(_) => false,
        }
    }
}

/// Successfully fetched raw content
#[derive(Debug, Clone)]
pub struct FetchSuccess {
    /// Final URL after redirects
    pub final_url: String,

    /// HTTP status code
    pub status: u16,

    /// Raw document body
    pub body: String,

    pub fetched_at: DateTime<Utc>,
}

impl FetchSuccess {
    pub fn content_bytes(&self) -> u64 {
        self.body.len() as u64
    }
}

/// Fetcher with strategy dispatch, rate gating, and retry
///
/// One instance is shared by all workers in a run; the host gate is the only
/// cross-worker coordination point.
pub struct Fetcher {
    client: reqwest::Client,
    render: Option<RenderClient>,
    gate: Arc<HostGate>,
    rate_limits: RateLimitConfig,
    retry: RetryPolicy,
}

impl Fetcher {
    /// Builds a fetcher from the run configuration
    ///
    /// The render client is constructed only when a `[render]` section is
    /// present; config validation guarantees one exists whenever the catalog
    /// contains rendered sources.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.fetcher)?;
        let render = match &config.render {
            Some(render_config) => Some(RenderClient::new(
                render_config,
                Duration::from_secs(config.fetcher.timeout_secs),
            )?),
            None => None,
        };

        Ok(Self {
            client,
            render,
            gate: Arc::new(HostGate::new()),
            rate_limits: config.rate_limit.clone(),
            retry: RetryPolicy::from_config(&config.fetcher),
        })
    }

    /// Fetches a source's origin URL, retrying transient failures
    ///
    /// Each attempt holds the per-host gate for its duration, so concurrent
    /// workers never overlap requests to one host and successive request
    /// starts honor the source's rate-limit class spacing. The retry loop
    /// abandons further attempts rather than sleeping past `deadline`.
    pub async fn fetch(
        &self,
        source: &Source,
        deadline: Option<Instant>,
    ) -> Result<FetchSuccess, FetchError> {
        let host = source
            .host()
            .ok_or_else(|| FetchError::Network(format!("invalid origin URL: {}", source.origin_url)))?;
        let spacing = Duration::from_secs(self.rate_limits.spacing_secs(source.rate_limit_class));

        let mut attempt: u32 = 0;
        loop {
            let permit = self.gate.acquire(&host, spacing).await;
            let result = self.attempt(source).await;
            drop(permit);

            match self.retry.transition(attempt, result, deadline) {
                Transition::Done(success) => return Ok(success),
                Transition::Fail(error) => return Err(error),
                Transition::Retry { error, after } => {
                    attempt += 1;
                    tracing::debug!(
                        source_id = %source.id,
                        attempt,
                        backoff_ms = after.as_millis() as u64,
                        "retrying after transient failure: {}",
                        error
                    );
                    tokio::time::sleep(after).await;
                }
            }
        }
    }

    async fn attempt(&self, source: &Source) -> Result<FetchSuccess, FetchError> {
        match source.fetch_strategy {
            FetchStrategy::Http => fetch_page(&self.client, &source.origin_url).await,
            FetchStrategy::Rendered => match &self.render {
                Some(render) => render.content(&source.origin_url).await,
                None => Err(FetchError::Render(
                    "no render endpoint configured".to_string(),
                )),
            },
        }
    }
}
