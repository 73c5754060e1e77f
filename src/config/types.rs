use crate::registry::{FetchStrategy, ParseRule, RateLimitClass, Source, SourceCategory, SourceStatus};
use serde::Deserialize;

/// Main configuration structure for Tourney-Sync
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub render: Option<RenderConfig>,
    pub storage: StorageConfig,
    #[serde(rename = "source", default)]
    pub sources: Vec<SourceEntry>,
}

/// Engine behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Consecutive failures before a source is marked degraded
    #[serde(rename = "failure-threshold", default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Worker concurrency for plain-HTTP sources
    #[serde(rename = "http-concurrency", default = "default_http_concurrency")]
    pub http_concurrency: usize,

    /// Worker concurrency for rendered sources (each holds a browser tab)
    #[serde(rename = "rendered-concurrency", default = "default_rendered_concurrency")]
    pub rendered_concurrency: usize,

    /// Overall run deadline in seconds
    #[serde(rename = "deadline-secs", default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Due-check jitter as a percentage of the refresh interval
    #[serde(rename = "jitter-pct", default = "default_jitter_pct")]
    pub jitter_pct: u8,

    /// Raw content size bounds (vs the last successful fetch) inside which a
    /// zero-event parse may be accepted as a legitimately empty schedule
    #[serde(rename = "drift-min-ratio", default = "default_drift_min_ratio")]
    pub drift_min_ratio: f64,
    #[serde(rename = "drift-max-ratio", default = "default_drift_max_ratio")]
    pub drift_max_ratio: f64,
}

/// Fetcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// User-agent header sent with plain-HTTP fetches
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Total request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum redirect hops before the fetch fails
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Additional attempts after the first for transient failures
    #[serde(rename = "retry-max-attempts", default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// Exponential backoff base in seconds (doubles per retry)
    #[serde(rename = "retry-base-secs", default = "default_retry_base_secs")]
    pub retry_base_secs: u64,

    /// Backoff cap in seconds
    #[serde(rename = "retry-cap-secs", default = "default_retry_cap_secs")]
    pub retry_cap_secs: u64,
}

/// Minimum inter-request spacing per rate-limit class, in seconds
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(rename = "default-secs", default = "default_rate_default_secs")]
    pub default_secs: u64,

    #[serde(rename = "gentle-secs", default = "default_rate_gentle_secs")]
    pub gentle_secs: u64,

    #[serde(rename = "strict-secs", default = "default_rate_strict_secs")]
    pub strict_secs: u64,
}

impl RateLimitConfig {
    /// Spacing for a class, as configured
    pub fn spacing_secs(&self, class: RateLimitClass) -> u64 {
        match class {
            RateLimitClass::Default => self.default_secs,
            RateLimitClass::Gentle => self.gentle_secs,
            RateLimitClass::Strict => self.strict_secs,
        }
    }
}

/// Headless-render service configuration
///
/// Required only when the catalog contains `rendered` sources.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Base URL of the browserless-style render service
    pub endpoint: String,

    /// Optional API token appended as a query parameter
    #[serde(default)]
    pub token: Option<String>,

    /// CSS selector to wait for before the page counts as ready; when absent
    /// the service's network-idle default applies
    #[serde(rename = "wait-for-selector", default)]
    pub wait_for_selector: Option<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// One seeded source definition (`[[source]]` block)
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    pub id: String,

    #[serde(rename = "display-name")]
    pub display_name: String,

    pub category: SourceCategory,

    #[serde(rename = "origin-url")]
    pub origin_url: String,

    #[serde(rename = "fetch-strategy")]
    pub fetch_strategy: FetchStrategy,

    #[serde(rename = "parse-rule")]
    pub parse_rule: ParseRule,

    #[serde(rename = "refresh-interval-hours")]
    pub refresh_interval_hours: u64,

    #[serde(rename = "rate-limit-class", default = "default_rate_limit_class")]
    pub rate_limit_class: RateLimitClass,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SourceEntry {
    /// Builds a fresh registry row from this definition
    ///
    /// Bookkeeping fields start empty; when the row already exists in the
    /// store, seeding updates only the definition fields.
    pub fn to_source(&self) -> Source {
        Source {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            category: self.category,
            origin_url: self.origin_url.clone(),
            fetch_strategy: self.fetch_strategy,
            parse_rule: self.parse_rule,
            refresh_interval_secs: self.refresh_interval_hours * 3600,
            rate_limit_class: self.rate_limit_class,
            enabled: self.enabled,
            last_checked_at: None,
            last_success_at: None,
            last_fingerprint: None,
            consecutive_failures: 0,
            status: if self.enabled {
                SourceStatus::Healthy
            } else {
                SourceStatus::Disabled
            },
            last_event_count: None,
            last_content_bytes: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            http_concurrency: default_http_concurrency(),
            rendered_concurrency: default_rendered_concurrency(),
            deadline_secs: default_deadline_secs(),
            jitter_pct: default_jitter_pct(),
            drift_min_ratio: default_drift_min_ratio(),
            drift_max_ratio: default_drift_max_ratio(),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_redirects: default_max_redirects(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_secs: default_retry_base_secs(),
            retry_cap_secs: default_retry_cap_secs(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_secs: default_rate_default_secs(),
            gentle_secs: default_rate_gentle_secs(),
            strict_secs: default_rate_strict_secs(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_http_concurrency() -> usize {
    4
}

fn default_rendered_concurrency() -> usize {
    1
}

fn default_deadline_secs() -> u64 {
    900
}

fn default_jitter_pct() -> u8 {
    10
}

fn default_drift_min_ratio() -> f64 {
    0.25
}

fn default_drift_max_ratio() -> f64 {
    4.0
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36"
        .to_string()
}

fn default_timeout_secs() -> u64 {
    45
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_redirects() -> usize {
    5
}

fn default_retry_max_attempts() -> u32 {
    2
}

fn default_retry_base_secs() -> u64 {
    2
}

fn default_retry_cap_secs() -> u64 {
    30
}

fn default_rate_default_secs() -> u64 {
    4
}

fn default_rate_gentle_secs() -> u64 {
    5
}

fn default_rate_strict_secs() -> u64 {
    3
}

fn default_rate_limit_class() -> RateLimitClass {
    RateLimitClass::Default
}

fn default_enabled() -> bool {
    true
}
