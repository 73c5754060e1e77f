use crate::registry::{FetchStrategy, ParseRule, RateLimitClass, SourceCategory, SourceStatus};
use chrono::{DateTime, Utc};

/// One external origin the engine synchronizes against
///
/// Definition fields (`display_name` through `enabled`) come from the seeded
/// source catalog; bookkeeping fields are written only by the upsert applier
/// after each attempted sync and survive re-seeding.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub id: String,
    pub display_name: String,
    pub category: SourceCategory,
    pub origin_url: String,
    pub fetch_strategy: FetchStrategy,
    pub parse_rule: ParseRule,
    pub refresh_interval_secs: u64,
    pub rate_limit_class: RateLimitClass,
    pub enabled: bool,

    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_fingerprint: Option<String>,
    pub consecutive_failures: u32,
    pub status: SourceStatus,

    /// Events found by the last successful parse; used to tell a legitimately
    /// empty schedule from structural drift
    pub last_event_count: Option<u32>,

    /// Raw content size of the last successful fetch, same purpose
    pub last_content_bytes: Option<u64>,
}

impl Source {
    /// Host component of the origin URL, used for rate-limit grouping
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.origin_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// Applies the result of one sync attempt to the bookkeeping fields
    ///
    /// Success resets the failure counter and restores `healthy`; failure
    /// increments the counter and flips to `degraded` once it reaches
    /// `failure_threshold`. A disabled source keeps its `disabled` status
    /// either way (the flag is an operator decision, not a health signal).
    pub fn apply_outcome(&mut self, outcome: &AttemptOutcome, failure_threshold: u32, now: DateTime<Utc>) {
        self.last_checked_at = Some(now);
        match outcome {
            AttemptOutcome::Success {
                fingerprint,
                event_count,
                content_bytes,
            } => {
                self.last_success_at = Some(now);
                self.last_fingerprint = Some(fingerprint.clone());
                self.last_event_count = Some(*event_count);
                self.last_content_bytes = Some(*content_bytes);
                self.consecutive_failures = 0;
                if self.status != SourceStatus::Disabled {
                    self.status = SourceStatus::Healthy;
                }
            }
            AttemptOutcome::Failure { .. } => {
                self.consecutive_failures += 1;
                if self.status != SourceStatus::Disabled
                    && self.consecutive_failures >= failure_threshold
                {
                    self.status = SourceStatus::Degraded;
                }
            }
        }
    }
}

/// Result of one attempted sync cycle against a source
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success {
        /// Hash of the full new live-event set
        fingerprint: String,
        event_count: u32,
        content_bytes: u64,
    },
    Failure {
        reason: String,
    },
}

/// Optional filters for registry listing
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    pub category: Option<SourceCategory>,
    pub id: Option<String>,
    pub enabled_only: bool,
}

impl SourceFilter {
    pub fn matches(&self, source: &Source) -> bool {
        if let Some(category) = self.category {
            if source.category != category {
                return false;
            }
        }
        if let Some(ref id) = self.id {
            if &source.id != id {
                return false;
            }
        }
        if self.enabled_only && !source.enabled {
            return false;
        }
        true
    }
}
