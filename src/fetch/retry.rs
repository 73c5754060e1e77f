//! Retry state machine for transient fetch failures
//!
//! Each attempt resolves to one of three transitions: done, retry after a
//! backoff, or fail. Deadline handling is a single check at the transition —
//! a retry whose backoff would sleep past the run deadline is abandoned and
//! the last error reported instead.

use crate::config::FetcherConfig;
use crate::fetch::{FetchError, FetchSuccess};
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

/// Backoff and retry-count policy for one run
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    max_retries: u32,
    base: Duration,
    cap: Duration,
}

/// Outcome of one attempt under the policy
#[derive(Debug)]
pub enum Transition {
    Done(FetchSuccess),
    Retry { error: FetchError, after: Duration },
    Fail(FetchError),
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base: Duration, cap: Duration) -> Self {
        Self {
            max_retries,
            base,
            cap,
        }
    }

    pub fn from_config(config: &FetcherConfig) -> Self {
        Self::new(
            config.retry_max_attempts,
            Duration::from_secs(config.retry_base_secs),
            Duration::from_secs(config.retry_cap_secs),
        )
    }

    /// Classifies the result of attempt number `attempt` (zero-based)
    pub fn transition(
        &self,
        attempt: u32,
        result: Result<FetchSuccess, FetchError>,
        deadline: Option<Instant>,
    ) -> Transition {
        let error = match result {
            Ok(success) => return Transition::Done(success),
            Err(error) => error,
        };

        if !error.is_transient() || attempt >= self.max_retries {
            return Transition::Fail(error);
        }

        let after = self.backoff(attempt);
        if let Some(deadline) = deadline {
            if Instant::now() + after >= deadline {
                return Transition::Fail(error);
            }
        }

        Transition::Retry { error, after }
    }

    /// Exponential backoff with a bounded deterministic jitter
    ///
    /// Doubling from the base per attempt, capped, plus up to 25% skew
    /// derived by hashing the attempt number.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base
            .saturating_mul(1u32 << attempt.min(10))
            .min(self.cap);

        let mut hasher = Sha256::new();
        hasher.update(attempt.to_le_bytes());
        let digest = hasher.finalize();
        let jitter_pct = u64::from(digest[0]) % 25;
        let jitter = exp.mul_f64(jitter_pct as f64 / 100.0);

        (exp + jitter).min(self.cap)
    }
}
