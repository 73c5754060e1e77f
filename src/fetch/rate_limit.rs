//! Per-host request gating
//!
//! Sources sharing a host share one gate. Holding the gate across the request
//! means at most one in-flight request per host regardless of worker
//! concurrency; the recorded start time enforces the minimum spacing between
//! successive request starts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct HostState {
    last_start: Option<Instant>,
}

/// Shared per-host rate gate
pub struct HostGate {
    hosts: Mutex<HashMap<String, Arc<Mutex<HostState>>>>,
}

/// Exclusive lease on a host, held for the duration of one request
///
/// Dropping the permit releases the host to the next waiter.
pub struct HostPermit {
    _guard: OwnedMutexGuard<HostState>,
}

impl HostGate {
    pub fn new() -> Self {
        Self {
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until a request to `host` may start, then returns the permit
    ///
    /// The wait covers both conditions: any in-flight request to the host
    /// must finish (the inner mutex), and at least `spacing` must have
    /// elapsed since the previous request start.
    pub async fn acquire(&self, host: &str, spacing: Duration) -> HostPermit {
        let cell = {
            let mut hosts = self.hosts.lock().await;
            hosts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(HostState::default())))
                .clone()
        };

        let mut guard = cell.lock_owned().await;
        if let Some(last) = guard.last_start {
            let elapsed = last.elapsed();
            if elapsed < spacing {
                tokio::time::sleep(spacing - elapsed).await;
            }
        }
        guard.last_start = Some(Instant::now());

        HostPermit { _guard: guard }
    }
}

impl Default for HostGate {
    fn default() -> Self {
        Self::new()
    }
}
