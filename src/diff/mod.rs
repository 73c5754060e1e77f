//! Differ module
//!
//! Computes the minimal change set between a source's previously stored live
//! events and the freshly parsed candidates. Pure function of its two inputs:
//! no clock, no iteration-order dependence — the same inputs always produce
//! the same partitions.

use crate::parse::EventCandidate;
use std::collections::{BTreeMap, BTreeSet};

/// A previously stored live event, reduced to what diffing needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub stable_key: String,
    pub content_hash: String,
}

/// Partitions of one source's diff, keyed by stable key
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    /// Candidates whose key was not live before
    pub added: Vec<EventCandidate>,

    /// Candidates whose key was live with a different content hash
    pub updated: Vec<EventCandidate>,

    /// Keys live before but absent from the new parse; retired, not deleted
    pub removed: Vec<String>,

    /// Keys live before with an identical content hash; no write issued
    pub unchanged: Vec<String>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Partitions `candidates` against `previous` live events
///
/// Duplicate candidate keys collapse to the first occurrence in document
/// order. Output vectors are ordered by stable key.
pub fn diff(previous: &[StoredEvent], candidates: &[EventCandidate]) -> DiffResult {
    let previous_by_key: BTreeMap<&str, &StoredEvent> = previous
        .iter()
        .map(|event| (event.stable_key.as_str(), event))
        .collect();

    let mut deduped: BTreeMap<&str, &EventCandidate> = BTreeMap::new();
    for candidate in candidates {
        deduped.entry(candidate.stable_key.as_str()).or_insert(candidate);
    }

    let mut result = DiffResult::default();

    for (key, candidate) in &deduped {
        match previous_by_key.get(key) {
            None => result.added.push((*candidate).clone()),
            Some(stored) if stored.content_hash != candidate.content_hash => {
                result.updated.push((*candidate).clone())
            }
            Some(_) => result.unchanged.push((*key).to_string()),
        }
    }

    for key in previous_by_key.keys() {
        if !deduped.contains_key(key) {
            result.removed.push((*key).to_string());
        }
    }

    result
}

/// Fingerprint of a full live-event set: hash over sorted (key, hash) pairs
///
/// Comparing this against the registry's stored fingerprint short-circuits
/// field-level diffing when nothing changed at all.
pub fn fingerprint(live: &[StoredEvent]) -> String {
    use sha2::{Digest, Sha256};

    let mut pairs: Vec<(&str, &str)> = live
        .iter()
        .map(|event| (event.stable_key.as_str(), event.content_hash.as_str()))
        .collect();
    pairs.sort();

    let mut hasher = Sha256::new();
    for (key, hash) in pairs {
        hasher.update(key.as_bytes());
        hasher.update([0x1f]);
        hasher.update(hash.as_bytes());
        hasher.update([0x1e]);
    }
    hex::encode(hasher.finalize())
}

/// Fingerprint of the candidate set that would become live if applied
pub fn candidate_fingerprint(candidates: &[EventCandidate]) -> String {
    let mut seen = BTreeSet::new();
    let as_stored: Vec<StoredEvent> = candidates
        .iter()
        .filter(|candidate| seen.insert(candidate.stable_key.as_str()))
        .map(|candidate| StoredEvent {
            stable_key: candidate.stable_key.clone(),
            content_hash: candidate.content_hash.clone(),
        })
        .collect();
    fingerprint(&as_stored)
}
