use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::ids::Fingerprint;
use crate::query::{SearchMetrics, SearchResult};

/// One cached query, as stored in any of the three tiers (§3 / §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedQuery {
    pub fingerprint: Fingerprint,
    pub results: Vec<SearchResult>,
    pub metrics: SearchMetrics,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
    /// File paths whose content contributed to `results`; the Invalidator's
    /// reverse index is built from this set.
    pub accessed_files: HashSet<String>,
}

impl CachedQuery {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        match age.to_std() {
            Ok(age) => age > self.ttl,
            Err(_) => false,
        }
    }
}

/// Which tier served (or would serve) a cache operation; used by `CacheStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    L1,
    L2,
    L3,
}

/// Aggregate cache statistics (§4.8: "hits per tier, misses, evictions, bytes
/// per tier, average latency per tier").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits_l1: u64,
    pub hits_l2: u64,
    pub hits_l3: u64,
    pub misses: u64,
    pub evictions_l1: u64,
    pub evictions_l2: u64,
    pub bytes_l1: u64,
    pub bytes_l2: u64,
    pub avg_latency_l1_us: u64,
    pub avg_latency_l2_us: u64,
    pub avg_latency_l3_us: u64,
}

impl CacheStats {
    pub fn total_hits(&self) -> u64 {
        self.hits_l1 + self.hits_l2 + self.hits_l3
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total_hits() + self.misses;
        if total == 0 {
            0.0
        } else {
            self.total_hits() as f64 / total as f64
        }
    }
}
