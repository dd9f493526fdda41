use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use searchcore_core::{
    CacheStats, CacheTier, CachedQuery, Fingerprint, Result, SearchCoreError, SearchMetrics,
    SearchResult, SharedCache,
};
use tokio::sync::Mutex as AsyncMutex;

const DEFAULT_L1_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_L2_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_L3_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_L1_MAX_ITEMS: usize = 10_000;

struct L1Entry {
    query: CachedQuery,
    bytes: usize,
}

/// Three-tier query cache (§4.8). L1 is in-process LRU+TTL; L2 is an
/// in-process reference `SharedCache` standing in for a network KV store,
/// promoting to L1 on hit; L3 is precompute-only, written solely through
/// `precompute_query`. Grounded on the teacher's `QueryCache`
/// (`DashMap` + LRU `VecDeque` + stats) generalized to three tiers.
pub struct QueryCache {
    l1: DashMap<Fingerprint, L1Entry>,
    l1_lru: Mutex<VecDeque<Fingerprint>>,
    l1_max_items: usize,
    l2: Arc<dyn SharedCache>,
    l3: Arc<dyn SharedCache>,
    stats: Mutex<CacheStats>,
    in_flight: DashMap<Fingerprint, Arc<AsyncMutex<()>>>,
}

impl QueryCache {
    pub fn new(l2: Arc<dyn SharedCache>, l3: Arc<dyn SharedCache>) -> Self {
        Self {
            l1: DashMap::new(),
            l1_lru: Mutex::new(VecDeque::new()),
            l1_max_items: DEFAULT_L1_MAX_ITEMS,
            l2,
            l3,
            stats: Mutex::new(CacheStats::default()),
            in_flight: DashMap::new(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<(Vec<SearchResult>, SearchMetrics)> {
        let now = Utc::now();
        if let Some(entry) = self.l1.get(fingerprint) {
            if !entry.query.is_expired(now) {
                self.stats.lock().hits_l1 += 1;
                self.touch_lru(fingerprint);
                return Some((entry.query.results.clone(), entry.query.metrics.clone()));
            }
        }
        self.l1.remove(fingerprint);

        if let Ok(Some(bytes)) = self.l2.get(&fingerprint.0).await {
            if let Ok(cached) = serde_json::from_slice::<CachedQuery>(&bytes) {
                if !cached.is_expired(now) {
                    self.stats.lock().hits_l2 += 1;
                    self.promote_to_l1(fingerprint.clone(), cached.clone());
                    return Some((cached.results, cached.metrics));
                }
            }
        }

        if let Ok(Some(bytes)) = self.l3.get(&fingerprint.0).await {
            if let Ok(cached) = serde_json::from_slice::<CachedQuery>(&bytes) {
                if !cached.is_expired(now) {
                    self.stats.lock().hits_l3 += 1;
                    return Some((cached.results, cached.metrics));
                }
            }
        }

        self.stats.lock().misses += 1;
        None
    }

    /// Writes `results` to L1 and L2 with the configured TTL, single-flight
    /// per fingerprint: concurrent `set`s for the same fingerprint serialize
    /// rather than race.
    pub async fn set(
        &self,
        fingerprint: Fingerprint,
        results: Vec<SearchResult>,
        metrics: SearchMetrics,
        accessed_files: HashSet<String>,
    ) -> Result<()> {
        let lock = self
            .in_flight
            .entry(fingerprint.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let cached = CachedQuery {
            fingerprint: fingerprint.clone(),
            results,
            metrics,
            created_at: Utc::now(),
            ttl: DEFAULT_L1_TTL,
            accessed_files,
        };
        self.promote_to_l1(fingerprint.clone(), cached.clone());

        let mut l2_cached = cached;
        l2_cached.ttl = DEFAULT_L2_TTL;
        let bytes = serde_json::to_vec(&l2_cached)
            .map_err(|e| SearchCoreError::CacheUnavailable(e.to_string()))?;
        self.l2.set(&fingerprint.0, bytes, DEFAULT_L2_TTL).await?;

        self.in_flight.remove(&fingerprint);
        Ok(())
    }

    /// Writes to L3 only; callers use this through a privileged precompute
    /// path, never the regular query path.
    pub async fn precompute_query(
        &self,
        fingerprint: Fingerprint,
        results: Vec<SearchResult>,
        metrics: SearchMetrics,
        ttl: Duration,
    ) -> Result<()> {
        let cached = CachedQuery {
            fingerprint: fingerprint.clone(),
            results,
            metrics,
            created_at: Utc::now(),
            ttl: ttl.max(DEFAULT_L3_TTL),
            accessed_files: HashSet::new(),
        };
        let bytes = serde_json::to_vec(&cached).map_err(|e| SearchCoreError::CacheUnavailable(e.to_string()))?;
        self.l3.set(&fingerprint.0, bytes, cached.ttl).await
    }

    pub async fn invalidate(&self, fingerprint: &Fingerprint) {
        self.l1.remove(fingerprint);
        let _ = self.l2.remove(&fingerprint.0).await;
        let _ = self.l3.remove(&fingerprint.0).await;
    }

    fn promote_to_l1(&self, fingerprint: Fingerprint, cached: CachedQuery) {
        let bytes = std::mem::size_of_val(&cached) + cached.results.len() * 256;
        if self.l1.len() >= self.l1_max_items {
            self.evict_l1_one();
        }
        self.l1.insert(fingerprint.clone(), L1Entry { query: cached, bytes });
        self.touch_lru(&fingerprint);
        self.stats.lock().bytes_l1 += bytes as u64;
    }

    fn touch_lru(&self, fingerprint: &Fingerprint) {
        let mut lru = self.l1_lru.lock();
        lru.retain(|f| f != fingerprint);
        lru.push_back(fingerprint.clone());
    }

    fn evict_l1_one(&self) {
        let evicted = self.l1_lru.lock().pop_front();
        if let Some(fp) = evicted {
            if let Some((_, entry)) = self.l1.remove(&fp) {
                let mut stats = self.stats.lock();
                stats.evictions_l1 += 1;
                stats.bytes_l1 = stats.bytes_l1.saturating_sub(entry.bytes as u64);
            }
        }
    }

    pub fn tier_for_test(&self, fingerprint: &Fingerprint) -> Option<CacheTier> {
        if self.l1.contains_key(fingerprint) {
            Some(CacheTier::L1)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_cache::InMemorySharedCache;

    fn sample_metrics() -> SearchMetrics {
        SearchMetrics::default()
    }

    #[tokio::test]
    async fn set_then_get_hits_l1() {
        let cache = QueryCache::new(
            Arc::new(InMemorySharedCache::new()),
            Arc::new(InMemorySharedCache::new()),
        );
        let fp = Fingerprint("abc".to_string());
        cache
            .set(fp.clone(), Vec::new(), sample_metrics(), HashSet::new())
            .await
            .unwrap();
        let hit = cache.get(&fp).await;
        assert!(hit.is_some());
        assert_eq!(cache.stats().hits_l1, 1);
    }

    #[tokio::test]
    async fn miss_increments_misses() {
        let cache = QueryCache::new(
            Arc::new(InMemorySharedCache::new()),
            Arc::new(InMemorySharedCache::new()),
        );
        let fp = Fingerprint("missing".to_string());
        assert!(cache.get(&fp).await.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn invalidate_removes_from_l1() {
        let cache = QueryCache::new(
            Arc::new(InMemorySharedCache::new()),
            Arc::new(InMemorySharedCache::new()),
        );
        let fp = Fingerprint("xyz".to_string());
        cache
            .set(fp.clone(), Vec::new(), sample_metrics(), HashSet::new())
            .await
            .unwrap();
        cache.invalidate(&fp).await;
        assert!(cache.get(&fp).await.is_none());
    }
}
