use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use globset::Glob;
use parking_lot::Mutex;
use searchcore_core::{Fingerprint, ProjectId};
use tokio::time::sleep;
use tracing::warn;

use crate::query_cache::QueryCache;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2_000);
const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Default)]
pub struct InvalidationStats {
    pub records_enqueued: u64,
    pub fingerprints_invalidated: u64,
    pub batches_processed: u64,
    pub failures: u64,
}

/// Reverse indexes from a file/project back to the set of cached fingerprints
/// whose results depended on it, and the debounced drain loop that turns a
/// stream of file events into `QueryCache::invalidate` calls (§4.9).
///
/// A failure here must never corrupt the cache: every invalidation attempt is
/// best-effort, and stale L1/L2/L3 entries still expire by TTL regardless of
/// whether the reverse-index path ever ran.
pub struct CacheInvalidator {
    cache: Arc<QueryCache>,
    by_file: DashMap<String, HashSet<Fingerprint>>,
    by_project: DashMap<ProjectId, HashSet<Fingerprint>>,
    pending: DashMap<String, ()>,
    debounce: Duration,
    batch_size: usize,
    stats: Mutex<InvalidationStats>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<QueryCache>) -> Self {
        Self {
            cache,
            by_file: DashMap::new(),
            by_project: DashMap::new(),
            pending: DashMap::new(),
            debounce: DEFAULT_DEBOUNCE,
            batch_size: DEFAULT_BATCH_SIZE,
            stats: Mutex::new(InvalidationStats::default()),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn stats(&self) -> InvalidationStats {
        self.stats.lock().clone()
    }

    /// Records that `fingerprint`'s cached results were built from `project_id`
    /// plus the given accessed files. Called by whatever wrote the entry into
    /// `QueryCache` (the orchestrator's caller), mirroring `accessed_files` on
    /// `CachedQuery`.
    pub fn record(&self, fingerprint: &Fingerprint, project_id: &ProjectId, files: &HashSet<String>) {
        self.by_project
            .entry(project_id.clone())
            .or_default()
            .insert(fingerprint.clone());
        for file in files {
            self.by_file.entry(file.clone()).or_default().insert(fingerprint.clone());
        }
    }

    /// Schedules a debounced invalidation for one changed file. Multiple
    /// calls for the same path within the debounce window coalesce into a
    /// single pass; the last call wins the timer restart.
    pub async fn on_file_changed(self: &Arc<Self>, path: String) {
        self.stats.lock().records_enqueued += 1;
        if self.pending.contains_key(&path) {
            return;
        }
        self.pending.insert(path.clone(), ());
        let this = Arc::clone(self);
        let debounce = self.debounce;
        tokio::spawn(async move {
            sleep(debounce).await;
            this.pending.remove(&path);
            this.invalidate_file(&path).await;
        });
    }

    async fn invalidate_file(&self, path: &str) {
        let Some((_, fingerprints)) = self.by_file.remove(path) else {
            return;
        };
        self.invalidate_batch(fingerprints.into_iter().collect()).await;
    }

    /// Invalidates every cached fingerprint matching a glob pattern against
    /// the file keys in the reverse index (e.g. `src/auth/**`).
    pub async fn invalidate_pattern(&self, pattern: &str) {
        let glob = match Glob::new(pattern) {
            Ok(g) => g.compile_matcher(),
            Err(e) => {
                warn!("invalid invalidation pattern {pattern}: {e}");
                self.stats.lock().failures += 1;
                return;
            }
        };
        let mut fingerprints = HashSet::new();
        let matched_files: Vec<String> = self
            .by_file
            .iter()
            .filter(|entry| glob.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        for file in matched_files {
            if let Some((_, fps)) = self.by_file.remove(&file) {
                fingerprints.extend(fps);
            }
        }
        self.invalidate_batch(fingerprints.into_iter().collect()).await;
    }

    /// Wipes every fingerprint tagged with `project_id`, used when a project
    /// is removed from the workspace or force-reindexed wholesale.
    pub async fn invalidate_project(&self, project_id: &ProjectId) {
        if let Some((_, fingerprints)) = self.by_project.remove(project_id) {
            self.invalidate_batch(fingerprints.into_iter().collect()).await;
        }
    }

    /// Wipes everything: called on workspace reload, where project ids and
    /// dependency structure may have shifted underneath every cached result.
    pub async fn invalidate_all(&self) {
        let all: HashSet<Fingerprint> = self
            .by_file
            .iter()
            .flat_map(|entry| entry.value().clone())
            .chain(self.by_project.iter().flat_map(|entry| entry.value().clone()))
            .collect();
        self.by_file.clear();
        self.by_project.clear();
        self.invalidate_batch(all.into_iter().collect()).await;
    }

    async fn invalidate_batch(&self, fingerprints: Vec<Fingerprint>) {
        for batch in fingerprints.chunks(self.batch_size) {
            self.stats.lock().batches_processed += 1;
            for fp in batch {
                self.cache.invalidate(fp).await;
                self.remove_from_indexes(fp);
                self.stats.lock().fingerprints_invalidated += 1;
            }
        }
    }

    fn remove_from_indexes(&self, fingerprint: &Fingerprint) {
        self.by_file.retain(|_, set| {
            set.remove(fingerprint);
            !set.is_empty()
        });
        self.by_project.retain(|_, set| {
            set.remove(fingerprint);
            !set.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_cache::InMemorySharedCache;
    use std::collections::HashSet as Set;

    fn new_cache() -> Arc<QueryCache> {
        Arc::new(QueryCache::new(
            Arc::new(InMemorySharedCache::new()),
            Arc::new(InMemorySharedCache::new()),
        ))
    }

    #[tokio::test]
    async fn invalidate_project_wipes_its_fingerprints() {
        let cache = new_cache();
        let invalidator = CacheInvalidator::new(Arc::clone(&cache));
        let fp = Fingerprint("fp1".to_string());
        let project = ProjectId::new("proj_a");
        cache
            .set(fp.clone(), Vec::new(), Default::default(), Set::new())
            .await
            .unwrap();
        invalidator.record(&fp, &project, &Set::new());

        invalidator.invalidate_project(&project).await;

        assert!(cache.get(&fp).await.is_none());
        assert_eq!(invalidator.stats().fingerprints_invalidated, 1);
    }

    #[tokio::test]
    async fn invalidate_pattern_matches_globbed_files() {
        let cache = new_cache();
        let invalidator = CacheInvalidator::new(Arc::clone(&cache));
        let fp = Fingerprint("fp2".to_string());
        let mut files = Set::new();
        files.insert("src/auth/login.rs".to_string());
        cache
            .set(fp.clone(), Vec::new(), Default::default(), files.clone())
            .await
            .unwrap();
        invalidator.record(&fp, &ProjectId::new("proj_b"), &files);

        invalidator.invalidate_pattern("src/auth/**").await;

        assert!(cache.get(&fp).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_all_clears_every_index() {
        let cache = new_cache();
        let invalidator = CacheInvalidator::new(Arc::clone(&cache));
        let fp = Fingerprint("fp3".to_string());
        let project = ProjectId::new("proj_c");
        cache
            .set(fp.clone(), Vec::new(), Default::default(), Set::new())
            .await
            .unwrap();
        invalidator.record(&fp, &project, &Set::new());

        invalidator.invalidate_all().await;

        assert!(invalidator.by_project.is_empty());
        assert!(invalidator.by_file.is_empty());
    }
}
