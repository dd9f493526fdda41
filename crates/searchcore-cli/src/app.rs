use std::sync::Arc;

use anyhow::{Context, Result};
use searchcore_cache::{CacheInvalidator, InMemorySharedCache, QueryCache};
use searchcore_core::{Metrics, Settings};
use searchcore_index::{FileWatcher, Indexer, WatchMessage};
use searchcore_vector::{
    CollectionRegistry, EmbeddingClient, HashFallbackBackend, InMemoryVectorStore, RankingWeights,
    SearchOrchestrator,
};
use searchcore_workspace::{LoadMode, Workspace};
use tracing::warn;

/// Everything one CLI invocation wires together: the published workspace,
/// the core components behind the trait seams (vector store, embedding
/// backend), and the orchestrator/cache/indexer built on top. Grounded on
/// the teacher's `AppState`, which plays the same role for the HTTP facade.
pub struct AppState {
    pub settings: Arc<Settings>,
    pub workspace: Arc<Workspace>,
    pub vector_store: Arc<dyn searchcore_core::VectorStore>,
    pub registry: Arc<CollectionRegistry>,
    pub embedding_client: Arc<EmbeddingClient>,
    pub orchestrator: Arc<SearchOrchestrator>,
    pub indexer: Arc<Indexer>,
    pub query_cache: Arc<QueryCache>,
    pub invalidator: Arc<CacheInvalidator>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Builds the full wiring from `settings`, loading the workspace document
    /// from `settings.workspace_path`. Every external adapter is the
    /// in-process reference implementation shipped behind its trait seam
    /// (§4.2/§4.8); a production deployment swaps these for real adapters
    /// without touching anything above this function.
    pub async fn build(settings: Settings) -> Result<Self> {
        let settings = Arc::new(settings);

        let workspace_text = tokio::fs::read_to_string(&settings.workspace_path)
            .await
            .with_context(|| format!("reading workspace file {}", settings.workspace_path.display()))?;
        let workspace = Arc::new(
            Workspace::load(&workspace_text, LoadMode::Normal)
                .context("loading workspace document")?,
        );

        let vector_store: Arc<dyn searchcore_core::VectorStore> =
            Arc::new(InMemoryVectorStore::new());
        let registry = Arc::new(CollectionRegistry::new(
            vector_store.clone(),
            settings.embedding_dimension,
        ));

        let backend: Arc<dyn searchcore_core::EmbeddingBackend> =
            Arc::new(HashFallbackBackend::new(settings.embedding_dimension));
        let embedding_client = Arc::new(EmbeddingClient::new(
            backend,
            settings.embedding_batch_size,
            settings.cache_l1_max_items,
        ));

        let orchestrator = Arc::new(SearchOrchestrator::new(
            vector_store.clone(),
            embedding_client.clone(),
            registry.clone(),
            RankingWeights::default(),
        ));

        let indexer = Arc::new(Indexer::new(
            registry.clone(),
            embedding_client.clone(),
            vector_store.clone(),
            settings.index_worker_count,
            settings.index_max_file_bytes,
        ));

        let l2: Arc<dyn searchcore_core::SharedCache> = Arc::new(InMemorySharedCache::new());
        let l3: Arc<dyn searchcore_core::SharedCache> = Arc::new(InMemorySharedCache::new());
        let query_cache = Arc::new(QueryCache::new(l2, l3));
        let invalidator = Arc::new(
            CacheInvalidator::new(query_cache.clone())
                .with_debounce(std::time::Duration::from_secs_f64(settings.invalidation_debounce_seconds))
                .with_batch_size(settings.invalidation_batch_size),
        );

        let metrics = Arc::new(Metrics::new());

        Ok(Self {
            settings,
            workspace,
            vector_store,
            registry,
            embedding_client,
            orchestrator,
            indexer,
            query_cache,
            invalidator,
            metrics,
        })
    }

    /// Starts a watcher over every enabled project root. Callers still need
    /// to drain its receiver; use `spawn_watch_pipeline` to do that plus the
    /// indexer/invalidator wiring in one call.
    pub fn spawn_watcher(&self) -> Result<Arc<FileWatcher>> {
        let watcher = Arc::new(FileWatcher::new(
            self.settings.watcher_channel_capacity,
            std::time::Duration::from_millis(self.settings.watcher_debounce_ms),
            self.settings.watcher_channel_capacity / 2,
        ));
        let snapshot = self.workspace.current();
        for project in &snapshot.projects {
            if !project.indexing_policy.enabled {
                continue;
            }
            watcher.watch_project(
                project.id.clone(),
                project.path.clone(),
                &project.indexing_policy.exclude_globs,
            )?;
        }
        Ok(watcher)
    }

    /// Starts the watcher and spawns the background tasks that make it do
    /// something: one draining `WatchMessage`s into `indexer.enqueue()` and
    /// `invalidator.on_file_changed()`, and one per worker slot draining the
    /// indexer's queue via `run_once()`. This is the File Watcher → {Indexer,
    /// Cache Invalidator} data flow (§4.4); `serve` runs it for the lifetime
    /// of the process.
    pub fn spawn_watch_pipeline(self: &Arc<Self>) -> Result<Arc<FileWatcher>> {
        let watcher = self.spawn_watcher()?;

        let mut receiver = watcher
            .take_receiver()
            .context("watcher receiver already taken")?;
        let state = self.clone();
        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                match message {
                    WatchMessage::Event(event) => {
                        let priority = state
                            .workspace
                            .current()
                            .project(&event.project_id)
                            .map(|p| p.indexing_policy.priority)
                            .unwrap_or_default();
                        let path = event.path.display().to_string();
                        state.indexer.enqueue(event, priority);
                        state.invalidator.on_file_changed(path).await;
                    }
                    WatchMessage::Shutdown(_) => break,
                }
            }
        });

        for _ in 0..self.settings.index_worker_count.max(1) {
            let state = self.clone();
            tokio::spawn(async move {
                loop {
                    match state.indexer.run_once().await {
                        Some(outcome) => {
                            if !outcome.errors.is_empty() {
                                warn!(
                                    project_id = %outcome.project_id,
                                    path = %outcome.path,
                                    errors = ?outcome.errors,
                                    "indexing pass finished with errors"
                                );
                            }
                        }
                        None => tokio::time::sleep(std::time::Duration::from_millis(50)).await,
                    }
                }
            });
        }

        Ok(watcher)
    }
}
