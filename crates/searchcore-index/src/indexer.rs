use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use searchcore_core::{
    CallContext, Chunk, FileEventKind, FilterValue, PayloadFilter, Priority, ProjectId,
    SearchCoreError, VectorRecord,
};
use searchcore_vector::{CollectionKind, CollectionRegistry, EmbeddingClient};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::chunker::chunk_file;
use crate::watcher::FileEvent;

/// Per-file indexing outcome, kept so a caller (CLI, tests) can report
/// partial-index state instead of only success/failure.
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub project_id: ProjectId,
    pub path: String,
    pub chunks_total: usize,
    pub chunks_embedded: usize,
    pub chunks_failed: usize,
    pub errors: Vec<String>,
}

/// Tracks the single in-flight task per `(project_id, path)`; a second event
/// for the same file while one is running coalesces to "retry with the
/// latest version once the current pass finishes" rather than running
/// concurrently.
struct InFlight {
    generation: u64,
}

/// Per-project priority queue entry.
struct QueuedEvent {
    event: FileEvent,
}

/// Chunks, embeds, and upserts file content into the correct project
/// collection (§4.3). A failed embed isolates to the one chunk; the file is
/// left in a partial-index state with recorded errors and retried on its
/// next event.
pub struct Indexer {
    registry: Arc<CollectionRegistry>,
    embedding_client: Arc<EmbeddingClient>,
    vector_store: Arc<dyn searchcore_core::VectorStore>,
    content_hashes: DashMap<(ProjectId, String), Vec<String>>,
    in_flight: DashMap<(ProjectId, String), InFlight>,
    queues: Mutex<HashMap<Priority, VecDeque<QueuedEvent>>>,
    worker_permits: Arc<Semaphore>,
    max_file_bytes: u64,
}

impl Indexer {
    pub fn new(
        registry: Arc<CollectionRegistry>,
        embedding_client: Arc<EmbeddingClient>,
        vector_store: Arc<dyn searchcore_core::VectorStore>,
        worker_count: usize,
        max_file_bytes: u64,
    ) -> Self {
        Self {
            registry,
            embedding_client,
            vector_store,
            content_hashes: DashMap::new(),
            in_flight: DashMap::new(),
            queues: Mutex::new(HashMap::new()),
            worker_permits: Arc::new(Semaphore::new(worker_count.max(1))),
            max_file_bytes,
        }
    }

    /// Enqueues a file event by its project's priority. Draining respects a
    /// weighted-fair order (critical > high > normal > low) so a burst of
    /// low-priority projects cannot starve a critical one.
    pub fn enqueue(&self, event: FileEvent, priority: Priority) {
        self.queues
            .lock()
            .entry(priority)
            .or_default()
            .push_back(QueuedEvent { event });
    }

    /// Pops the next event to process, honoring priority order with a
    /// weighted round-robin so lower tiers still make progress: critical is
    /// drained 4 events to 1 against the next tier, then high 3:1, etc.
    fn dequeue(&self) -> Option<(FileEvent, Priority)> {
        const ORDER: [(Priority, usize); 4] = [
            (Priority::Critical, 4),
            (Priority::High, 3),
            (Priority::Normal, 2),
            (Priority::Low, 1),
        ];
        let mut queues = self.queues.lock();
        for (priority, weight) in ORDER {
            for _ in 0..weight {
                if let Some(queue) = queues.get_mut(&priority) {
                    if let Some(queued) = queue.pop_front() {
                        return Some((queued.event, priority));
                    }
                }
            }
        }
        None
    }

    pub async fn run_once(&self) -> Option<IndexOutcome> {
        let (event, _priority) = self.dequeue()?;
        Some(self.process(event).await)
    }

    pub async fn process(&self, event: FileEvent) -> IndexOutcome {
        let key = (event.project_id.clone(), event.path.display().to_string());
        let generation = self
            .in_flight
            .entry(key.clone())
            .and_modify(|f| f.generation += 1)
            .or_insert(InFlight { generation: 0 })
            .generation;

        let _permit = self.worker_permits.acquire().await.ok();

        // If a newer event for this file arrived while we waited for a
        // permit, skip this stale generation; the newer one will run.
        if self
            .in_flight
            .get(&key)
            .map(|f| f.generation != generation)
            .unwrap_or(false)
        {
            return IndexOutcome {
                project_id: event.project_id,
                path: event.path.display().to_string(),
                chunks_total: 0,
                chunks_embedded: 0,
                chunks_failed: 0,
                errors: vec!["superseded by a newer event".to_string()],
            };
        }

        let outcome = match event.kind {
            FileEventKind::Deleted => self.handle_delete(&event).await,
            FileEventKind::Created | FileEventKind::Modified => self.handle_upsert(&event).await,
        };

        self.in_flight.remove_if(&key, |_, f| f.generation == generation);
        outcome
    }

    async fn handle_delete(&self, event: &FileEvent) -> IndexOutcome {
        let collection = CollectionRegistry::collection_name(&event.project_id, CollectionKind::Code);
        let mut filter: PayloadFilter = HashMap::new();
        filter.insert(
            "file_path".to_string(),
            FilterValue::Eq(serde_json::Value::String(event.path.display().to_string())),
        );
        let ctx = CallContext::new();
        let mut errors = Vec::new();
        if let Err(e) = self.vector_store.delete_by_filter(&collection, filter, &ctx).await {
            errors.push(e.to_string());
        }
        self.content_hashes.remove(&(event.project_id.clone(), event.path.display().to_string()));
        IndexOutcome {
            project_id: event.project_id.clone(),
            path: event.path.display().to_string(),
            chunks_total: 0,
            chunks_embedded: 0,
            chunks_failed: 0,
            errors,
        }
    }

    async fn handle_upsert(&self, event: &FileEvent) -> IndexOutcome {
        let path_str = event.path.display().to_string();
        let mut errors = Vec::new();

        let metadata = match tokio::fs::metadata(&event.path).await {
            Ok(m) => m,
            Err(e) => {
                return IndexOutcome {
                    project_id: event.project_id.clone(),
                    path: path_str,
                    chunks_total: 0,
                    chunks_embedded: 0,
                    chunks_failed: 0,
                    errors: vec![format!("stat failed: {e}")],
                };
            }
        };
        if metadata.len() > self.max_file_bytes {
            warn!("skipping oversized file {path_str} ({} bytes)", metadata.len());
            return IndexOutcome {
                project_id: event.project_id.clone(),
                path: path_str,
                chunks_total: 0,
                chunks_embedded: 0,
                chunks_failed: 0,
                errors: vec!["file exceeds max_file_bytes".to_string()],
            };
        }

        let content = match tokio::fs::read_to_string(&event.path).await {
            Ok(c) => c,
            Err(e) => {
                return IndexOutcome {
                    project_id: event.project_id.clone(),
                    path: path_str,
                    chunks_total: 0,
                    chunks_embedded: 0,
                    chunks_failed: 0,
                    errors: vec![format!("unreadable: {e}")],
                };
            }
        };

        let language = language_from_extension(&event.path);
        let chunks = chunk_file(&event.project_id, &path_str, language, &content, None);

        let hash_key = (event.project_id.clone(), path_str.clone());
        let previous_hashes = self.content_hashes.get(&hash_key).map(|v| v.value().clone()).unwrap_or_default();
        let to_embed: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| previous_hashes.get(c.chunk_index).map(|h| h != &c.content_hash).unwrap_or(true))
            .collect();

        let collection = match self.registry.ensure(&event.project_id, CollectionKind::Code).await {
            Ok(name) => name,
            Err(e) => {
                error!("failed to ensure collection for {}: {e}", event.project_id);
                return IndexOutcome {
                    project_id: event.project_id.clone(),
                    path: path_str,
                    chunks_total: chunks.len(),
                    chunks_embedded: 0,
                    chunks_failed: chunks.len(),
                    errors: vec![e.to_string()],
                };
            }
        };

        let mut embedded = 0;
        let mut failed = 0;
        let ctx = CallContext::new();
        for chunk in &to_embed {
            match self.embedding_client.embed(&[chunk.content.clone()], &ctx).await {
                Ok(vectors) => {
                    let vector = vectors.into_iter().next().unwrap_or_default();
                    let mut payload = serde_json::Map::new();
                    payload.insert("file_path".into(), serde_json::Value::String(path_str.clone()));
                    payload.insert("line_start".into(), serde_json::Value::from(chunk.line_start));
                    payload.insert("line_end".into(), serde_json::Value::from(chunk.line_end));
                    payload.insert("snippet".into(), serde_json::Value::String(chunk.content.clone()));
                    payload.insert("modified_time".into(), serde_json::Value::String(chunk.modified_time.to_rfc3339()));

                    let record = VectorRecord {
                        id: chunk.id.to_string(),
                        vector,
                        payload,
                    };
                    match self.vector_store.upsert(&collection, vec![record], &ctx).await {
                        Ok(()) => embedded += 1,
                        Err(e) => {
                            failed += 1;
                            errors.push(format!("upsert failed for chunk {}: {e}", chunk.chunk_index));
                        }
                    }
                }
                Err(e) => {
                    failed += 1;
                    errors.push(format!("embed failed for chunk {}: {e}", chunk.chunk_index));
                }
            }
        }

        self.content_hashes.insert(
            hash_key,
            chunks.iter().map(|c| c.content_hash.clone()).collect(),
        );

        if failed > 0 {
            warn!("{path_str}: {failed} chunk(s) failed, file left in partial-index state");
        } else {
            info!("{path_str}: indexed {embedded} chunk(s)");
        }

        IndexOutcome {
            project_id: event.project_id.clone(),
            path: path_str,
            chunks_total: chunks.len(),
            chunks_embedded: embedded,
            chunks_failed: failed,
            errors,
        }
    }
}

fn language_from_extension(path: &Path) -> Option<&'static str> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("rs") => Some("rust"),
        Some("py") => Some("python"),
        Some("ts") | Some("tsx") => Some("typescript"),
        Some("js") | Some("jsx") => Some("javascript"),
        Some("go") => Some("go"),
        Some("java") => Some("java"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_dequeue_favors_critical() {
        let indexer = Indexer::new(
            Arc::new(CollectionRegistry::new(
                Arc::new(searchcore_vector::InMemoryVectorStore::new()),
                8,
            )),
            Arc::new(EmbeddingClient::new(
                Arc::new(searchcore_vector::HashFallbackBackend::new(8)),
                4,
                10,
            )),
            Arc::new(searchcore_vector::InMemoryVectorStore::new()),
            2,
            1024,
        );
        for _ in 0..5 {
            indexer.enqueue(
                FileEvent {
                    project_id: ProjectId::new("low_proj"),
                    path: "a.rs".into(),
                    kind: FileEventKind::Modified,
                },
                Priority::Low,
            );
        }
        indexer.enqueue(
            FileEvent {
                project_id: ProjectId::new("critical_proj"),
                path: "b.rs".into(),
                kind: FileEventKind::Modified,
            },
            Priority::Critical,
        );
        let (_, priority) = indexer.dequeue().unwrap();
        assert_eq!(priority, Priority::Critical);
    }

    #[tokio::test]
    async fn process_indexes_a_real_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("auth.rs");
        tokio::fs::write(&file_path, "fn authenticate() -> bool {\n    true\n}\n")
            .await
            .unwrap();

        let indexer = Indexer::new(
            Arc::new(CollectionRegistry::new(
                Arc::new(searchcore_vector::InMemoryVectorStore::new()),
                8,
            )),
            Arc::new(EmbeddingClient::new(
                Arc::new(searchcore_vector::HashFallbackBackend::new(8)),
                4,
                10,
            )),
            Arc::new(searchcore_vector::InMemoryVectorStore::new()),
            2,
            1024 * 1024,
        );

        let outcome = indexer
            .process(FileEvent {
                project_id: ProjectId::new("demo"),
                path: file_path.clone(),
                kind: FileEventKind::Modified,
            })
            .await;

        assert_eq!(outcome.chunks_total, 1);
        assert_eq!(outcome.chunks_embedded, 1);
        assert!(outcome.errors.is_empty());

        // Re-indexing unchanged content embeds nothing new.
        let second = indexer
            .process(FileEvent {
                project_id: ProjectId::new("demo"),
                path: file_path,
                kind: FileEventKind::Modified,
            })
            .await;
        assert_eq!(second.chunks_embedded, 0);
    }

    #[tokio::test]
    async fn process_reports_unreadable_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does_not_exist.rs");

        let indexer = Indexer::new(
            Arc::new(CollectionRegistry::new(
                Arc::new(searchcore_vector::InMemoryVectorStore::new()),
                8,
            )),
            Arc::new(EmbeddingClient::new(
                Arc::new(searchcore_vector::HashFallbackBackend::new(8)),
                4,
                10,
            )),
            Arc::new(searchcore_vector::InMemoryVectorStore::new()),
            2,
            1024,
        );

        let outcome = indexer
            .process(FileEvent {
                project_id: ProjectId::new("demo"),
                path: missing,
                kind: FileEventKind::Modified,
            })
            .await;

        assert_eq!(outcome.chunks_total, 0);
        assert!(!outcome.errors.is_empty());
    }
}
