use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use searchcore_core::{
    CallContext, FilterValue, PayloadFilter, Project, ProjectId, Result, Scope, ScoreBreakdown,
    SearchCoreError, SearchFilters, SearchMetrics, SearchRequest, SearchResult,
};
use searchcore_workspace::WorkspaceSnapshot;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::embedding::EmbeddingClient;
use crate::ranker::{score_result, tie_break, RankingContext, RankingWeights};
use crate::registry::{CollectionKind, CollectionRegistry};

pub struct SearchOrchestrator {
    vector_store: Arc<dyn searchcore_core::VectorStore>,
    embedding_client: Arc<EmbeddingClient>,
    registry: Arc<CollectionRegistry>,
    ranking_weights: RankingWeights,
}

impl SearchOrchestrator {
    pub fn new(
        vector_store: Arc<dyn searchcore_core::VectorStore>,
        embedding_client: Arc<EmbeddingClient>,
        registry: Arc<CollectionRegistry>,
        ranking_weights: RankingWeights,
    ) -> Self {
        Self {
            vector_store,
            embedding_client,
            registry,
            ranking_weights,
        }
    }

    /// Resolves `request.scope` to a concrete project set (§4.6).
    fn resolve_scope(&self, workspace: &WorkspaceSnapshot, request: &SearchRequest) -> Result<Vec<ProjectId>> {
        match request.scope {
            Scope::Project => {
                let id = request.project_id.clone().ok_or(SearchCoreError::MissingProjectId)?;
                Ok(vec![id])
            }
            Scope::Dependencies => {
                let id = request.project_id.clone().ok_or(SearchCoreError::MissingProjectId)?;
                let mut ids = vec![id.clone()];
                if request.include_dependencies {
                    ids.extend(workspace.graph.transitive_dependencies(&id));
                } else {
                    ids.extend(workspace.graph.direct_dependencies(&id));
                }
                Ok(ids)
            }
            Scope::Workspace => Ok(workspace
                .projects
                .iter()
                .filter(|p| p.indexing_policy.enabled)
                .map(|p| p.id.clone())
                .collect()),
            Scope::Related => {
                let id = request.project_id.clone().ok_or(SearchCoreError::MissingProjectId)?;
                let mut ids = vec![id.clone()];
                ids.extend(
                    workspace
                        .graph
                        .related_projects(&id, workspace.similarity_threshold)
                        .into_iter()
                        .map(|(pid, _)| pid),
                );
                Ok(ids)
            }
        }
    }

    /// Runs a full (non-streaming) search and returns ranked results plus
    /// diagnostics.
    pub async fn search(
        &self,
        workspace: &WorkspaceSnapshot,
        request: &SearchRequest,
    ) -> Result<(Vec<SearchResult>, SearchMetrics)> {
        request.validate()?;
        let start = Instant::now();
        let project_ids = self.resolve_scope(workspace, request)?;

        let embed_start = Instant::now();
        let embeddings = self
            .embedding_client
            .embed(&[request.query.clone()], &CallContext::new())
            .await?;
        let query_vector = embeddings.into_iter().next().unwrap_or_default();
        let embedding_time_ms = embed_start.elapsed().as_millis() as u64;

        let k = request.limit * workspace.fanout_multiplier.max(1);
        let pushdown_filter = translate_filter(&request.filters);
        let cancellation = CancellationToken::new();
        let semaphore = Arc::new(Semaphore::new(workspace.max_concurrent_searches.max(1)));

        let search_start = Instant::now();
        let mut tasks = Vec::with_capacity(project_ids.len());
        for project_id in &project_ids {
            let Some(project) = workspace.project(project_id) else {
                continue;
            };
            if !project.indexing_policy.enabled {
                continue;
            }
            let collection = CollectionRegistry::collection_name(project_id, CollectionKind::Code);
            let store = self.vector_store.clone();
            let vector = query_vector.clone();
            let filter = pushdown_filter.clone();
            let semaphore = semaphore.clone();
            let token = cancellation.child_token();
            let pid = project_id.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                if token.is_cancelled() {
                    return (pid, Err(SearchCoreError::Cancelled));
                }
                let ctx = CallContext {
                    cancellation: token,
                    deadline: None,
                };
                let result = store.search(&collection, &vector, k, filter, &ctx).await;
                (pid, result)
            }));
        }

        let mut merged: HashMap<(ProjectId, String, u32, u32), SearchResult> = HashMap::new();
        let mut total_before_merge = 0usize;
        let mut per_project_errors = Vec::new();
        let mut cancelled_projects = Vec::new();
        let mut top_scores: Vec<f32> = Vec::new();

        for task in tasks {
            let (project_id, outcome) = task.await.map_err(|e| SearchCoreError::Bug(e.to_string()))?;
            match outcome {
                Ok(hits) => {
                    total_before_merge += hits.len();
                    let Some(project) = workspace.project(&project_id) else { continue };
                    for hit in hits {
                        top_scores.push(hit.score);
                        let result = hit_to_result(hit, project);
                        let key = (
                            result.project_id.clone(),
                            result.file_path.clone(),
                            result.line_start,
                            result.line_end,
                        );
                        merged
                            .entry(key)
                            .and_modify(|existing| {
                                if result.similarity_score > existing.similarity_score {
                                    *existing = result.clone();
                                }
                            })
                            .or_insert(result);
                    }
                    top_scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
                    if top_scores.len() >= request.limit
                        && top_scores[..request.limit.min(top_scores.len())]
                            .iter()
                            .all(|s| *s >= workspace.early_termination_threshold)
                    {
                        cancellation.cancel();
                    }
                }
                Err(SearchCoreError::Cancelled) => cancelled_projects.push(project_id),
                Err(err) => {
                    warn!("search failed for project {project_id}: {err}");
                    per_project_errors.push((project_id, err.to_string()));
                }
            }
        }

        let total_after_merge = merged.len();
        let mut results: Vec<SearchResult> = merged.into_values().collect();
        apply_non_pushdown_filters(&mut results, &request.filters);

        let ranking_start = Instant::now();
        let dependency_ids: HashSet<ProjectId> = request
            .project_id
            .as_ref()
            .map(|id| workspace.graph.direct_dependencies(id).into_iter().collect())
            .unwrap_or_default();
        let target = request.project_id.clone().unwrap_or_else(|| ProjectId::new(""));
        let min_score = request.filters.min_score.unwrap_or(0.0);
        let mut kept = Vec::with_capacity(results.len());
        for mut result in results {
            let priority = workspace
                .project(&result.project_id)
                .map(|p| p.indexing_policy.priority)
                .unwrap_or_default();
            let relationship_weight = workspace
                .graph
                .related_projects(&target, 0.0)
                .into_iter()
                .find(|(pid, _)| *pid == result.project_id)
                .map(|(_, w)| w);
            let ctx = RankingContext {
                query_keywords: &[],
                query_entities: &[],
                target_project_id: &target,
                direct_dependency_ids: &dependency_ids,
                relationship_weight,
                anchor_file_path: request.recent_files.first().map(String::as_str),
                min_score,
            };
            if score_result(&mut result, priority, &self.ranking_weights, &ctx) {
                kept.push(result);
            }
        }
        kept.sort_by(rank_order);
        kept.truncate(request.limit);
        let ranking_time_ms = ranking_start.elapsed().as_millis() as u64;
        let search_time_ms = search_start.elapsed().as_millis() as u64;

        let metrics = SearchMetrics {
            total_time_ms: start.elapsed().as_millis() as u64,
            projects_searched: project_ids.len(),
            projects_searched_list: project_ids,
            total_results_before_merge: total_before_merge,
            total_results_after_merge: total_after_merge,
            deduplicated_count: total_before_merge.saturating_sub(total_after_merge),
            embedding_time_ms,
            search_time_ms,
            ranking_time_ms,
            cancelled_projects,
            per_project_errors,
            warning: if self.embedding_client.is_fallback() {
                Some("embeddings served by deterministic fallback backend".to_string())
            } else {
                None
            },
        };

        Ok((kept, metrics))
    }

    /// Streaming variant: emits each project's results as they complete,
    /// never emitting a lower-scored result after a higher-scored one has
    /// already gone out. Ends when fan-out completes or the receiver drops.
    pub async fn search_streaming(
        &self,
        workspace: &WorkspaceSnapshot,
        request: &SearchRequest,
        sender: mpsc::Sender<SearchResult>,
    ) -> Result<SearchMetrics> {
        let (results, metrics) = self.search(workspace, request).await?;
        let mut floor = f32::MAX;
        let mut ordered = results;
        ordered.sort_by(rank_order);
        for result in ordered {
            if result.confidence_score > floor {
                continue;
            }
            floor = result.confidence_score;
            if sender.send(result).await.is_err() {
                break;
            }
        }
        Ok(metrics)
    }
}

/// Primary search ordering: highest `confidence_score` first, falling back
/// to `tie_break` (raw similarity, then recency, then file path) only when
/// confidence scores are equal. `score_result` must have already run so
/// `confidence_score` is populated.
fn rank_order(a: &SearchResult, b: &SearchResult) -> std::cmp::Ordering {
    b.confidence_score
        .partial_cmp(&a.confidence_score)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| tie_break(a, b))
}

fn hit_to_result(hit: searchcore_core::VectorHit, project: &Project) -> SearchResult {
    let file_path = hit
        .payload
        .get("file_path")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let line_start = hit.payload.get("line_start").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let line_end = hit.payload.get("line_end").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let snippet = hit.payload.get("snippet").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let modified_time = hit
        .payload
        .get("modified_time")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now);
    let file_name = file_path.rsplit('/').next().unwrap_or(&file_path).to_string();
    let file_type = file_name.rsplit_once('.').map(|(_, ext)| ext.to_string()).unwrap_or_default();

    SearchResult {
        file_path,
        file_name,
        file_type,
        project_id: project.id.clone(),
        project_name: project.name.clone(),
        snippet,
        line_start,
        line_end,
        similarity_score: hit.score,
        confidence_score: 0.0,
        metadata: hit.payload,
        relationship_context: Vec::new(),
        score_breakdown: ScoreBreakdown::default(),
        modified_time,
    }
}

fn translate_filter(filters: &SearchFilters) -> Option<PayloadFilter> {
    let pushdown = filters.pushdown_only();
    if pushdown.file_types.is_empty() && pushdown.authors.is_empty() {
        return None;
    }
    let mut map: PayloadFilter = HashMap::new();
    if !pushdown.file_types.is_empty() {
        map.insert(
            "file_type".to_string(),
            FilterValue::In(pushdown.file_types.iter().map(|t| serde_json::Value::String(t.clone())).collect()),
        );
    }
    if !pushdown.authors.is_empty() {
        map.insert(
            "author".to_string(),
            FilterValue::In(pushdown.authors.iter().map(|a| serde_json::Value::String(a.clone())).collect()),
        );
    }
    Some(map)
}

fn apply_non_pushdown_filters(results: &mut Vec<SearchResult>, filters: &SearchFilters) {
    if !filters.directories.is_empty() {
        results.retain(|r| filters.directories.iter().any(|d| r.file_path.starts_with(d.as_str())));
    }
    if !filters.exclude_patterns.is_empty() {
        results.retain(|r| {
            !filters
                .exclude_patterns
                .iter()
                .any(|pattern| glob_match(pattern, &r.file_path))
        });
    }
}

fn glob_match(pattern: &str, path: &str) -> bool {
    globset::Glob::new(pattern)
        .map(|g| g.compile_matcher().is_match(path))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchcore_core::ScoreBreakdown;

    #[test]
    fn translate_filter_empty_is_none() {
        let filters = SearchFilters::default();
        assert!(translate_filter(&filters).is_none());
    }

    fn result_with(similarity: f32, confidence: f32, file_path: &str) -> SearchResult {
        SearchResult {
            file_path: file_path.to_string(),
            file_name: file_path.to_string(),
            file_type: "rs".to_string(),
            project_id: ProjectId::new("demo"),
            project_name: "demo".to_string(),
            snippet: String::new(),
            line_start: 1,
            line_end: 1,
            similarity_score: similarity,
            confidence_score: confidence,
            metadata: serde_json::Map::new(),
            relationship_context: Vec::new(),
            score_breakdown: ScoreBreakdown::default(),
            modified_time: chrono::Utc::now(),
        }
    }

    /// A result with lower raw vector similarity but a higher overall
    /// `confidence_score` (because other signals pushed it up) must still
    /// rank first — `rank_order` is not just raw cosine similarity.
    #[test]
    fn rank_order_prefers_confidence_score_over_raw_similarity() {
        let mut results = vec![
            result_with(0.9, 0.4, "backend_best.rs"),
            result_with(0.5, 0.8, "frontend_best.rs"),
        ];
        results.sort_by(rank_order);
        assert_eq!(results[0].file_path, "frontend_best.rs");
    }

    #[test]
    fn rank_order_falls_back_to_tie_break_on_equal_confidence() {
        let mut results = vec![
            result_with(0.5, 0.6, "z.rs"),
            result_with(0.9, 0.6, "a.rs"),
        ];
        results.sort_by(rank_order);
        // Equal confidence_score: tie_break prefers higher raw similarity.
        assert_eq!(results[0].file_path, "a.rs");
    }
}
