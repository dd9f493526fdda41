use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::enums::{Intent, Scope};
use crate::ids::ProjectId;

/// A typed entity extracted from a query by the Query Analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    FilePath { value: String, exists: bool },
    Identifier { value: String, known: bool },
    ErrorMessage { value: String },
}

/// Output of the Query Analyzer (§4.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub original: String,
    pub intent: Intent,
    pub entities: Vec<Entity>,
    pub expanded_terms: Vec<String>,
    pub keywords: Vec<String>,
    pub confidence: f32,
    pub estimated_budget: usize,
}

/// User-supplied filters on a `SearchRequest` (§3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub file_types: HashSet<String>,
    #[serde(default)]
    pub directories: HashSet<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub min_score: Option<f32>,
    #[serde(default)]
    pub authors: HashSet<String>,
    #[serde(default)]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_to: Option<DateTime<Utc>>,
}

impl SearchFilters {
    /// True if this filter can be entirely pushed down to the vector store's
    /// filter language (equality / set-membership on scalar payload fields);
    /// exclude-patterns over `file_path` cannot, and are applied after merge.
    pub fn pushdown_only(&self) -> SearchFilters {
        SearchFilters {
            file_types: self.file_types.clone(),
            directories: HashSet::new(),
            exclude_patterns: Vec::new(),
            min_score: None,
            authors: self.authors.clone(),
            date_from: self.date_from,
            date_to: self.date_to,
        }
    }
}

/// A request to the Search Orchestrator (§3 / §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub scope: Scope,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub include_dependencies: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    /// Short context of recently touched files, folded into the cache
    /// fingerprint per §4.8; not a filter.
    #[serde(default)]
    pub recent_files: Vec<String>,
}

fn default_limit() -> usize {
    10
}

pub const MAX_QUERY_LEN: usize = 2048;

impl SearchRequest {
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::SearchCoreError;
        if self.query.trim().is_empty() {
            return Err(SearchCoreError::QueryEmpty);
        }
        if self.query.len() > MAX_QUERY_LEN {
            return Err(SearchCoreError::QueryTooLong {
                len: self.query.len(),
                max: MAX_QUERY_LEN,
            });
        }
        if matches!(self.scope, Scope::Project | Scope::Dependencies | Scope::Related)
            && self.project_id.is_none()
        {
            return Err(SearchCoreError::MissingProjectId);
        }
        Ok(())
    }
}

/// Per-signal score breakdown, exposed for debugging and the testable
/// properties around ranking (§4.7).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub vector_similarity: f32,
    pub project_priority: f32,
    pub relationship_boost: f32,
    pub recency: f32,
    pub exact_match: f32,
    pub proximity: f32,
    pub entity_match: f32,
}

/// A single file-level result (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub file_path: String,
    pub file_name: String,
    pub file_type: String,
    pub project_id: ProjectId,
    pub project_name: String,
    pub snippet: String,
    pub line_start: u32,
    pub line_end: u32,
    pub similarity_score: f32,
    pub confidence_score: f32,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub relationship_context: Vec<ProjectId>,
    pub score_breakdown: ScoreBreakdown,
    pub modified_time: DateTime<Utc>,
}

/// Diagnostics returned alongside a search response (§4.6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchMetrics {
    pub total_time_ms: u64,
    pub projects_searched: usize,
    pub projects_searched_list: Vec<ProjectId>,
    pub total_results_before_merge: usize,
    pub total_results_after_merge: usize,
    pub deduplicated_count: usize,
    pub embedding_time_ms: u64,
    pub search_time_ms: u64,
    pub ranking_time_ms: u64,
    pub cancelled_projects: Vec<ProjectId>,
    pub per_project_errors: Vec<(ProjectId, String)>,
    pub warning: Option<String>,
}
