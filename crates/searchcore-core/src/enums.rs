use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SearchCoreError;

/// Indexing priority for a project. Closed set per the design note on
/// modeling finite concepts as tagged variants rather than free strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Multiplier applied by the Context Ranker's `project_priority` signal.
    pub fn weight_multiplier(self) -> f32 {
        match self {
            Priority::Critical => 1.5,
            Priority::High => 1.2,
            Priority::Normal => 1.0,
            Priority::Low => 0.7,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Priority {
    type Err = SearchCoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(SearchCoreError::Bug(format!("unknown priority: {other}"))),
        }
    }
}

/// Relationship edge kinds, closed per §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Imports,
    ApiClient,
    SharedDatabase,
    EventDriven,
    SemanticSimilarity,
    Dependency,
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelationshipKind::Imports => "imports",
            RelationshipKind::ApiClient => "api_client",
            RelationshipKind::SharedDatabase => "shared_database",
            RelationshipKind::EventDriven => "event_driven",
            RelationshipKind::SemanticSimilarity => "semantic_similarity",
            RelationshipKind::Dependency => "dependency",
        };
        write!(f, "{s}")
    }
}

impl FromStr for RelationshipKind {
    type Err = SearchCoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "imports" => Ok(RelationshipKind::Imports),
            "api_client" => Ok(RelationshipKind::ApiClient),
            "shared_database" => Ok(RelationshipKind::SharedDatabase),
            "event_driven" => Ok(RelationshipKind::EventDriven),
            "semantic_similarity" => Ok(RelationshipKind::SemanticSimilarity),
            "dependency" => Ok(RelationshipKind::Dependency),
            other => Err(SearchCoreError::UnknownRelationshipKind(other.to_string())),
        }
    }
}

/// Search scope, closed per §3/§4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    Project,
    Dependencies,
    Workspace,
    Related,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Project => "PROJECT",
            Scope::Dependencies => "DEPENDENCIES",
            Scope::Workspace => "WORKSPACE",
            Scope::Related => "RELATED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Scope {
    type Err = SearchCoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PROJECT" => Ok(Scope::Project),
            "DEPENDENCIES" => Ok(Scope::Dependencies),
            "WORKSPACE" => Ok(Scope::Workspace),
            "RELATED" => Ok(Scope::Related),
            other => Err(SearchCoreError::InvalidScope(other.to_string())),
        }
    }
}

/// Query intent, closed set per §3. Order here is the fixed tie-break order
/// used by the Query Analyzer's intent classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Search,
    Understand,
    Refactor,
    Debug,
    Optimize,
    Implement,
    Document,
    Explain,
}

impl Intent {
    pub const ALL_IN_TIEBREAK_ORDER: [Intent; 8] = [
        Intent::Search,
        Intent::Debug,
        Intent::Refactor,
        Intent::Optimize,
        Intent::Implement,
        Intent::Document,
        Intent::Understand,
        Intent::Explain,
    ];
}

impl Default for Intent {
    fn default() -> Self {
        Intent::Explain
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intent::Search => "search",
            Intent::Understand => "understand",
            Intent::Refactor => "refactor",
            Intent::Debug => "debug",
            Intent::Optimize => "optimize",
            Intent::Implement => "implement",
            Intent::Document => "document",
            Intent::Explain => "explain",
        };
        write!(f, "{s}")
    }
}

/// File change kind emitted by the watcher and consumed by the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEventKind {
    Created,
    Modified,
    Deleted,
}

/// Health of an external adapter (vector store, embedding service, cache L2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unreachable,
}
