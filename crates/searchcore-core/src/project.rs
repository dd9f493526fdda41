use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::enums::Priority;
use crate::ids::ProjectId;

/// Per-project indexing policy: whether it is indexed at all, its fan-out
/// priority, and the globs excluded from chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingPolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub exclude_globs: HashSet<String>,
}

fn default_true() -> bool {
    true
}

impl Default for IndexingPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: Priority::default(),
            exclude_globs: HashSet::new(),
        }
    }
}

/// One indexed code base, as published in a `WorkspaceSnapshot`.
///
/// Created at workspace load or via an admin op; mutated only by a whole
/// workspace reload (never partially, per §4.1); destroying it drops all of
/// its collections through the Collection Registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub path: PathBuf,
    #[serde(rename = "type", default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub languages: HashSet<String>,
    #[serde(default)]
    pub dependencies: Vec<ProjectId>,
    #[serde(default)]
    pub indexing_policy: IndexingPolicy,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Project {
    pub fn validate_id(id: &ProjectId) -> bool {
        id.is_well_formed()
    }
}
