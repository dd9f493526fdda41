use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use searchcore_core::{IndexingPolicy, ProjectId};

/// Raw, pre-validation deserialization of the workspace configuration
/// document (§6). Unknown fields are warned on, not rejected, at this layer;
/// value-level validity (versions, ids, paths, edges) is checked in
/// `Workspace::load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceDocument {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub projects: Vec<ProjectDocument>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDocument>,
    #[serde(default)]
    pub search: SearchDefaultsDocument,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    #[serde(rename = "type", default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub language: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub indexing: IndexingPolicy,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipDocument {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub weight: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchDefaultsDocument {
    #[serde(default)]
    pub fanout_multiplier: Option<usize>,
    #[serde(default)]
    pub max_concurrent_searches: Option<usize>,
    #[serde(default)]
    pub early_termination_threshold: Option<f32>,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
}

impl WorkspaceDocument {
    pub fn parse_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

pub(crate) fn resolve_project_id(raw: &str) -> ProjectId {
    ProjectId::new(raw.to_string())
}
