use serde::{Deserialize, Serialize};

use crate::enums::RelationshipKind;
use crate::ids::ProjectId;

/// A typed directed edge between two projects.
///
/// Invariant (enforced by `Workspace::load`, never by this type alone): both
/// endpoints resolve to existing projects and `from_id != to_id`. A
/// `dependencies` entry on a `Project` implies an `imports` edge with the
/// same endpoints, materialized at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from_id: ProjectId,
    pub to_id: ProjectId,
    pub kind: RelationshipKind,
    #[serde(default)]
    pub description: Option<String>,
    /// Present for `semantic_similarity` edges; precomputed at load time per
    /// the resolved Open Question in SPEC_FULL.md §9 and never recomputed on
    /// reload unless the document's own value changes.
    #[serde(default)]
    pub weight: Option<f32>,
}

impl Relationship {
    pub fn is_self_loop(&self) -> bool {
        self.from_id == self.to_id
    }
}
