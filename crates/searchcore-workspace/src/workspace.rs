use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use searchcore_core::{
    Project, ProjectId, Relationship, RelationshipKind, Result, SearchCoreError,
};

use crate::document::{resolve_project_id, WorkspaceDocument};
use crate::graph::RelationshipGraph;

/// One validated, internally-consistent view of the workspace: the project
/// set, the derived relationship graph, and the document's search defaults.
/// Immutable once built — a reload produces a new snapshot rather than
/// mutating this one, so a reader holding an `Arc<WorkspaceSnapshot>` never
/// observes a half-applied reload.
#[derive(Debug, Clone)]
pub struct WorkspaceSnapshot {
    pub version: String,
    pub name: String,
    pub projects: Vec<Project>,
    pub graph: RelationshipGraph,
    pub fanout_multiplier: usize,
    pub max_concurrent_searches: usize,
    pub early_termination_threshold: f32,
    pub similarity_threshold: f32,
}

impl WorkspaceSnapshot {
    pub fn project(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| &p.id == id)
    }

    pub fn project_ids(&self) -> Vec<ProjectId> {
        self.projects.iter().map(|p| p.id.clone()).collect()
    }
}

/// Controls whether `PathNotFound` is checked; a dry-run validates a
/// document without requiring the referenced project directories to exist
/// on disk, e.g. when validating a document generated for a remote worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Normal,
    DryRun,
}

/// Published, reloadable handle to the current workspace snapshot. Readers
/// call `current()` and get an `Arc` they can hold across a whole request
/// without synchronizing with a concurrent `reload()`.
pub struct Workspace {
    current: ArcSwap<WorkspaceSnapshot>,
}

impl Workspace {
    pub fn load(text: &str, mode: LoadMode) -> Result<Self> {
        let snapshot = build_snapshot(text, mode)?;
        Ok(Self {
            current: ArcSwap::from_pointee(snapshot),
        })
    }

    pub fn current(&self) -> Arc<WorkspaceSnapshot> {
        self.current.load_full()
    }

    /// Parses and fully validates `text` off to the side, then publishes it
    /// with a single atomic store. A failed reload leaves the previously
    /// published snapshot untouched.
    pub fn reload(&self, text: &str, mode: LoadMode) -> Result<()> {
        let snapshot = build_snapshot(text, mode)?;
        self.current.store(Arc::new(snapshot));
        Ok(())
    }
}

fn build_snapshot(text: &str, mode: LoadMode) -> Result<WorkspaceSnapshot> {
    let doc = WorkspaceDocument::parse_toml(text)
        .map_err(|e| SearchCoreError::InvalidWorkspaceVersion(e.to_string()))?;

    validate_version(&doc.version)?;

    let mut ids = std::collections::HashSet::new();
    let mut projects = Vec::with_capacity(doc.projects.len());
    for p in &doc.projects {
        let id = resolve_project_id(&p.id);
        if !ids.insert(id.clone()) {
            return Err(SearchCoreError::DuplicateProjectId(id.to_string()));
        }
        if !id.is_well_formed() {
            return Err(SearchCoreError::InvalidProjectId(id.to_string()));
        }
        if p.path.as_os_str().is_empty() {
            return Err(SearchCoreError::EmptyPath(id.to_string()));
        }
        if mode == LoadMode::Normal && !path_exists(&p.path) {
            return Err(SearchCoreError::PathNotFound {
                project_id: id.to_string(),
                path: p.path.display().to_string(),
            });
        }

        projects.push(Project {
            id,
            name: p.name.clone(),
            path: p.path.clone(),
            project_type: p.project_type.clone(),
            languages: p.language.iter().cloned().collect(),
            dependencies: p.dependencies.iter().map(|d| resolve_project_id(d)).collect(),
            indexing_policy: p.indexing.clone(),
            metadata: p.metadata.clone(),
        });
    }

    let mut dependency_pairs = Vec::new();
    for project in &projects {
        for dep in &project.dependencies {
            if !ids.contains(dep) {
                return Err(SearchCoreError::UnknownDependency {
                    project_id: project.id.to_string(),
                    dependency: dep.to_string(),
                });
            }
            if dep == &project.id {
                return Err(SearchCoreError::SelfDependency(project.id.to_string()));
            }
            dependency_pairs.push((project.id.clone(), dep.clone()));
        }
    }

    let project_ids: Vec<ProjectId> = projects.iter().map(|p| p.id.clone()).collect();
    RelationshipGraph::check_dependency_cycle(&project_ids, &dependency_pairs)?;

    let mut relationships = Vec::with_capacity(doc.relationships.len());
    for rel in &doc.relationships {
        let from = resolve_project_id(&rel.from);
        let to = resolve_project_id(&rel.to);
        if !ids.contains(&from) {
            return Err(SearchCoreError::UnknownRelationshipEndpoint(from.to_string()));
        }
        if !ids.contains(&to) {
            return Err(SearchCoreError::UnknownRelationshipEndpoint(to.to_string()));
        }
        if from == to {
            return Err(SearchCoreError::SelfRelationship(from.to_string()));
        }
        let kind: RelationshipKind = rel
            .kind
            .parse()
            .map_err(|_| SearchCoreError::UnknownRelationshipKind(rel.kind.clone()))?;
        relationships.push(Relationship {
            from_id: from,
            to_id: to,
            kind,
            description: rel.description.clone(),
            weight: rel.weight,
        });
    }

    // A `dependencies` entry implies an `imports` edge with the same
    // endpoints, materialized here so graph queries need only look at one
    // edge set for "does A import B".
    for (from, to) in &dependency_pairs {
        relationships.push(Relationship {
            from_id: from.clone(),
            to_id: to.clone(),
            kind: RelationshipKind::Imports,
            description: None,
            weight: None,
        });
    }

    let graph = RelationshipGraph::build(&project_ids, &dependency_pairs, &relationships)?;

    Ok(WorkspaceSnapshot {
        version: doc.version,
        name: doc.name,
        projects,
        graph,
        fanout_multiplier: doc.search.fanout_multiplier.unwrap_or(2),
        max_concurrent_searches: doc.search.max_concurrent_searches.unwrap_or(8),
        early_termination_threshold: doc.search.early_termination_threshold.unwrap_or(0.92),
        similarity_threshold: doc.search.similarity_threshold.unwrap_or(0.6),
    })
}

fn validate_version(version: &str) -> Result<()> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() < 2 || parts.iter().any(|p| p.parse::<u32>().is_err()) {
        return Err(SearchCoreError::InvalidWorkspaceVersion(version.to_string()));
    }
    Ok(())
}

fn path_exists(path: &Path) -> bool {
    path.exists()
}

/// Serializes a snapshot back to a `WorkspaceDocument` for round-tripping,
/// used by the "load(save(W)) = W" invariant and by admin tooling that edits
/// a workspace programmatically rather than by hand-editing TOML.
pub fn snapshot_to_document(snapshot: &WorkspaceSnapshot) -> WorkspaceDocument {
    use crate::document::{ProjectDocument, RelationshipDocument, SearchDefaultsDocument};

    let projects = snapshot
        .projects
        .iter()
        .map(|p| ProjectDocument {
            id: p.id.to_string(),
            name: p.name.clone(),
            path: p.path.clone(),
            project_type: p.project_type.clone(),
            language: p.languages.iter().cloned().collect(),
            dependencies: p.dependencies.iter().map(|d| d.to_string()).collect(),
            indexing: p.indexing_policy.clone(),
            metadata: p.metadata.clone(),
        })
        .collect();

    let relationships = snapshot
        .graph
        .all_relationships()
        .iter()
        .filter(|r| r.kind != RelationshipKind::Imports)
        .map(|r| RelationshipDocument {
            from: r.from_id.to_string(),
            to: r.to_id.to_string(),
            kind: r.kind.to_string(),
            description: r.description.clone(),
            weight: r.weight,
        })
        .collect();

    WorkspaceDocument {
        version: snapshot.version.clone(),
        name: snapshot.name.clone(),
        projects,
        relationships,
        search: SearchDefaultsDocument {
            fanout_multiplier: Some(snapshot.fanout_multiplier),
            max_concurrent_searches: Some(snapshot.max_concurrent_searches),
            early_termination_threshold: Some(snapshot.early_termination_threshold),
            similarity_threshold: Some(snapshot.similarity_threshold),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
version = "1.0"
name = "demo"

[[projects]]
id = "frontend"
name = "Frontend"
path = "."

[[projects]]
id = "backend"
name = "Backend"
path = "."
dependencies = ["shared"]

[[projects]]
id = "shared"
name = "Shared"
path = "."
"#;

    #[test]
    fn loads_valid_workspace() {
        let ws = Workspace::load(DOC, LoadMode::DryRun).expect("should load");
        let snap = ws.current();
        assert_eq!(snap.projects.len(), 3);
        assert_eq!(snap.graph.direct_dependencies(&ProjectId::new("backend")), vec![ProjectId::new("shared")]);
    }

    #[test]
    fn rejects_cycle() {
        let doc = r#"
version = "1.0"
name = "demo"

[[projects]]
id = "a"
name = "A"
path = "."
dependencies = ["b"]

[[projects]]
id = "b"
name = "B"
path = "."
dependencies = ["a"]
"#;
        let err = Workspace::load(doc, LoadMode::DryRun).unwrap_err();
        assert!(matches!(err, SearchCoreError::CyclicDependency(_)));
    }

    #[test]
    fn cycle_takes_precedence_over_bad_relationship_kind() {
        let doc = r#"
version = "1.0"
name = "demo"

[[projects]]
id = "a"
name = "A"
path = "."
dependencies = ["b"]

[[projects]]
id = "b"
name = "B"
path = "."
dependencies = ["a"]

[[relationships]]
from = "a"
to = "b"
kind = "not_a_real_kind"
"#;
        let err = Workspace::load(doc, LoadMode::DryRun).unwrap_err();
        assert!(matches!(err, SearchCoreError::CyclicDependency(_)));
    }

    #[test]
    fn rejects_duplicate_project_id() {
        let doc = r#"
version = "1.0"
name = "demo"

[[projects]]
id = "a"
name = "A"
path = "."

[[projects]]
id = "a"
name = "A2"
path = "."
"#;
        let err = Workspace::load(doc, LoadMode::DryRun).unwrap_err();
        assert!(matches!(err, SearchCoreError::DuplicateProjectId(_)));
    }

    #[test]
    fn rejects_self_dependency() {
        let doc = r#"
version = "1.0"
name = "demo"

[[projects]]
id = "a"
name = "A"
path = "."
dependencies = ["a"]
"#;
        let err = Workspace::load(doc, LoadMode::DryRun).unwrap_err();
        assert!(matches!(err, SearchCoreError::SelfDependency(_)));
    }

    #[test]
    fn round_trips_through_document() {
        let ws = Workspace::load(DOC, LoadMode::DryRun).unwrap();
        let snap = ws.current();
        let doc = snapshot_to_document(&snap);
        let text = doc.to_toml().unwrap();
        let ws2 = Workspace::load(&text, LoadMode::DryRun).unwrap();
        let snap2 = ws2.current();
        assert_eq!(snap.projects.len(), snap2.projects.len());
        assert_eq!(snap.version, snap2.version);
    }
}
