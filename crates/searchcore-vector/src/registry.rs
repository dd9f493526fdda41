use chrono::{DateTime, Utc};
use dashmap::DashMap;
use searchcore_core::{CallContext, ProjectId, Result, VectorStore};
use std::sync::Arc;

/// A kind of collection a project can own; currently only `code`, kept as an
/// enum so adding e.g. a `docs` collection later does not change the naming
/// scheme's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Code,
}

impl CollectionKind {
    fn tag(self) -> &'static str {
        match self {
            CollectionKind::Code => "code",
        }
    }
}

/// Deterministically names and tracks a project's collections in the
/// underlying `VectorStore`, per §4.2. `ensure` is idempotent: a second call
/// for an already-created collection does not hit the store again.
pub struct CollectionRegistry {
    store: Arc<dyn VectorStore>,
    dimension: usize,
    created_at: DashMap<String, DateTime<Utc>>,
}

impl CollectionRegistry {
    pub fn new(store: Arc<dyn VectorStore>, dimension: usize) -> Self {
        Self {
            store,
            dimension,
            created_at: DashMap::new(),
        }
    }

    pub fn collection_name(project_id: &ProjectId, kind: CollectionKind) -> String {
        format!("project_{}_{}", project_id.as_str(), kind.tag())
    }

    pub async fn ensure(&self, project_id: &ProjectId, kind: CollectionKind) -> Result<String> {
        let name = Self::collection_name(project_id, kind);
        if self.created_at.contains_key(&name) {
            return Ok(name);
        }
        self.store.ensure_collection(&name, self.dimension).await?;
        self.created_at.insert(name.clone(), Utc::now());
        Ok(name)
    }

    pub fn created_at(&self, project_id: &ProjectId, kind: CollectionKind) -> Option<DateTime<Utc>> {
        self.created_at
            .get(&Self::collection_name(project_id, kind))
            .map(|v| *v)
    }

    /// Drops every collection kind for a project; used when a project is
    /// removed from the workspace.
    pub async fn drop_project(&self, project_id: &ProjectId) -> Result<()> {
        for kind in [CollectionKind::Code] {
            let name = Self::collection_name(project_id, kind);
            if self.created_at.remove(&name).is_some() {
                self.store.drop_collection(&name).await?;
            }
        }
        Ok(())
    }

    pub async fn health(&self, ctx: &CallContext) -> searchcore_core::HealthReport {
        let _ = ctx;
        self.store.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_name_is_deterministic() {
        let id = ProjectId::new("frontend");
        assert_eq!(
            CollectionRegistry::collection_name(&id, CollectionKind::Code),
            "project_frontend_code"
        );
    }
}
