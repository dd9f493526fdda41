use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use searchcore_core::{
    CallContext, FilterValue, HealthReport, HealthStatus, PayloadFilter, Result, SearchCoreError,
    VectorHit, VectorRecord, VectorStore,
};
use serde_json::Value;

struct Collection {
    dimension: usize,
    items: DashMap<String, VectorRecord>,
}

/// Zero-configuration reference `VectorStore`: brute-force cosine scoring
/// over an in-memory map, sufficient for tests and a dependency-free default
/// (§4.2). Production deployments supply their own adapter against a real
/// ANN service.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: DashMap<String, Collection>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        self.collections.entry(collection.to_string()).or_insert_with(|| Collection {
            dimension,
            items: DashMap::new(),
        });
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.collections.remove(collection);
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        items: Vec<VectorRecord>,
        ctx: &CallContext,
    ) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(SearchCoreError::Cancelled);
        }
        let col = self
            .collections
            .get(collection)
            .ok_or_else(|| SearchCoreError::VectorStoreUnavailable(format!("unknown collection {collection}")))?;
        for item in items {
            if item.vector.len() != col.dimension {
                return Err(SearchCoreError::DimensionMismatch {
                    expected: col.dimension,
                    actual: item.vector.len(),
                });
            }
            col.items.insert(item.id.clone(), item);
        }
        Ok(())
    }

    async fn delete_by_filter(
        &self,
        collection: &str,
        filter: PayloadFilter,
        ctx: &CallContext,
    ) -> Result<u64> {
        if ctx.is_cancelled() {
            return Err(SearchCoreError::Cancelled);
        }
        let Some(col) = self.collections.get(collection) else {
            return Ok(0);
        };
        let to_remove: Vec<String> = col
            .items
            .iter()
            .filter(|entry| matches_filter(&entry.value().payload, &filter))
            .map(|entry| entry.key().clone())
            .collect();
        let removed = to_remove.len() as u64;
        for id in to_remove {
            col.items.remove(&id);
        }
        Ok(removed)
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<PayloadFilter>,
        ctx: &CallContext,
    ) -> Result<Vec<VectorHit>> {
        if ctx.is_cancelled() {
            return Err(SearchCoreError::Cancelled);
        }
        let Some(col) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<VectorHit> = col
            .items
            .iter()
            .filter(|entry| match &filter {
                Some(f) => matches_filter(&entry.value().payload, f),
                None => true,
            })
            .map(|entry| VectorHit {
                id: entry.key().clone(),
                score: cosine_similarity(vector, &entry.value().vector),
                payload: entry.value().payload.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn health(&self) -> HealthReport {
        HealthReport {
            status: HealthStatus::Healthy,
            latency_estimate_ms: 0,
        }
    }
}

fn matches_filter(payload: &serde_json::Map<String, Value>, filter: &PayloadFilter) -> bool {
    filter.iter().all(|(key, value)| {
        let Some(actual) = payload.get(key) else {
            return false;
        };
        match value {
            FilterValue::Eq(expected) => actual == expected,
            FilterValue::In(options) => options.contains(actual),
        }
    })
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> CallContext {
        CallContext::new()
    }

    #[tokio::test]
    async fn upsert_then_search_returns_highest_cosine_first() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        store
            .upsert(
                "c",
                vec![
                    VectorRecord {
                        id: "a".into(),
                        vector: vec![1.0, 0.0],
                        payload: serde_json::Map::new(),
                    },
                    VectorRecord {
                        id: "b".into(),
                        vector: vec![0.0, 1.0],
                        payload: serde_json::Map::new(),
                    },
                ],
                &ctx(),
            )
            .await
            .unwrap();

        let hits = store.search("c", &[1.0, 0.0], 2, None, &ctx()).await.unwrap();
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn delete_by_filter_removes_matching_items() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        let mut payload = serde_json::Map::new();
        payload.insert("file_path".to_string(), json!("src/main.rs"));
        store
            .upsert(
                "c",
                vec![VectorRecord {
                    id: "a".into(),
                    vector: vec![1.0, 0.0],
                    payload,
                }],
                &ctx(),
            )
            .await
            .unwrap();

        let mut filter: PayloadFilter = HashMap::new();
        filter.insert("file_path".to_string(), FilterValue::Eq(json!("src/main.rs")));
        let removed = store.delete_by_filter("c", filter, &ctx()).await.unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
    }
}
