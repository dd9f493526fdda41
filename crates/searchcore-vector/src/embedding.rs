use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use searchcore_core::{CallContext, EmbeddingBackend, Result, SearchCoreError};
use sha2::{Digest, Sha256};
use tracing::warn;

const MAX_INPUT_CHARS: usize = 8192;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(200);

/// Deterministic hash-based fallback backend: every distinct text maps to a
/// stable pseudo-random unit vector derived from its SHA-256 digest. Used
/// for tests and no-network operation; never presented to a caller as a real
/// semantic embedding without `is_fallback()` being checked first. Grounded
/// on the teacher's `EmbeddingGenerator` fallback-chain design, where the
/// advanced engine is optional and a baseline always exists.
pub struct HashFallbackBackend {
    dimension: usize,
}

impl HashFallbackBackend {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = Vec::with_capacity(self.dimension);
        let mut seed = Sha256::digest(text.as_bytes());
        while vector.len() < self.dimension {
            for byte in seed.iter() {
                if vector.len() >= self.dimension {
                    break;
                }
                vector.push((*byte as f32 / 255.0) * 2.0 - 1.0);
            }
            seed = Sha256::digest(seed);
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingBackend for HashFallbackBackend {
    async fn embed(&self, texts: &[String], _ctx: &CallContext) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        "hash-fallback-v1"
    }

    fn is_fallback(&self) -> bool {
        true
    }
}

/// Wraps an `EmbeddingBackend` with the batching, retry, and caching
/// contract from §4.2: inputs are truncated with a warning past
/// `MAX_INPUT_CHARS`, transient failures retry up to `MAX_RETRIES` times
/// with jittered exponential backoff, and a bounded cache keyed by
/// `(model_id, sha256(text))` short-circuits repeat lookups.
pub struct EmbeddingClient {
    backend: Arc<dyn EmbeddingBackend>,
    batch_size: usize,
    cache: DashMap<String, Vec<f32>>,
    cache_capacity: usize,
}

impl EmbeddingClient {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, batch_size: usize, cache_capacity: usize) -> Self {
        Self {
            backend,
            batch_size,
            cache: DashMap::new(),
            cache_capacity,
        }
    }

    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    pub fn is_fallback(&self) -> bool {
        self.backend.is_fallback()
    }

    fn cache_key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{}:{:x}", self.backend.model_id(), hasher.finalize())
    }

    fn truncate(&self, text: &str) -> String {
        if text.chars().count() > MAX_INPUT_CHARS {
            warn!("embedding input truncated from {} chars", text.chars().count());
            text.chars().take(MAX_INPUT_CHARS).collect()
        } else {
            text.to_string()
        }
    }

    /// Embeds `texts`, preserving order. Cache hits never touch the backend;
    /// misses are grouped into batches of `batch_size` and sent through
    /// `embed_with_retry`.
    pub async fn embed(&self, texts: &[String], ctx: &CallContext) -> Result<Vec<Vec<f32>>> {
        let prepared: Vec<String> = texts.iter().map(|t| self.truncate(t)).collect();
        let mut results: Vec<Option<Vec<f32>>> = vec![None; prepared.len()];
        let mut misses: Vec<usize> = Vec::new();

        for (i, text) in prepared.iter().enumerate() {
            let key = self.cache_key(text);
            if let Some(cached) = self.cache.get(&key) {
                results[i] = Some(cached.clone());
            } else {
                misses.push(i);
            }
        }

        for chunk in misses.chunks(self.batch_size) {
            let batch: Vec<String> = chunk.iter().map(|&i| prepared[i].clone()).collect();
            let embeddings = self.embed_with_retry(&batch, ctx).await?;
            for (offset, &i) in chunk.iter().enumerate() {
                let vector = embeddings[offset].clone();
                if self.cache.len() < self.cache_capacity {
                    self.cache.insert(self.cache_key(&prepared[i]), vector.clone());
                }
                results[i] = Some(vector);
            }
        }

        Ok(results.into_iter().map(|r| r.expect("every index filled")).collect())
    }

    async fn embed_with_retry(&self, batch: &[String], ctx: &CallContext) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            match self.backend.embed(batch, ctx).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) if attempt < MAX_RETRIES && err.is_retryable() => {
                    attempt += 1;
                    let jitter = Duration::from_millis((attempt as u64 * 37) % 53);
                    let backoff = BASE_BACKOFF * 2u32.pow(attempt - 1) + jitter;
                    tokio::time::sleep(backoff).await;
                }
                Err(_) => {
                    return Err(SearchCoreError::EmbeddingUnavailable(format!(
                        "embedding failed after {attempt} retries"
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_same_vector() {
        let backend = Arc::new(HashFallbackBackend::new(16));
        let client = EmbeddingClient::new(backend, 8, 100);
        let ctx = CallContext::new();
        let a = client.embed(&["fn main() {}".to_string()], &ctx).await.unwrap();
        let b = client.embed(&["fn main() {}".to_string()], &ctx).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn fallback_vectors_are_unit_length() {
        let backend = Arc::new(HashFallbackBackend::new(8));
        let client = EmbeddingClient::new(backend, 8, 10);
        let ctx = CallContext::new();
        let vecs = client.embed(&["hello".to_string()], &ctx).await.unwrap();
        let norm: f32 = vecs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn fallback_backend_flagged() {
        let backend = HashFallbackBackend::new(8);
        assert!(backend.is_fallback());
    }
}
