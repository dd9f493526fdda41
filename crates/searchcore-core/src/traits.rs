use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::enums::HealthStatus;
use crate::error::Result;
use crate::ids::ProjectId;

/// Uniform cancellation context threaded through every external call, per the
/// design note in SPEC_FULL.md §9 ("do not rely on timeouts alone"). A
/// `deadline` of `None` means "no explicit deadline beyond the caller's own
/// timeout wrapper".
#[derive(Debug, Clone)]
pub struct CallContext {
    pub cancellation: CancellationToken,
    pub deadline: Option<std::time::Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_deadline(deadline: std::time::Instant) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn is_past_deadline(&self) -> bool {
        matches!(self.deadline, Some(d) if std::time::Instant::now() > d)
    }

    pub fn child_token(&self) -> CancellationToken {
        self.cancellation.child_token()
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A scalar filter value pushed down to a vector store's filter language:
/// equality on scalar payload fields, set-membership on `language`/`file_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Eq(Value),
    In(Vec<Value>),
}

pub type PayloadFilter = HashMap<String, FilterValue>;

/// One item to upsert: id, vector, payload. Ordering within a batch is
/// irrelevant; callers make `upsert` idempotent by using content-addressed ids.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: serde_json::Map<String, Value>,
}

/// One scored hit from a vector store search.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    pub payload: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub latency_estimate_ms: u64,
}

/// Thin typed wrapper over an external approximate-nearest-neighbor store
/// (§4.2). The core ships one reference implementation (an in-memory,
/// brute-force adapter) behind this seam; production deployments bring their
/// own.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()>;
    async fn drop_collection(&self, collection: &str) -> Result<()>;
    async fn upsert(
        &self,
        collection: &str,
        items: Vec<VectorRecord>,
        ctx: &CallContext,
    ) -> Result<()>;
    async fn delete_by_filter(
        &self,
        collection: &str,
        filter: PayloadFilter,
        ctx: &CallContext,
    ) -> Result<u64>;
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<PayloadFilter>,
        ctx: &CallContext,
    ) -> Result<Vec<VectorHit>>;
    async fn health(&self) -> HealthReport;
}

/// Adapter over an external embedding model (§4.2). The core ships a
/// deterministic hash-based fallback behind this seam for tests and
/// no-network operation.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embeds a batch of UTF-8 strings, returning one vector per input in the
    /// same order. Implementations are responsible for internal batching,
    /// truncation of over-long inputs (with a warning), and retry/backoff.
    async fn embed(&self, texts: &[String], ctx: &CallContext) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;

    fn model_id(&self) -> &str;

    /// True for the deterministic hash-based fallback; callers use this to
    /// annotate degraded responses rather than presenting them as real
    /// semantic results.
    fn is_fallback(&self) -> bool {
        false
    }
}

/// Optional function/class boundary extractor supplied externally; when
/// absent the Chunker falls back to line-aware windows (§4.3).
pub trait SymbolExtractor: Send + Sync {
    /// Returns `(line_start, line_end)` boundaries, 1-indexed inclusive, in
    /// file order.
    fn boundaries(&self, file_path: &str, content: &str) -> Option<Vec<(u32, u32)>>;
}

/// A shared, network-accessed key-value store standing in for the Query
/// Cache's L2 tier (§4.8). The core ships an in-process reference
/// implementation.
#[async_trait]
pub trait SharedCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: std::time::Duration) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Project-scoped embedding/vector-store error isolation helper: callers
/// collect `(ProjectId, SearchCoreError)` pairs instead of failing the whole
/// fan-out, per the "Error isolation in fan-out" design note.
pub type ProjectError = (ProjectId, crate::error::SearchCoreError);
