use thiserror::Error;

/// Crate-wide result alias, mirroring the convention used throughout this workspace.
pub type Result<T> = std::result::Result<T, SearchCoreError>;

/// Every error kind the core can produce, grouped by the category the design
/// document assigns them: validation errors are fatal to the triggering
/// operation, external errors are retried upstream, indexing errors are
/// isolated per file/chunk, request errors are returned immediately, resource
/// errors propagate a cancellation or deadline intact, and `Bug` marks an
/// unreachable state that must not take down an unrelated request.
#[derive(Debug, Error, Clone)]
pub enum SearchCoreError {
    // -- Validation --
    #[error("invalid workspace version: {0}")]
    InvalidWorkspaceVersion(String),
    #[error("duplicate project id: {0}")]
    DuplicateProjectId(String),
    #[error("invalid project id: {0}")]
    InvalidProjectId(String),
    #[error("empty path for project {0}")]
    EmptyPath(String),
    #[error("path not found for project {project_id}: {path}")]
    PathNotFound { project_id: String, path: String },
    #[error("cyclic dependency: {0}")]
    CyclicDependency(String),
    #[error("unknown dependency {dependency} referenced by {project_id}")]
    UnknownDependency {
        project_id: String,
        dependency: String,
    },
    #[error("self dependency on project {0}")]
    SelfDependency(String),
    #[error("unknown relationship endpoint: {0}")]
    UnknownRelationshipEndpoint(String),
    #[error("self relationship on project {0}")]
    SelfRelationship(String),
    #[error("unknown relationship kind: {0}")]
    UnknownRelationshipKind(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // -- External --
    #[error("vector store unavailable: {0}")]
    VectorStoreUnavailable(String),
    #[error("embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),
    #[error("cache backend unavailable: {0}")]
    CacheUnavailable(String),
    #[error("search degraded: {reason}")]
    SearchDegraded { reason: String },

    // -- Indexing --
    #[error("failed to embed chunk {chunk_id}: {reason}")]
    ChunkEmbedFailed { chunk_id: String, reason: String },
    #[error("failed to upsert into collection {collection}: {reason}")]
    UpsertFailed { collection: String, reason: String },
    #[error("file unreadable: {path}")]
    FileUnreadable { path: String },
    #[error("file too large: {path} ({size} bytes)")]
    FileTooLarge { path: String, size: u64 },

    // -- Request --
    #[error("invalid scope: {0}")]
    InvalidScope(String),
    #[error("missing project_id for this scope")]
    MissingProjectId,
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("query too long: {len} > {max}")]
    QueryTooLong { len: usize, max: usize },
    #[error("query is empty")]
    QueryEmpty,

    // -- Resource --
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,

    // -- Internal --
    #[error("internal bug: {0}")]
    Bug(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SearchCoreError {
    /// Correlation-free string used in structured log fields; a caller that
    /// wants a correlation id attaches one in its own span, not here.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidWorkspaceVersion(_) => "invalid_workspace_version",
            Self::DuplicateProjectId(_) => "duplicate_project_id",
            Self::InvalidProjectId(_) => "invalid_project_id",
            Self::EmptyPath(_) => "empty_path",
            Self::PathNotFound { .. } => "path_not_found",
            Self::CyclicDependency(_) => "cyclic_dependency",
            Self::UnknownDependency { .. } => "unknown_dependency",
            Self::SelfDependency(_) => "self_dependency",
            Self::UnknownRelationshipEndpoint(_) => "unknown_relationship_endpoint",
            Self::SelfRelationship(_) => "self_relationship",
            Self::UnknownRelationshipKind(_) => "unknown_relationship_kind",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::VectorStoreUnavailable(_) => "vector_store_unavailable",
            Self::EmbeddingUnavailable(_) => "embedding_unavailable",
            Self::CacheUnavailable(_) => "cache_unavailable",
            Self::SearchDegraded { .. } => "search_degraded",
            Self::ChunkEmbedFailed { .. } => "chunk_embed_failed",
            Self::UpsertFailed { .. } => "upsert_failed",
            Self::FileUnreadable { .. } => "file_unreadable",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::InvalidScope(_) => "invalid_scope",
            Self::MissingProjectId => "missing_project_id",
            Self::InvalidFilter(_) => "invalid_filter",
            Self::QueryTooLong { .. } => "query_too_long",
            Self::QueryEmpty => "query_empty",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Bug(_) => "bug",
            Self::Config(_) => "config",
        }
    }

    /// True for the error categories the design calls "External": retried
    /// with backoff by the adapter, never by the ranker or cache hot path.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::VectorStoreUnavailable(_) | Self::EmbeddingUnavailable(_) | Self::CacheUnavailable(_)
        )
    }
}
