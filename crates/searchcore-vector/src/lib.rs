pub mod analyzer;
pub mod embedding;
pub mod orchestrator;
pub mod ranker;
pub mod registry;
pub mod vector_store;

pub use analyzer::analyze;
pub use embedding::{EmbeddingClient, HashFallbackBackend};
pub use orchestrator::SearchOrchestrator;
pub use ranker::{score_result, tie_break, RankingContext, RankingWeights};
pub use registry::{CollectionKind, CollectionRegistry};
pub use vector_store::InMemoryVectorStore;
