pub mod invalidation;
pub mod query_cache;
pub mod shared_cache;

pub use invalidation::{CacheInvalidator, InvalidationStats};
pub use query_cache::QueryCache;
pub use shared_cache::InMemorySharedCache;
