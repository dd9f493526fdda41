pub mod cache_types;
pub mod chunk;
pub mod config;
pub mod enums;
pub mod error;
pub mod fingerprint;
pub mod ids;
pub mod metrics;
pub mod project;
pub mod query;
pub mod relationship;
pub mod traits;

pub use cache_types::*;
pub use chunk::*;
pub use config::*;
pub use enums::*;
pub use error::*;
pub use fingerprint::*;
pub use ids::*;
pub use metrics::Metrics;
pub use project::*;
pub use query::*;
pub use relationship::*;
pub use traits::*;
