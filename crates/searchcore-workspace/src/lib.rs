pub mod document;
pub mod graph;
pub mod workspace;

pub use document::{ProjectDocument, RelationshipDocument, SearchDefaultsDocument, WorkspaceDocument};
pub use graph::RelationshipGraph;
pub use workspace::{snapshot_to_document, LoadMode, Workspace, WorkspaceSnapshot};
