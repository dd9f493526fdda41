use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ids::{ChunkId, ProjectId};

/// Bound on the stored snippet length (§3: "bounded length, e.g. ≤ 2 KiB").
pub const MAX_CHUNK_CONTENT_BYTES: usize = 2 * 1024;

/// A bounded contiguous slice of a source file: the unit of embedding,
/// storage, and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub project_id: ProjectId,
    pub file_path: String,
    pub language: Option<String>,
    pub chunk_index: usize,
    pub line_start: u32,
    pub line_end: u32,
    pub content: String,
    pub content_hash: String,
    pub embedding: Option<Vec<f32>>,
    pub modified_time: DateTime<Utc>,
    pub indexed_time: Option<DateTime<Utc>>,
}

impl Chunk {
    /// Content-addressed id, stable across re-indexing of unchanged content:
    /// `sha256(project_id + path + chunk_index + content_hash)`.
    pub fn compute_id(
        project_id: &ProjectId,
        file_path: &str,
        chunk_index: usize,
        content_hash: &str,
    ) -> ChunkId {
        let mut hasher = Sha256::new();
        hasher.update(project_id.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(file_path.as_bytes());
        hasher.update(b"\0");
        hasher.update(chunk_index.to_le_bytes());
        hasher.update(b"\0");
        hasher.update(content_hash.as_bytes());
        ChunkId(hex::encode(hasher.finalize()))
    }

    pub fn compute_content_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }
}

// Minimal local hex encoder so the crate doesn't need an extra dependency
// just for this: sha2 output is small and fixed-size.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        let bytes = bytes.as_ref();
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_same_id() {
        let p = ProjectId::new("demo");
        let hash = Chunk::compute_content_hash("fn main() {}");
        let a = Chunk::compute_id(&p, "src/main.rs", 0, &hash);
        let b = Chunk::compute_id(&p, "src/main.rs", 0, &hash);
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_different_id() {
        let p = ProjectId::new("demo");
        let h1 = Chunk::compute_content_hash("a");
        let h2 = Chunk::compute_content_hash("b");
        let a = Chunk::compute_id(&p, "src/main.rs", 0, &h1);
        let b = Chunk::compute_id(&p, "src/main.rs", 0, &h2);
        assert_ne!(a, b);
    }
}
