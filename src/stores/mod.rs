//! Vector storage for embedded chunks.
//!
//! [`VectorBackend`] is the narrow contract the pipeline relies on from the
//! store: add documents, similarity-search with a score, sample stored rows,
//! and report a count. The sole implementation persists to SQLite with
//! vector search provided by `sqlite-vec`; the per-session index directory
//! holds one database file and is deleted wholesale on reset.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::AssistantError;

pub use sqlite::{SqliteChunkStore, StoredChunk};

/// A stored chunk row, backend-agnostic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedChunk {
    /// Unique identifier for this chunk.
    pub id: String,
    /// Back-reference to the originating URL or local file.
    pub source: String,
    /// Zero-based position of this chunk within its source.
    pub chunk_index: usize,
    /// The chunk text.
    pub content: String,
}

/// Storage operations the retrieval pipeline depends on.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Persists chunks together with their embedding vectors.
    async fn insert_chunks(
        &self,
        chunks: Vec<(IndexedChunk, Vec<f32>)>,
    ) -> Result<(), AssistantError>;

    /// Nearest-neighbor search; returns `(chunk, similarity)` pairs ordered
    /// most-similar first, at most `top_k` of them.
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(IndexedChunk, f32)>, AssistantError>;

    /// Returns up to `limit` arbitrary stored chunks.
    async fn sample(&self, limit: usize) -> Result<Vec<IndexedChunk>, AssistantError>;

    /// Total number of stored chunks.
    async fn count(&self) -> Result<usize, AssistantError>;
}
