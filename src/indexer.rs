//! Index construction: embed chunks and persist them for one session.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use rig::embeddings::EmbeddingModel;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use crate::chunking::Chunk;
use crate::embeddings::Embedder;
use crate::stores::{IndexedChunk, SqliteChunkStore, VectorBackend};
use crate::types::AssistantError;

/// Database file kept inside each session's index directory.
pub const INDEX_DB_FILE: &str = "chunks.sqlite3";

/// Builds and replaces the per-session on-disk index.
///
/// Exactly one index exists per live session: a rebuild discards the previous
/// index directory before writing anything. The discard is best-effort
/// delete-then-rebuild, not transactional: when the delete fails (an OS
/// file lock, say) the rebuild aborts with an index error rather than
/// indexing into the stale store.
#[derive(Clone)]
pub struct EmbeddingIndexer<E> {
    embedder: Arc<Embedder<E>>,
}

impl<E> EmbeddingIndexer<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    pub fn new(embedder: Arc<Embedder<E>>) -> Self {
        Self { embedder }
    }

    /// One-shot index build for a processing run.
    pub async fn rebuild(
        &self,
        index_path: &Path,
        chunks: &[Chunk],
    ) -> Result<SqliteChunkStore<E>, AssistantError> {
        if index_path.exists() {
            fs::remove_dir_all(index_path).await.map_err(|err| {
                AssistantError::Index(format!(
                    "failed to clear previous index at {}: {err}",
                    index_path.display()
                ))
            })?;
        }
        fs::create_dir_all(index_path).await?;

        let store =
            SqliteChunkStore::open(index_path.join(INDEX_DB_FILE), self.embedder.model()).await?;

        if chunks.is_empty() {
            info!(path = %index_path.display(), "rebuilt empty index");
            return Ok(store);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;

        let mut per_source: HashMap<String, usize> = HashMap::new();
        let rows: Vec<(IndexedChunk, Vec<f32>)> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let source = chunk.source.as_reference();
                let counter = per_source.entry(source.clone()).or_insert(0);
                let chunk_index = *counter;
                *counter += 1;
                (
                    IndexedChunk {
                        id: Uuid::new_v4().to_string(),
                        source,
                        chunk_index,
                        content: chunk.text.clone(),
                    },
                    vector,
                )
            })
            .collect();

        store.insert_chunks(rows).await?;
        info!(
            path = %index_path.display(),
            chunks = chunks.len(),
            "index rebuilt"
        );
        Ok(store)
    }

    /// Opens the session's persisted index, if one exists.
    pub async fn open_existing(
        &self,
        index_path: &Path,
    ) -> Result<Option<SqliteChunkStore<E>>, AssistantError> {
        let db_path = index_path.join(INDEX_DB_FILE);
        if !db_path.exists() {
            return Ok(None);
        }
        let store = SqliteChunkStore::open(db_path, self.embedder.model()).await?;
        Ok(Some(store))
    }
}
